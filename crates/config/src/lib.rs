//! Configuration loading, validation, and management for streamgate.
//!
//! Loads configuration from `~/.streamgate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use streamgate_core::PermissionPolicy;

/// Hard upper bound on agent iterations per request.
pub const MAX_AGENT_ITERATIONS: u32 = 20;

/// The root configuration structure.
///
/// Maps directly to `~/.streamgate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream endpoint and credentials
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Which tool kinds are approved
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Client-side (CLI) tools the gateway may hand back to the caller
    #[serde(default)]
    pub cli_tools: CliToolsConfig,

    /// External tool servers and their allow-lists
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    4141
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Models served by the responses-style endpoint. A trailing or embedded
    /// `*` matches any run of characters.
    #[serde(default = "default_alternate_models")]
    pub alternate_models: Vec<String>,

    /// Whether to fall back to the primary endpoint for unmatched models
    #[serde(default = "default_true")]
    pub primary_by_default: bool,
}

fn default_base_url() -> String {
    "https://api.githubcopilot.com".into()
}
fn default_alternate_models() -> Vec<String> {
    vec!["*codex*".into()]
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            alternate_models: default_alternate_models(),
            primary_by_default: true,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("alternate_models", &self.alternate_models)
            .field("primary_by_default", &self.primary_by_default)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum agent iterations per request (at most 20)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget for one request, streaming included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    MAX_AGENT_ITERATIONS
}
fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// `true`/`false` for every kind, or a list such as `["read", "mcp"]`
    #[serde(default)]
    pub approve: PermissionPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliToolsConfig {
    /// Tool names the caller may execute. Empty = none. `["*"]` = all.
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name as reported by the tool catalog
    pub name: String,

    /// Tool names this server may run. Empty = none. `["*"]` = all.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.streamgate/config.toml).
    ///
    /// Environment variables override the file:
    /// - `STREAMGATE_TOKEN`
    /// - `STREAMGATE_BASE_URL`
    /// - `STREAMGATE_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(token) = std::env::var("STREAMGATE_TOKEN") {
            config.upstream.token = Some(token);
        }

        if let Ok(base_url) = std::env::var("STREAMGATE_BASE_URL") {
            config.upstream.base_url = base_url;
        }

        if let Ok(port) = std::env::var("STREAMGATE_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("STREAMGATE_PORT is not a port: {port}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".streamgate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "upstream.base_url must not be empty".into(),
            ));
        }

        if self.agent.max_iterations == 0 || self.agent.max_iterations > MAX_AGENT_ITERATIONS {
            return Err(ConfigError::ValidationError(format!(
                "agent.max_iterations must be between 1 and {MAX_AGENT_ITERATIONS}"
            )));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.request_timeout_secs must be > 0".into(),
            ));
        }

        if let Some(dup) = self
            .mcp_servers
            .iter()
            .enumerate()
            .find(|(i, s)| self.mcp_servers[..*i].iter().any(|o| o.name == s.name))
            .map(|(_, s)| s.name.clone())
        {
            return Err(ConfigError::ValidationError(format!(
                "mcp server '{dup}' is configured more than once"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use streamgate_core::ToolKind;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.port, 4141);
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.agent.request_timeout_secs, 300);
        assert!(!config.permissions.approve.approves(ToolKind::Shell));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.upstream.base_url, config.upstream.base_url);
    }

    #[test]
    fn iteration_cap_above_limit_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 21;
        assert!(config.validate().is_err());
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_server_rejected() {
        let mut config = AppConfig::default();
        for _ in 0..2 {
            config.mcp_servers.push(McpServerConfig {
                name: "search".into(),
                allowed_tools: vec!["*".into()],
            });
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().gateway.host, "127.0.0.1");
    }

    #[test]
    fn debug_redacts_token() {
        let mut config = AppConfig::default();
        config.upstream.token = Some("ghu_supersecret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghu_supersecret"));
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[gateway]
port = 9000

[upstream]
base_url = "https://upstream.test"
token = "tok"
alternate_models = ["gpt-5*-codex"]

[agent]
max_iterations = 5

[permissions]
approve = ["mcp", "read"]

[cli_tools]
allowed = ["ls", "git"]

[[mcp_servers]]
name = "search"
allowed_tools = ["search", "fetch"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.upstream.token.as_deref(), Some("tok"));
        assert_eq!(config.agent.max_iterations, 5);
        assert!(config.permissions.approve.approves(ToolKind::Mcp));
        assert!(!config.permissions.approve.approves(ToolKind::Shell));
        assert_eq!(config.cli_tools.allowed, vec!["ls", "git"]);
        assert_eq!(config.mcp_servers[0].name, "search");
        assert_eq!(config.mcp_servers[0].allowed_tools.len(), 2);
    }

    #[test]
    fn blanket_approval_parses() {
        let config: AppConfig = toml::from_str("[permissions]\napprove = true\n").unwrap();
        assert!(config.permissions.approve.approves(ToolKind::Shell));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[gateway\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("4141"));
        assert!(toml_str.contains("max_iterations"));
    }
}
