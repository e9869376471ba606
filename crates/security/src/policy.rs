//! Two-tier tool policy: kind approval first, then the allow-list.
//!
//! CLI tools are executed by the caller, so the gateway only decides whether
//! to hand them back. External tools run server-side and are additionally
//! scoped to the server that advertised them.

use std::collections::HashMap;

use streamgate_config::AppConfig;
use streamgate_core::{PermissionPolicy, ToolKind};
use tracing::debug;

use crate::allowlist::AllowList;

/// Result of checking a tool call against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    Allowed,
    Denied(DenialReason),
}

/// Why a tool call was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The shell kind is not approved.
    ShellNotApproved,
    /// Shell is approved but the name is not in the CLI allow-list.
    NotInCliAllowList,
    /// The external (mcp) kind is not approved.
    ExecutionNotApproved,
    /// The advertising server's allow-list excludes the tool.
    NotAllowedByServer { server: String },
    /// No server configuration matches the tool's server.
    NoMatchingServer { server: String },
}

impl DenialReason {
    /// Text of the tool-result turn recorded for a refused call.
    pub fn message(&self, tool_name: &str) -> String {
        match self {
            Self::ShellNotApproved => {
                format!("Tool '{tool_name}' was not run: shell execution not approved")
            }
            Self::NotInCliAllowList => {
                format!("Tool '{tool_name}' was not run: not in the allowed CLI tools list")
            }
            Self::ExecutionNotApproved => {
                format!("Tool '{tool_name}' was not run: execution not approved")
            }
            Self::NotAllowedByServer { server } => format!(
                "Tool '{tool_name}' was not run: not allowed by server configuration for '{server}'"
            ),
            Self::NoMatchingServer { server } => format!(
                "Tool '{tool_name}' was not run: no matching server configured for '{server}'"
            ),
        }
    }
}

/// Unified tool policy enforcement.
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    permissions: PermissionPolicy,
    cli_tools: AllowList,
    servers: HashMap<String, AllowList>,
}

impl ToolPolicy {
    pub fn new(permissions: PermissionPolicy, cli_tools: AllowList) -> Self {
        Self {
            permissions,
            cli_tools,
            servers: HashMap::new(),
        }
    }

    /// Register a server's allow-list.
    pub fn with_server(mut self, name: impl Into<String>, allowed: AllowList) -> Self {
        self.servers.insert(name.into(), allowed);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        config.mcp_servers.iter().fold(
            Self::new(
                config.permissions.approve.clone(),
                AllowList::from(config.cli_tools.allowed.as_slice()),
            ),
            |policy, server| {
                policy.with_server(
                    server.name.clone(),
                    AllowList::from(server.allowed_tools.as_slice()),
                )
            },
        )
    }

    /// Check a client-side tool.
    ///
    /// Rules:
    /// - shell kind unapproved → denied
    /// - name not in the CLI allow-list → denied
    pub fn check_cli(&self, name: &str) -> ToolDecision {
        let decision = if !self.permissions.approves(ToolKind::Shell) {
            ToolDecision::Denied(DenialReason::ShellNotApproved)
        } else if !self.cli_tools.allows(name) {
            ToolDecision::Denied(DenialReason::NotInCliAllowList)
        } else {
            ToolDecision::Allowed
        };
        debug!(tool = %name, ?decision, "CLI tool policy check");
        decision
    }

    /// Check a tool advertised by `server`.
    ///
    /// Approval is checked before the server's allow-list.
    pub fn check_external(&self, name: &str, server: &str) -> ToolDecision {
        let decision = if !self.permissions.approves(ToolKind::Mcp) {
            ToolDecision::Denied(DenialReason::ExecutionNotApproved)
        } else {
            match self.servers.get(server) {
                None => ToolDecision::Denied(DenialReason::NoMatchingServer {
                    server: server.to_string(),
                }),
                Some(allowed) if !allowed.allows(name) => {
                    ToolDecision::Denied(DenialReason::NotAllowedByServer {
                        server: server.to_string(),
                    })
                }
                Some(_) => ToolDecision::Allowed,
            }
        };
        debug!(tool = %name, server = %server, ?decision, "External tool policy check");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_config::McpServerConfig;

    fn shell_policy(allowed: &[&str]) -> ToolPolicy {
        ToolPolicy::new(
            PermissionPolicy::Kinds([ToolKind::Shell].into()),
            AllowList::new(allowed.iter().copied()),
        )
    }

    #[test]
    fn cli_tool_allowed_when_approved_and_listed() {
        assert_eq!(shell_policy(&["ls"]).check_cli("ls"), ToolDecision::Allowed);
    }

    #[test]
    fn cli_wildcard_allows_any_name() {
        assert_eq!(shell_policy(&["*"]).check_cli("cargo"), ToolDecision::Allowed);
    }

    #[test]
    fn unapproved_shell_wins_over_allowlist() {
        let policy = ToolPolicy::new(PermissionPolicy::All(false), AllowList::new(["rm"]));
        assert_eq!(
            policy.check_cli("rm"),
            ToolDecision::Denied(DenialReason::ShellNotApproved)
        );
    }

    #[test]
    fn approved_shell_but_unlisted_name() {
        assert_eq!(
            shell_policy(&["ls"]).check_cli("rm"),
            ToolDecision::Denied(DenialReason::NotInCliAllowList)
        );
    }

    #[test]
    fn external_tool_checks_approval_first() {
        let policy = ToolPolicy::new(PermissionPolicy::All(false), AllowList::default())
            .with_server("search", AllowList::new(["search"]));
        assert_eq!(
            policy.check_external("search", "search"),
            ToolDecision::Denied(DenialReason::ExecutionNotApproved)
        );
    }

    #[test]
    fn external_tool_scoped_to_server() {
        let policy = ToolPolicy::new(
            PermissionPolicy::Kinds([ToolKind::Mcp].into()),
            AllowList::default(),
        )
        .with_server("search", AllowList::new(["search"]))
        .with_server("files", AllowList::new(["*"]));

        assert_eq!(policy.check_external("search", "search"), ToolDecision::Allowed);
        assert_eq!(policy.check_external("read_file", "files"), ToolDecision::Allowed);
        assert!(matches!(
            policy.check_external("delete", "search"),
            ToolDecision::Denied(DenialReason::NotAllowedByServer { .. })
        ));
        assert!(matches!(
            policy.check_external("query", "db"),
            ToolDecision::Denied(DenialReason::NoMatchingServer { .. })
        ));
    }

    #[test]
    fn denial_messages_are_distinct() {
        assert!(DenialReason::ShellNotApproved.message("rm").contains("not approved"));
        assert!(DenialReason::NotInCliAllowList
            .message("rm")
            .contains("not in the allowed CLI tools list"));
        assert!(DenialReason::ExecutionNotApproved
            .message("search")
            .contains("execution not approved"));
        assert!(DenialReason::NotAllowedByServer { server: "s".into() }
            .message("x")
            .contains("not allowed by server configuration"));
        assert!(DenialReason::NoMatchingServer { server: "s".into() }
            .message("x")
            .contains("no matching server configured"));
    }

    #[test]
    fn builds_from_config() {
        let mut config = AppConfig::default();
        config.permissions.approve = PermissionPolicy::All(true);
        config.cli_tools.allowed = vec!["git".into()];
        config.mcp_servers.push(McpServerConfig {
            name: "search".into(),
            allowed_tools: vec!["search".into()],
        });

        let policy = ToolPolicy::from_config(&config);
        assert_eq!(policy.check_cli("git"), ToolDecision::Allowed);
        assert_ne!(policy.check_cli("rm"), ToolDecision::Allowed);
        assert_eq!(policy.check_external("search", "search"), ToolDecision::Allowed);
    }
}
