//! Tool permission policy.
//!
//! A policy approves tool *kinds*, not individual tools: either a blanket
//! yes/no or an explicit set of approved kinds. Per-tool allow-lists are a
//! second tier enforced by `streamgate-security`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The kind of capability a tool call exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Read,
    Write,
    Shell,
    Mcp,
    Url,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Shell => "shell",
            Self::Mcp => "mcp",
            Self::Url => "url",
        }
    }
}

/// Either a single boolean applied to every kind, or an explicit set of
/// approved kinds.
///
/// In TOML: `approve = true` or `approve = ["read", "mcp"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionPolicy {
    All(bool),
    Kinds(BTreeSet<ToolKind>),
}

impl PermissionPolicy {
    /// Whether calls of this kind may run without further confirmation.
    pub fn approves(&self, kind: ToolKind) -> bool {
        match self {
            Self::All(approved) => *approved,
            Self::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::All(false)
    }
}
