//! Security module for streamgate: who may run which tool.
//!
//! Provides:
//! - **Allow-lists**: name matching with `"*"` wildcard support
//! - **Tool policy**: the two-tier check (kind approval, then allow-list)
//!   applied to client-side CLI tools and server-side external tools

pub mod allowlist;
pub mod policy;

pub use allowlist::{AllowList, matches};
pub use policy::{DenialReason, ToolDecision, ToolPolicy};
