//! # streamgate core
//!
//! Domain types, collaborator traits, and error definitions for the
//! streamgate chat-completion gateway. This crate has **no HTTP or web
//! framework dependencies**; from tokio it only uses the `mpsc` channel that
//! carries event streams. It defines the model every other crate speaks.
//!
//! ## Layout
//!
//! - [`message`]: conversation turns and tool calls in the caller-facing shape
//! - [`provider`]: the turn request, reasoning effort, and upstream traits
//! - [`stream`]: framed SSE events and caller-facing delta chunks
//! - [`tool`]: external tool catalogue/executor traits and fragment merging
//! - [`permission`]: the approval policy applied to tool kinds

pub mod error;
pub mod message;
pub mod permission;
pub mod provider;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ToolError, UpstreamError};
pub use message::{ContentPart, FunctionCall, Message, MessageContent, Role, ToolCall};
pub use permission::{PermissionPolicy, ToolKind};
pub use provider::{
    ChatRequest, Credentials, Endpoint, EndpointSelector, ReasoningEffort, ToolSpec,
    UpstreamClient, UpstreamCredentials,
};
pub use stream::{ChatChunk, ChunkBuilder, FramedEvent, FramedEventStream, DONE_SENTINEL};
pub use tool::{ExternalTool, NoExternalTools, ToolCallAccumulator, ToolCatalog, ToolExecutor};
