//! Upstream plumbing for streamgate.
//!
//! - [`sse`]: byte stream → framed events
//! - [`responses`]: responses-style protocol ↔ chat-completion chunks
//! - [`effort`]: reasoning-effort negotiation with per-model ceilings
//! - [`http`], [`credentials`], [`endpoint`]: the in-tree collaborators
//! - [`dispatch`]: ties the above together for one upstream turn

pub mod credentials;
pub mod dispatch;
pub mod effort;
pub mod endpoint;
pub mod http;
pub mod responses;
pub mod sse;

pub use credentials::StaticCredentials;
pub use dispatch::UpstreamDispatcher;
pub use effort::EffortNegotiator;
pub use endpoint::ConfiguredEndpointSelector;
pub use http::HttpUpstreamClient;
pub use responses::{ResponsesTranslator, build_responses_request, translate_stream};
pub use sse::{EventStreamParser, spawn_event_stream};
