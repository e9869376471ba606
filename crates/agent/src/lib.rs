//! The streamgate agent loop.
//!
//! The agent follows a **Request → Sort → Act** cycle:
//!
//! 1. **Request** a complete turn upstream with the conversation so far
//! 2. **Sort** the turn's tool calls into external, allowed, and blocked
//! 3. **Act**: run external tools here, refuse blocked ones, hand allowed
//!    ones back to the caller
//!
//! The loop ends when there is an answer for the caller or the iteration
//! cap is reached.

pub mod collect;
pub mod orchestrator;
pub mod reply;

pub use collect::{CollectedTurn, collect_turn};
pub use orchestrator::AgentOrchestrator;
pub use reply::{AgentReply, render_complete};
