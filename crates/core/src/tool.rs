//! Tool abstractions: externally discovered tools and streamed tool calls.
//!
//! External tools live behind a tool host (usually an MCP-style subprocess)
//! that the gateway only talks to through [`ToolCatalog`] and
//! [`ToolExecutor`]. Tool calls issued by the model arrive as fragments and
//! are merged by [`ToolCallAccumulator`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolSpec;
use crate::stream::ToolCallDelta;

/// A tool discovered from a tool host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTool {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(default)]
    pub schema: serde_json::Value,

    /// Name of the server that provides this tool
    pub server: String,
}

impl ExternalTool {
    /// Convert into a definition the model can see.
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec::function(
            self.name.clone(),
            (!self.description.is_empty()).then(|| self.description.clone()),
            Some(self.schema.clone()),
        )
    }
}

/// Lists the tools a tool host currently offers.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<ExternalTool>, ToolError>;
}

/// Executes a tool on the tool host and returns its text output.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn call(&self, name: &str, arguments: &str) -> Result<String, ToolError>;
}

/// A tool host with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalTools;

#[async_trait]
impl ToolCatalog for NoExternalTools {
    async fn list(&self) -> Result<Vec<ExternalTool>, ToolError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ToolExecutor for NoExternalTools {
    async fn call(&self, name: &str, _arguments: &str) -> Result<String, ToolError> {
        Err(ToolError::NotStarted(format!("no tool host available for '{name}'")))
    }
}

/// Merges tool-call fragments keyed by index.
///
/// `id` and `type` keep the first non-empty value seen; `name` and
/// `arguments` are concatenated in arrival order. An index that never
/// received a name fragment produces no tool call.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    kind: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the fragments of one delta. Fragments without an index are
    /// keyed by their position in the delta.
    pub fn push_all(&mut self, deltas: &[ToolCallDelta]) {
        for (position, delta) in deltas.iter().enumerate() {
            self.push(delta, position as u32);
        }
    }

    /// Merge a single fragment.
    pub fn push(&mut self, delta: &ToolCallDelta, fallback_index: u32) {
        let entry = self
            .calls
            .entry(delta.index.unwrap_or(fallback_index))
            .or_default();

        if entry.id.is_empty()
            && let Some(id) = delta.id.as_deref()
        {
            entry.id = id.to_string();
        }
        if entry.kind.is_empty()
            && let Some(kind) = delta.kind.as_deref()
        {
            entry.kind = kind.to_string();
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                entry.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                entry.arguments.push_str(arguments);
            }
        }
    }

    /// Complete tool calls in index order.
    pub fn build(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| ToolCall {
                id: call.id,
                index: Some(index),
                kind: if call.kind.is_empty() {
                    "function".into()
                } else {
                    call.kind
                },
                function: crate::message::FunctionCall {
                    name: call.name,
                    arguments: call.arguments,
                },
            })
            .collect()
    }
}
