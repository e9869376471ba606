//! The tool-calling agent loop.
//!
//! Each iteration sends the accumulated conversation upstream, collects the
//! complete turn, and sorts its tool calls:
//!
//! - calls to externally discovered tools run here, through the
//!   [`ToolExecutor`], subject to the tool policy
//! - other calls that the policy allows go back to the caller
//! - other calls the policy blocks are answered with a refusal turn
//!
//! The loop ends as soon as there is something to return to the caller, or
//! after `max_iterations` turns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use streamgate_config::{AppConfig, MAX_AGENT_ITERATIONS};
use streamgate_core::{
    ChatRequest, ExternalTool, Message, Result, ToolCall, ToolCatalog, ToolExecutor, ToolSpec,
};
use streamgate_providers::UpstreamDispatcher;
use streamgate_security::{DenialReason, ToolDecision, ToolPolicy};
use tracing::{debug, info, warn};

use crate::collect::collect_turn;
use crate::reply::AgentReply;

/// Drives one request to completion.
pub struct AgentOrchestrator {
    upstream: Arc<UpstreamDispatcher>,
    catalog: Arc<dyn ToolCatalog>,
    executor: Arc<dyn ToolExecutor>,
    policy: ToolPolicy,
    max_iterations: u32,
}

/// Tool calls of one turn, sorted by who handles them.
#[derive(Debug, Default)]
struct SortedCalls {
    /// External tool calls with the server that advertised them
    external: Vec<(ToolCall, String)>,
    /// Calls handed back to the caller
    allowed: Vec<ToolCall>,
    /// Calls refused by policy
    blocked: Vec<(ToolCall, DenialReason)>,
}

impl AgentOrchestrator {
    pub fn new(
        upstream: Arc<UpstreamDispatcher>,
        catalog: Arc<dyn ToolCatalog>,
        executor: Arc<dyn ToolExecutor>,
        policy: ToolPolicy,
    ) -> Self {
        Self {
            upstream,
            catalog,
            executor,
            policy,
            max_iterations: MAX_AGENT_ITERATIONS,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        upstream: Arc<UpstreamDispatcher>,
        catalog: Arc<dyn ToolCatalog>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self::new(upstream, catalog, executor, ToolPolicy::from_config(config))
            .with_max_iterations(config.agent.max_iterations)
    }

    /// Set the iteration cap. Values above the hard limit are clamped.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.min(MAX_AGENT_ITERATIONS);
        self
    }

    /// Tools offered by the tool host. A failing host means no external
    /// tools for this request.
    async fn discover_tools(&self) -> Vec<ExternalTool> {
        match self.catalog.list().await {
            Ok(tools) => {
                debug!(count = tools.len(), "Discovered external tools");
                tools
            }
            Err(e) => {
                warn!(error = %e, "Tool catalog unavailable, continuing without external tools");
                Vec::new()
            }
        }
    }

    /// Run the agent loop for one caller request.
    pub async fn run(&self, request: ChatRequest) -> Result<AgentReply> {
        let discovered = self.discover_tools().await;
        let caller_tools: HashSet<&str> = request.tools.iter().map(ToolSpec::name).collect();

        // Calls to any discovered tool run here, whoever declared it.
        let external: HashMap<String, String> = discovered
            .iter()
            .map(|tool| (tool.name.clone(), tool.server.clone()))
            .collect();
        // Upstream sees each name once; the caller's definition is kept.
        let mut tools = request.tools.clone();
        tools.extend(
            discovered
                .iter()
                .filter(|tool| !caller_tools.contains(tool.name.as_str()))
                .map(ExternalTool::to_spec),
        );

        let mut conversation = request.messages.clone();
        let turn_request = |messages: &[Message]| ChatRequest {
            messages: messages.to_vec(),
            tools: tools.clone(),
            ..request.clone()
        };

        for iteration in 0..self.max_iterations {
            debug!(
                model = %request.model,
                iteration,
                messages = conversation.len(),
                "Agent loop iteration"
            );

            let stream = self.upstream.open(turn_request(&conversation)).await?;
            let turn = collect_turn(stream).await?;

            if turn.tool_calls.is_empty() {
                return Ok(AgentReply::text(turn.content));
            }

            let sorted = self.sort_calls(&turn.tool_calls, &external);
            if sorted.external.is_empty() && sorted.blocked.is_empty() {
                debug!(count = sorted.allowed.len(), "Returning tool calls to caller");
                return Ok(AgentReply::tool_calls(turn.content, sorted.allowed));
            }

            conversation.push(Message::assistant_with_tool_calls(
                turn.content.clone(),
                turn.tool_calls.clone(),
            ));

            for (call, server) in &sorted.external {
                let output = self.run_external(call, server).await;
                conversation.push(Message::tool_result(call.id.clone(), output));
            }

            for (call, reason) in &sorted.blocked {
                conversation.push(Message::tool_result(
                    call.id.clone(),
                    reason.message(call.name()),
                ));
            }

            if !sorted.allowed.is_empty() {
                debug!(
                    allowed = sorted.allowed.len(),
                    blocked = sorted.blocked.len(),
                    "Returning allowed tool calls to caller"
                );
                return Ok(AgentReply::tool_calls(turn.content, sorted.allowed));
            }

            if sorted.external.is_empty() {
                continue;
            }

            debug!(iteration, "External tools ran, streaming next turn to caller");
            let stream = self.upstream.open(turn_request(&conversation)).await?;
            return Ok(AgentReply::Stream(stream));
        }

        warn!(
            model = %request.model,
            max_iterations = self.max_iterations,
            "Agent loop reached iteration cap"
        );
        Ok(AgentReply::empty())
    }

    fn sort_calls(&self, calls: &[ToolCall], external: &HashMap<String, String>) -> SortedCalls {
        let mut sorted = SortedCalls::default();
        for call in calls {
            if let Some(server) = external.get(call.name()) {
                sorted.external.push((call.clone(), server.clone()));
                continue;
            }
            match self.policy.check_cli(call.name()) {
                ToolDecision::Allowed => sorted.allowed.push(call.clone()),
                ToolDecision::Denied(reason) => {
                    info!(tool = %call.name(), reason = ?reason, "Blocked CLI tool call");
                    sorted.blocked.push((call.clone(), reason));
                }
            }
        }
        sorted
    }

    /// Policy check, then execution. Always produces the text of the
    /// tool-result turn.
    async fn run_external(&self, call: &ToolCall, server: &str) -> String {
        let name = call.name();
        if let ToolDecision::Denied(reason) = self.policy.check_external(name, server) {
            info!(tool = %name, server = %server, reason = ?reason, "Denied external tool call");
            return reason.message(name);
        }

        debug!(tool = %name, server = %server, "Executing external tool");
        match self.executor.call(name, &call.function.arguments).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %name, error = %e, "External tool failed");
                format!("Error executing tool {name}: {e}")
            }
        }
    }
}
