//! Reasoning-effort negotiation.
//!
//! Upstreams reject effort levels a model does not support with a 4xx whose
//! body quotes the offending label. The negotiator retries with the next
//! lower level and remembers the lowered level as the model's ceiling, so
//! later requests for the same model start from a level that works.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use streamgate_core::{ChatRequest, ReasoningEffort, UpstreamError};
use tracing::{debug, warn};

/// Attempts that may downgrade the effort before the final call.
pub const MAX_EFFORT_ATTEMPTS: usize = 3;

/// Per-model effort ceilings learned from rejections.
#[derive(Debug, Default)]
pub struct EffortNegotiator {
    ceilings: Mutex<HashMap<String, ReasoningEffort>>,
}

impl EffortNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The highest level known to be accepted by `model`, if one was learned.
    pub fn ceiling(&self, model: &str) -> Option<ReasoningEffort> {
        self.ceilings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .copied()
    }

    fn record_ceiling(&self, model: &str, effort: ReasoningEffort) {
        self.ceilings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.to_string(), effort);
    }

    /// Lower the requested effort to the model's ceiling.
    pub fn clamp(&self, request: &mut ChatRequest) {
        let Some(requested) = request.reasoning_effort else {
            return;
        };
        if let Some(ceiling) = self.ceiling(&request.model)
            && ceiling < requested
        {
            debug!(model = %request.model, %requested, %ceiling, "Clamping reasoning effort");
            request.reasoning_effort = Some(ceiling);
        }
    }

    /// Run `perform`, degrading the effort each time the upstream rejects it.
    ///
    /// Attempts run strictly one after another. After
    /// [`MAX_EFFORT_ATTEMPTS`] rejections one final call is made and its
    /// outcome returned as-is.
    pub async fn attempt<T, F, Fut>(
        &self,
        mut request: ChatRequest,
        mut perform: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut(ChatRequest) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        for attempt in 1..=MAX_EFFORT_ATTEMPTS {
            self.clamp(&mut request);
            let err = match perform(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(effort) = request
                .reasoning_effort
                .filter(|effort| is_effort_rejection(&err, *effort))
            else {
                return Err(err);
            };

            match effort.next_lower() {
                Some(lower) => {
                    warn!(
                        model = %request.model,
                        attempt,
                        from = %effort,
                        to = %lower,
                        "Upstream rejected reasoning effort, downgrading"
                    );
                    self.record_ceiling(&request.model, lower);
                    request.reasoning_effort = Some(lower);
                }
                None => {
                    warn!(
                        model = %request.model,
                        attempt,
                        from = %effort,
                        "Upstream rejected lowest reasoning effort, retrying without it"
                    );
                    request.reasoning_effort = None;
                }
            }
        }

        self.clamp(&mut request);
        perform(request).await
    }
}

/// A 4xx whose body names the effort that was sent.
pub fn is_effort_rejection(err: &UpstreamError, effort: ReasoningEffort) -> bool {
    matches!(
        err,
        UpstreamError::Rejected { status, body }
            if (400..500).contains(status) && body.contains(effort.as_str())
    )
}
