//! One upstream turn: credentials, endpoint choice, effort negotiation.

use std::sync::Arc;

use streamgate_config::AppConfig;
use streamgate_core::{
    ChatRequest, Credentials, Endpoint, EndpointSelector, FramedEventStream, UpstreamClient,
    UpstreamError,
};
use tracing::debug;

use crate::credentials::StaticCredentials;
use crate::effort::EffortNegotiator;
use crate::endpoint::ConfiguredEndpointSelector;
use crate::http::HttpUpstreamClient;
use crate::responses::{build_responses_request, translate_stream};

/// Opens caller-shape chunk streams for turn requests.
///
/// Whatever endpoint serves the model, the returned stream yields chunk
/// JSON events followed by `[DONE]`.
pub struct UpstreamDispatcher {
    credentials: Arc<dyn Credentials>,
    client: Arc<dyn UpstreamClient>,
    selector: Arc<dyn EndpointSelector>,
    negotiator: EffortNegotiator,
}

impl UpstreamDispatcher {
    pub fn new(
        credentials: Arc<dyn Credentials>,
        client: Arc<dyn UpstreamClient>,
        selector: Arc<dyn EndpointSelector>,
    ) -> Self {
        Self {
            credentials,
            client,
            selector,
            negotiator: EffortNegotiator::new(),
        }
    }

    /// Wire up the in-tree HTTP client, static credentials, and the
    /// configured endpoint selector.
    pub fn from_config(config: &AppConfig) -> Result<Self, UpstreamError> {
        Ok(Self::new(
            Arc::new(StaticCredentials::from_config(&config.upstream)),
            Arc::new(HttpUpstreamClient::new()?),
            Arc::new(ConfiguredEndpointSelector::from_config(&config.upstream)),
        ))
    }

    pub fn negotiator(&self) -> &EffortNegotiator {
        &self.negotiator
    }

    /// Open a stream for one turn.
    pub async fn open(&self, request: ChatRequest) -> Result<FramedEventStream, UpstreamError> {
        let credentials = self.credentials.current().await?;
        let endpoint = self.selector.select(&request.model);
        debug!(model = %request.model, ?endpoint, messages = request.messages.len(), "Dispatching turn");

        self.negotiator
            .attempt(request, |request| {
                let client = Arc::clone(&self.client);
                let credentials = credentials.clone();
                async move {
                    match endpoint {
                        Endpoint::Primary => client.stream_primary(&request, &credentials).await,
                        Endpoint::Alternate => {
                            let body = build_responses_request(&request);
                            let events = client.stream_alternate(&body, &credentials).await?;
                            Ok(translate_stream(events, request.model))
                        }
                    }
                }
            })
            .await
    }
}
