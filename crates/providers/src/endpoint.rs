//! Endpoint selection by model id.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use streamgate_config::UpstreamConfig;
use streamgate_core::{Endpoint, EndpointSelector};
use tracing::debug;

/// Routes models matching `alternate_models` to the responses-style
/// endpoint. Decisions are cached per model id.
#[derive(Debug)]
pub struct ConfiguredEndpointSelector {
    alternate_models: Vec<String>,
    primary_by_default: bool,
    cache: Mutex<HashMap<String, Endpoint>>,
}

impl ConfiguredEndpointSelector {
    pub fn new(alternate_models: Vec<String>, primary_by_default: bool) -> Self {
        Self {
            alternate_models,
            primary_by_default,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.alternate_models.clone(), config.primary_by_default)
    }

    fn resolve(&self, model: &str) -> Endpoint {
        let alternate = self
            .alternate_models
            .iter()
            .any(|pattern| glob_matches(pattern, model));
        match (alternate, self.primary_by_default) {
            (true, _) | (false, false) => Endpoint::Alternate,
            (false, true) => Endpoint::Primary,
        }
    }
}

impl EndpointSelector for ConfiguredEndpointSelector {
    fn select(&self, model: &str) -> Endpoint {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(endpoint) = cache.get(model) {
            return *endpoint;
        }
        let endpoint = self.resolve(model);
        debug!(model = %model, ?endpoint, "Selected upstream endpoint");
        cache.insert(model.to_string(), endpoint);
        endpoint
    }
}

/// `*` matches any run of characters, everything else matches literally.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let middle: Vec<&str> = parts.collect();
    let Some((last, middle)) = middle.split_last() else {
        // no `*` at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
