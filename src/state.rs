use std::sync::Arc;

use crate::config::Config;
use crate::llm::VisionModel;

/// Shared across requests. Holds the injected configuration and model client;
/// there is no mutable cross-request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model: Arc<dyn VisionModel>,
}

impl AppState {
    pub fn new(config: Config, model: Arc<dyn VisionModel>) -> Self {
        AppState {
            config: Arc::new(config),
            model,
        }
    }
}
