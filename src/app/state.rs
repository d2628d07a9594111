//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let match_registry = Arc::new(MatchRegistry::new(config.max_matches));

        Self {
            config: Arc::new(config),
            match_registry,
        }
    }
}
