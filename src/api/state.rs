use std::sync::Arc;

use crate::config::Config;
use crate::jobs::{ChangeFeed, Orchestrator};
use crate::store::Repository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<Repository>,
    pub orchestrator: Arc<Orchestrator>,
    pub changes: ChangeFeed,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<Repository>,
        orchestrator: Arc<Orchestrator>,
        changes: ChangeFeed,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            orchestrator,
            changes,
        }
    }
}
