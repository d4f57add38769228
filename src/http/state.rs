use crate::jobs::BotManager;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Bot jobs (job_id → job)
    pub manager: Arc<BotManager>,
}

impl AppState {
    pub fn new(manager: BotManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
