pub mod board;
pub mod broadcast;
pub mod config;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use broadcast::ProjectBroadcaster;
use config::BoardConfig;
use storage::EventStore;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<BoardConfig>,
    pub store: EventStore,
    pub broadcaster: Arc<ProjectBroadcaster>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub async fn new(config: BoardConfig) -> Result<Self, board::BoardError> {
        let broadcaster = Arc::new(ProjectBroadcaster::new());
        let store = EventStore::open(&config.data_dir, Arc::clone(&broadcaster)).await?;
        Ok(Self {
            config: Arc::new(config),
            store,
            broadcaster,
            started_at: std::time::Instant::now(),
        })
    }
}
