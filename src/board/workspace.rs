use crate::board::events::{BoardEvent, StreamType};
use crate::board::reducer::{self, WorkspaceState};
use crate::board::BoardError;
use crate::storage::EventStore;

/// Root stream for one user's data. Creation is idempotent: asking for a
/// workspace that already exists is a successful no-op.
pub struct WorkspaceAggregate<'a> {
    store: &'a EventStore,
}

impl<'a> WorkspaceAggregate<'a> {
    pub fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Replay the workspace stream into its current state.
    pub async fn load(&self, workspace_id: &str) -> Result<WorkspaceState, BoardError> {
        let events = self.store.events(StreamType::Workspace, workspace_id).await?;
        Ok(reducer::fold_workspace(workspace_id, &events))
    }

    pub async fn exists(&self, workspace_id: &str) -> Result<bool, BoardError> {
        Ok(self.load(workspace_id).await?.created)
    }

    /// Get-or-create. Returns the state after ensuring the creation event
    /// exists; a concurrent create racing us wins harmlessly, so a version
    /// conflict here is swallowed and the stream re-read.
    pub async fn ensure(&self, workspace_id: &str) -> Result<WorkspaceState, BoardError> {
        let state = self.load(workspace_id).await?;
        if state.created {
            return Ok(state);
        }
        let event = BoardEvent::WorkspaceCreated {
            workspace_id: workspace_id.to_string(),
        };
        match self
            .store
            .append(StreamType::Workspace, workspace_id, &event, 1)
            .await
        {
            Ok(_) => {}
            Err(BoardError::Conflict { .. }) => {}
            Err(e) => return Err(e),
        }
        self.load(workspace_id).await
    }
}
