use serde::Serialize;

use crate::board::events::{new_id, BoardEvent, EventRecord, StreamType};
use crate::board::reducer::{self, CardState, ColumnState, ProjectState};
use crate::board::workspace::WorkspaceAggregate;
use crate::board::BoardError;
use crate::storage::EventStore;

/// Fixed columns every new project starts with, at positions 0, 1, 2.
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Nested board snapshot: columns ascending by position, each holding its
/// cards ascending by position.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: String,
    pub deleted: bool,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnView {
    pub id: String,
    pub name: String,
    pub position: i64,
    pub cards: Vec<CardState>,
}

/// The core state machine: columns, cards, and dependency edges over one
/// project stream.
///
/// An aggregate handle is loaded once (full replay) and then mutated through
/// commands. Each command validates against the in-memory projection, appends
/// its event(s) at the next version, and folds them back into the projection.
/// Commands that append multiple events (create, the delete cascades) are not
/// atomic: each event is durable and broadcast the moment it lands, and a
/// conflict mid-cascade leaves the earlier events in place.
pub struct ProjectAggregate<'a> {
    store: &'a EventStore,
    project_id: String,
    state: ProjectState,
    version: i64,
}

impl<'a> ProjectAggregate<'a> {
    /// Create a new project under `workspace_id` (created lazily if absent)
    /// with the three default columns. One logical operation, four events.
    pub async fn create(
        store: &'a EventStore,
        workspace_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ProjectAggregate<'a>, BoardError> {
        WorkspaceAggregate::new(store).ensure(workspace_id).await?;

        let project_id = new_id();
        let mut project = ProjectAggregate {
            store,
            project_id: project_id.clone(),
            state: ProjectState::default(),
            version: 0,
        };
        project
            .emit(BoardEvent::ProjectCreated {
                project_id,
                workspace_id: workspace_id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?;
        for (position, name) in DEFAULT_COLUMNS.iter().enumerate() {
            project
                .emit(BoardEvent::ColumnAdded {
                    column_id: new_id(),
                    name: (*name).to_string(),
                    position: position as i64,
                })
                .await?;
        }
        Ok(project)
    }

    /// Replay the project stream into an aggregate handle. Fails `NotFound`
    /// for a stream with no creation event; a soft-deleted project still
    /// loads, and callers gate on `exists()`.
    pub async fn load(
        store: &'a EventStore,
        project_id: &str,
    ) -> Result<ProjectAggregate<'a>, BoardError> {
        let events = store.events(StreamType::Project, project_id).await?;
        let state = reducer::fold_project(&events);
        if !state.created {
            return Err(BoardError::not_found("project", project_id));
        }
        Ok(ProjectAggregate {
            store,
            project_id: project_id.to_string(),
            version: events.last().map(|e| e.version).unwrap_or(0),
            state,
        })
    }

    pub fn id(&self) -> &str {
        &self.project_id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn exists(&self) -> bool {
        self.state.created && !self.state.deleted
    }

    pub fn is_deleted(&self) -> bool {
        self.state.deleted
    }

    /// Append one event at the next version and fold it into the projection.
    async fn emit(&mut self, event: BoardEvent) -> Result<EventRecord, BoardError> {
        let record = self
            .store
            .append(StreamType::Project, &self.project_id, &event, self.version + 1)
            .await?;
        self.version = record.version;
        self.state = reducer::apply_project(std::mem::take(&mut self.state), &event);
        Ok(record)
    }

    // ── Project-level commands ───────────────────────────────────────────────

    pub async fn rename(&mut self, name: &str) -> Result<(), BoardError> {
        self.emit(BoardEvent::ProjectRenamed {
            name: name.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn update_description(&mut self, description: &str) -> Result<(), BoardError> {
        self.emit(BoardEvent::ProjectDescriptionUpdated {
            description: description.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Soft delete. Column and card events stay in the stream untouched.
    pub async fn delete(&mut self) -> Result<(), BoardError> {
        self.emit(BoardEvent::ProjectDeleted {}).await?;
        Ok(())
    }

    // ── Column commands ──────────────────────────────────────────────────────

    pub async fn add_column(
        &mut self,
        name: &str,
        position: Option<i64>,
    ) -> Result<ColumnState, BoardError> {
        let column_id = new_id();
        let position = position.unwrap_or(self.state.columns.len() as i64);
        self.emit(BoardEvent::ColumnAdded {
            column_id: column_id.clone(),
            name: name.to_string(),
            position,
        })
        .await?;
        self.get_column(&column_id)
    }

    pub async fn rename_column(
        &mut self,
        column_id: &str,
        name: &str,
    ) -> Result<ColumnState, BoardError> {
        if !self.state.columns.contains_key(column_id) {
            return Err(BoardError::not_found("column", column_id));
        }
        self.emit(BoardEvent::ColumnRenamed {
            column_id: column_id.to_string(),
            name: name.to_string(),
        })
        .await?;
        self.get_column(column_id)
    }

    /// Stores the literal requested position. Siblings are never renumbered,
    /// so duplicate or out-of-range positions are representable.
    pub async fn move_column(
        &mut self,
        column_id: &str,
        position: i64,
    ) -> Result<ColumnState, BoardError> {
        if !self.state.columns.contains_key(column_id) {
            return Err(BoardError::not_found("column", column_id));
        }
        self.emit(BoardEvent::ColumnMoved {
            column_id: column_id.to_string(),
            position,
        })
        .await?;
        self.get_column(column_id)
    }

    /// Delete a column, first re-homing its cards to the lowest-position
    /// column one at a time. Each move is its own CardMoved event with the
    /// destination position computed at that step. When the deleted column is
    /// itself the lowest-position one, no cards move.
    pub async fn delete_column(&mut self, column_id: &str) -> Result<(), BoardError> {
        if !self.state.columns.contains_key(column_id) {
            return Err(BoardError::not_found("column", column_id));
        }

        let lowest = self
            .state
            .columns
            .values()
            .min_by_key(|c| (c.position, c.id.clone()))
            .map(|c| c.id.clone());
        if let Some(destination) = lowest.filter(|id| id != column_id) {
            let mut stranded: Vec<(i64, String)> = self
                .state
                .cards
                .values()
                .filter(|card| card.column_id == column_id)
                .map(|card| (card.position, card.id.clone()))
                .collect();
            stranded.sort();
            for (_, card_id) in stranded {
                self.move_card(&card_id, &destination, None, None).await?;
            }
        }

        self.emit(BoardEvent::ColumnDeleted {
            column_id: column_id.to_string(),
        })
        .await?;
        Ok(())
    }

    // ── Card commands ────────────────────────────────────────────────────────

    pub async fn add_card(
        &mut self,
        column_id: &str,
        title: &str,
        description: &str,
        position: Option<i64>,
        source: Option<String>,
    ) -> Result<CardState, BoardError> {
        if !self.state.columns.contains_key(column_id) {
            return Err(BoardError::not_found("column", column_id));
        }
        let card_id = new_id();
        let position = position.unwrap_or(self.cards_in_column(column_id) as i64);
        self.emit(BoardEvent::CardAdded {
            card_id: card_id.clone(),
            column_id: column_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            position,
            source,
        })
        .await?;
        self.get_card(&card_id)
    }

    /// Update only the provided fields; omitted fields are preserved on
    /// replay, never cleared.
    pub async fn update_card(
        &mut self,
        card_id: &str,
        title: Option<String>,
        description: Option<String>,
        source: Option<String>,
    ) -> Result<CardState, BoardError> {
        if !self.state.cards.contains_key(card_id) {
            return Err(BoardError::not_found("card", card_id));
        }
        self.emit(BoardEvent::CardUpdated {
            card_id: card_id.to_string(),
            title,
            description,
            source,
        })
        .await?;
        self.get_card(card_id)
    }

    pub async fn move_card(
        &mut self,
        card_id: &str,
        column_id: &str,
        position: Option<i64>,
        source: Option<String>,
    ) -> Result<CardState, BoardError> {
        if !self.state.cards.contains_key(card_id) {
            return Err(BoardError::not_found("card", card_id));
        }
        if !self.state.columns.contains_key(column_id) {
            return Err(BoardError::not_found("column", column_id));
        }
        // Default slot: after the cards already in the destination, not
        // counting the card being moved.
        let position = position.unwrap_or_else(|| {
            self.state
                .cards
                .values()
                .filter(|card| card.column_id == column_id && card.id != card_id)
                .count() as i64
        });
        self.emit(BoardEvent::CardMoved {
            card_id: card_id.to_string(),
            column_id: column_id.to_string(),
            position,
            source,
        })
        .await?;
        self.get_card(card_id)
    }

    /// Delete a card, first severing every inbound dependency edge (one
    /// DependencyRemoved per referencing card). The card's own outbound
    /// edges vanish with it.
    pub async fn delete_card(
        &mut self,
        card_id: &str,
        source: Option<String>,
    ) -> Result<(), BoardError> {
        if !self.state.cards.contains_key(card_id) {
            return Err(BoardError::not_found("card", card_id));
        }

        let mut referencers: Vec<String> = self
            .state
            .cards
            .values()
            .filter(|card| card.dependencies.iter().any(|d| d == card_id))
            .map(|card| card.id.clone())
            .collect();
        referencers.sort();
        for referencer in referencers {
            self.remove_dependency(&referencer, card_id, source.clone())
                .await?;
        }

        self.emit(BoardEvent::CardDeleted {
            card_id: card_id.to_string(),
            source,
        })
        .await?;
        Ok(())
    }

    // ── Dependency commands ──────────────────────────────────────────────────

    pub async fn add_dependency(
        &mut self,
        card_id: &str,
        depends_on_id: &str,
        source: Option<String>,
    ) -> Result<CardState, BoardError> {
        if !self.state.cards.contains_key(card_id) {
            return Err(BoardError::not_found("card", card_id));
        }
        if card_id == depends_on_id {
            return Err(BoardError::InvalidOperation(format!(
                "card {card_id} cannot depend on itself"
            )));
        }
        if !self.state.cards.contains_key(depends_on_id) {
            return Err(BoardError::not_found("card", depends_on_id));
        }
        self.emit(BoardEvent::DependencyAdded {
            card_id: card_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
            source,
        })
        .await?;
        self.get_card(card_id)
    }

    /// The target need not currently be a dependency; removal of an absent
    /// edge records the event and leaves the projection unchanged.
    pub async fn remove_dependency(
        &mut self,
        card_id: &str,
        depends_on_id: &str,
        source: Option<String>,
    ) -> Result<CardState, BoardError> {
        if !self.state.cards.contains_key(card_id) {
            return Err(BoardError::not_found("card", card_id));
        }
        self.emit(BoardEvent::DependencyRemoved {
            card_id: card_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
            source,
        })
        .await?;
        self.get_card(card_id)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn get_column(&self, column_id: &str) -> Result<ColumnState, BoardError> {
        self.state
            .columns
            .get(column_id)
            .cloned()
            .ok_or_else(|| BoardError::not_found("column", column_id))
    }

    pub fn get_card(&self, card_id: &str) -> Result<CardState, BoardError> {
        self.state
            .cards
            .get(card_id)
            .cloned()
            .ok_or_else(|| BoardError::not_found("card", card_id))
    }

    fn cards_in_column(&self, column_id: &str) -> usize {
        self.state
            .cards
            .values()
            .filter(|card| card.column_id == column_id)
            .count()
    }

    /// Nested snapshot for the read side.
    pub fn to_project(&self) -> Project {
        let mut columns: Vec<ColumnView> = self
            .state
            .columns
            .values()
            .map(|column| {
                let mut cards: Vec<CardState> = self
                    .state
                    .cards
                    .values()
                    .filter(|card| card.column_id == column.id)
                    .cloned()
                    .collect();
                cards.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
                ColumnView {
                    id: column.id.clone(),
                    name: column.name.clone(),
                    position: column.position,
                    cards,
                }
            })
            .collect();
        columns.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));

        Project {
            id: self.state.id.clone(),
            workspace_id: self.state.workspace_id.clone(),
            name: self.state.name.clone(),
            description: self.state.description.clone(),
            deleted: self.state.deleted,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ProjectBroadcaster;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> EventStore {
        EventStore::open(dir.path(), Arc::new(ProjectBroadcaster::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_seeds_three_default_columns() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let project = ProjectAggregate::create(&store, "w1", "Roadmap", "").await.unwrap();
        let snapshot = project.to_project();
        let names: Vec<&str> = snapshot.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["To Do", "In Progress", "Done"]);
        let positions: Vec<i64> = snapshot.columns.iter().map(|c| c.position).collect();
        assert_eq!(positions, [0, 1, 2]);

        let events = store
            .events(StreamType::Project, project.id())
            .await
            .unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(project.version(), 4);
    }

    #[tokio::test]
    async fn load_replays_to_the_same_projection() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "Roadmap", "").await.unwrap();
        let column = project.to_project().columns[0].id.clone();
        project
            .add_card(&column, "Ship it", "", None, None)
            .await
            .unwrap();
        project.rename("Renamed").await.unwrap();

        let reloaded = ProjectAggregate::load(&store, project.id()).await.unwrap();
        assert_eq!(reloaded.version(), project.version());
        let snapshot = reloaded.to_project();
        assert_eq!(snapshot.name, "Renamed");
        assert_eq!(snapshot.columns[0].cards.len(), 1);
    }

    #[tokio::test]
    async fn self_dependency_is_rejected_without_appending() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        let column = project.to_project().columns[0].id.clone();
        let card = project
            .add_card(&column, "A", "", None, None)
            .await
            .unwrap();

        let before = project.version();
        let err = project
            .add_dependency(&card.id, &card.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidOperation(_)));
        assert_eq!(project.version(), before);
    }

    #[tokio::test]
    async fn deleting_a_card_severs_inbound_edges() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        let column = project.to_project().columns[0].id.clone();
        let a = project.add_card(&column, "A", "", None, None).await.unwrap();
        let b = project.add_card(&column, "B", "", None, None).await.unwrap();
        let c = project.add_card(&column, "C", "", None, None).await.unwrap();
        project.add_dependency(&b.id, &a.id, None).await.unwrap();
        project.add_dependency(&c.id, &a.id, None).await.unwrap();

        let before = project.version();
        project.delete_card(&a.id, None).await.unwrap();
        // Two DependencyRemoved plus the CardDeleted itself.
        assert_eq!(project.version(), before + 3);
        assert!(project.get_card(&b.id).unwrap().dependencies.is_empty());
        assert!(project.get_card(&c.id).unwrap().dependencies.is_empty());
        assert!(project.get_card(&a.id).is_err());
    }

    #[tokio::test]
    async fn deleting_a_column_rehomes_cards_one_move_at_a_time() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        let snapshot = project.to_project();
        let to_do = snapshot.columns[0].id.clone();
        let in_progress = snapshot.columns[1].id.clone();

        let d1 = project
            .add_card(&to_do, "d1", "", None, None)
            .await
            .unwrap();
        let c1 = project
            .add_card(&in_progress, "c1", "", None, None)
            .await
            .unwrap();
        let c2 = project
            .add_card(&in_progress, "c2", "", None, None)
            .await
            .unwrap();

        let before = project.version();
        project.delete_column(&in_progress).await.unwrap();
        // Two CardMoved then one ColumnDeleted.
        assert_eq!(project.version(), before + 3);

        let c1 = project.get_card(&c1.id).unwrap();
        let c2 = project.get_card(&c2.id).unwrap();
        assert_eq!(c1.column_id, to_do);
        assert_eq!(c2.column_id, to_do);
        assert_eq!((d1.position, c1.position, c2.position), (0, 1, 2));
        assert!(project.get_column(&in_progress).is_err());
    }

    #[tokio::test]
    async fn deleting_the_lowest_column_moves_no_cards() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        let to_do = project.to_project().columns[0].id.clone();
        let card = project
            .add_card(&to_do, "stuck", "", None, None)
            .await
            .unwrap();

        let before = project.version();
        project.delete_column(&to_do).await.unwrap();
        assert_eq!(project.version(), before + 1);
        // The card keeps its now-dangling column reference.
        assert_eq!(project.get_card(&card.id).unwrap().column_id, to_do);
    }

    #[tokio::test]
    async fn soft_deleted_projects_still_load() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        project.delete().await.unwrap();
        assert!(!project.exists());

        let reloaded = ProjectAggregate::load(&store, project.id()).await.unwrap();
        assert!(reloaded.is_deleted());
        assert!(!reloaded.exists());
    }

    #[tokio::test]
    async fn move_column_keeps_the_literal_position() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut project = ProjectAggregate::create(&store, "w1", "P", "").await.unwrap();
        let to_do = project.to_project().columns[0].id.clone();

        let moved = project.move_column(&to_do, 7).await.unwrap();
        assert_eq!(moved.position, 7);
        // Siblings keep their positions; gaps and duplicates are allowed.
        let snapshot = project.to_project();
        let positions: Vec<i64> = snapshot.columns.iter().map(|c| c.position).collect();
        assert_eq!(positions, [1, 2, 7]);
    }
}
