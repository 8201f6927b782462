use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::events::{BoardEvent, EventKind, EventRecord};

/// Materialized workspace state. Workspaces only ever exist or not.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceState {
    pub id: String,
    pub created: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkspaceState {
    pub fn initial(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created: false,
            created_at: None,
        }
    }
}

/// Materialized project state, built by replaying events through the fold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: String,
    pub created: bool,
    pub deleted: bool,
    pub columns: HashMap<String, ColumnState>,
    pub cards: HashMap<String, CardState>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColumnState {
    pub id: String,
    pub name: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CardState {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub description: String,
    pub position: i64,
    /// Ordered dependency card ids, duplicates suppressed on apply.
    pub dependencies: Vec<String>,
}

/// Pure function: apply one workspace event and return the new state.
///
/// Takes the full record because `created_at` comes from the event timestamp.
pub fn apply_workspace(mut state: WorkspaceState, record: &EventRecord) -> WorkspaceState {
    if let EventKind::Known(BoardEvent::WorkspaceCreated { workspace_id }) = &record.event {
        state.id = workspace_id.clone();
        state.created = true;
        state.created_at = Some(record.timestamp);
    }
    state
}

pub fn fold_workspace(id: &str, events: &[EventRecord]) -> WorkspaceState {
    events
        .iter()
        .fold(WorkspaceState::initial(id), apply_workspace)
}

/// Pure function: apply one project event and return the new state.
///
/// This is the heart of the replay engine. It is total and deterministic —
/// no clock, no randomness, no I/O — so replaying an identical event list
/// twice always yields identical state. Events that reference entities the
/// state does not hold are no-ops, as are tags this build does not know
/// (skipped in [`fold_project`]); business validation happens in commands,
/// never here.
pub fn apply_project(mut state: ProjectState, event: &BoardEvent) -> ProjectState {
    match event {
        BoardEvent::ProjectCreated {
            project_id,
            workspace_id,
            name,
            description,
        } => {
            state.id = project_id.clone();
            state.workspace_id = workspace_id.clone();
            state.name = name.clone();
            state.description = description.clone();
            state.created = true;
        }

        BoardEvent::ProjectRenamed { name } => {
            state.name = name.clone();
        }

        BoardEvent::ProjectDescriptionUpdated { description } => {
            state.description = description.clone();
        }

        BoardEvent::ProjectDeleted {} => {
            // Soft marker only — columns and cards stay in the state.
            state.deleted = true;
        }

        BoardEvent::ColumnAdded {
            column_id,
            name,
            position,
        } => {
            state.columns.insert(
                column_id.clone(),
                ColumnState {
                    id: column_id.clone(),
                    name: name.clone(),
                    position: *position,
                },
            );
        }

        BoardEvent::ColumnRenamed { column_id, name } => {
            if let Some(column) = state.columns.get_mut(column_id) {
                column.name = name.clone();
            }
        }

        BoardEvent::ColumnMoved {
            column_id,
            position,
        } => {
            // The literal requested position — siblings are never renumbered.
            if let Some(column) = state.columns.get_mut(column_id) {
                column.position = *position;
            }
        }

        BoardEvent::ColumnDeleted { column_id } => {
            state.columns.remove(column_id);
        }

        BoardEvent::CardAdded {
            card_id,
            column_id,
            title,
            description,
            position,
            ..
        } => {
            state.cards.insert(
                card_id.clone(),
                CardState {
                    id: card_id.clone(),
                    column_id: column_id.clone(),
                    title: title.clone(),
                    description: description.clone(),
                    position: *position,
                    dependencies: Vec::new(),
                },
            );
        }

        BoardEvent::CardUpdated {
            card_id,
            title,
            description,
            ..
        } => {
            // Only provided fields change; omitted fields are preserved.
            if let Some(card) = state.cards.get_mut(card_id) {
                if let Some(title) = title {
                    card.title = title.clone();
                }
                if let Some(description) = description {
                    card.description = description.clone();
                }
            }
        }

        BoardEvent::CardMoved {
            card_id,
            column_id,
            position,
            ..
        } => {
            if let Some(card) = state.cards.get_mut(card_id) {
                card.column_id = column_id.clone();
                card.position = *position;
            }
        }

        BoardEvent::CardDeleted { card_id, .. } => {
            state.cards.remove(card_id);
        }

        BoardEvent::DependencyAdded {
            card_id,
            depends_on_id,
            ..
        } => {
            // Idempotent: a repeated edge (the event is still recorded) and a
            // self-edge both leave the projection unchanged.
            if card_id != depends_on_id {
                if let Some(card) = state.cards.get_mut(card_id) {
                    if !card.dependencies.iter().any(|d| d == depends_on_id) {
                        card.dependencies.push(depends_on_id.clone());
                    }
                }
            }
        }

        BoardEvent::DependencyRemoved {
            card_id,
            depends_on_id,
            ..
        } => {
            if let Some(card) = state.cards.get_mut(card_id) {
                card.dependencies.retain(|d| d != depends_on_id);
            }
        }

        BoardEvent::WorkspaceCreated { .. } => {}
    }

    state
}

pub fn fold_project(events: &[EventRecord]) -> ProjectState {
    events
        .iter()
        .fold(ProjectState::default(), |state, record| {
            match &record.event {
                EventKind::Known(event) => apply_project(state, event),
                // Tags written by a newer build fold as no-ops.
                EventKind::Unknown { .. } => state,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(version: i64, event: BoardEvent) -> EventRecord {
        EventRecord {
            id: Some(version),
            event: EventKind::Known(event),
            version,
            timestamp: Utc::now(),
        }
    }

    fn sample_events() -> Vec<EventRecord> {
        vec![
            record(
                1,
                BoardEvent::ProjectCreated {
                    project_id: "p1".to_string(),
                    workspace_id: "w1".to_string(),
                    name: "Roadmap".to_string(),
                    description: "Q3 work".to_string(),
                },
            ),
            record(
                2,
                BoardEvent::ColumnAdded {
                    column_id: "col-a".to_string(),
                    name: "To Do".to_string(),
                    position: 0,
                },
            ),
            record(
                3,
                BoardEvent::CardAdded {
                    card_id: "card-1".to_string(),
                    column_id: "col-a".to_string(),
                    title: "Ship it".to_string(),
                    description: String::new(),
                    position: 0,
                    source: None,
                },
            ),
        ]
    }

    #[test]
    fn replay_is_deterministic() {
        let events = sample_events();
        assert_eq!(fold_project(&events), fold_project(&events));
    }

    #[test]
    fn unknown_events_are_no_ops() {
        let mut events = sample_events();
        let without_unknown = fold_project(&events);
        events.push(EventRecord {
            id: Some(4),
            event: EventKind::Unknown {
                event_type: "card_archived".to_string(),
                event_data: serde_json::json!({ "card_id": "card-1" }),
            },
            version: 4,
            timestamp: Utc::now(),
        });
        assert_eq!(fold_project(&events), without_unknown);
    }

    #[test]
    fn card_update_preserves_omitted_fields() {
        let mut events = sample_events();
        events.push(record(
            4,
            BoardEvent::CardUpdated {
                card_id: "card-1".to_string(),
                title: None,
                description: Some("now with detail".to_string()),
                source: None,
            },
        ));
        let state = fold_project(&events);
        let card = &state.cards["card-1"];
        assert_eq!(card.title, "Ship it");
        assert_eq!(card.description, "now with detail");
    }

    #[test]
    fn repeated_dependency_is_applied_once() {
        let mut events = sample_events();
        events.push(record(
            4,
            BoardEvent::CardAdded {
                card_id: "card-2".to_string(),
                column_id: "col-a".to_string(),
                title: "Blocker".to_string(),
                description: String::new(),
                position: 1,
                source: None,
            },
        ));
        for version in 5..7 {
            events.push(record(
                version,
                BoardEvent::DependencyAdded {
                    card_id: "card-1".to_string(),
                    depends_on_id: "card-2".to_string(),
                    source: None,
                },
            ));
        }
        let state = fold_project(&events);
        assert_eq!(state.cards["card-1"].dependencies, vec!["card-2"]);
    }

    #[test]
    fn project_delete_is_a_soft_marker() {
        let mut events = sample_events();
        events.push(record(4, BoardEvent::ProjectDeleted {}));
        let state = fold_project(&events);
        assert!(state.deleted);
        assert_eq!(state.columns.len(), 1);
        assert_eq!(state.cards.len(), 1);
    }

    #[test]
    fn mutations_on_missing_entities_are_no_ops() {
        let mut events = sample_events();
        events.push(record(
            4,
            BoardEvent::ColumnRenamed {
                column_id: "col-missing".to_string(),
                name: "ghost".to_string(),
            },
        ));
        events.push(record(
            5,
            BoardEvent::CardMoved {
                card_id: "card-missing".to_string(),
                column_id: "col-a".to_string(),
                position: 3,
                source: None,
            },
        ));
        let base = fold_project(&sample_events());
        assert_eq!(fold_project(&events), base);
    }

    #[test]
    fn workspace_fold_records_creation_time() {
        let created = record(
            1,
            BoardEvent::WorkspaceCreated {
                workspace_id: "w1".to_string(),
            },
        );
        let state = fold_workspace("w1", std::slice::from_ref(&created));
        assert!(state.created);
        assert_eq!(state.created_at, Some(created.timestamp));
    }
}
