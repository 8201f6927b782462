use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::board::events::{BoardEvent, EventKind, EventRecord, StreamType};
use crate::board::BoardError;
use crate::broadcast::ProjectBroadcaster;

// ─── Row type ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: i64,
    event_type: String,
    event_data: String,
    version: i64,
    timestamp: String,
}

impl EventRow {
    fn into_record(self) -> Result<EventRecord, BoardError> {
        let payload: Value = serde_json::from_str(&self.event_data)?;
        // Tags this build does not declare come back as EventKind::Unknown
        // with the raw payload intact, so reads never fail on them.
        let event: EventKind = serde_json::from_value(json!({
            "event_type": self.event_type,
            "event_data": payload,
        }))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| BoardError::Decode(format!("bad timestamp in event {}: {e}", self.id)))?
            .with_timezone(&Utc);
        Ok(EventRecord {
            id: Some(self.id),
            event,
            version: self.version,
            timestamp,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ─── EventStore ───────────────────────────────────────────────────────────────

/// Durable, ordered, append-only event log over SQLite.
///
/// Versions are unique per `(stream_type, stream_id)` and the unique index is
/// the sole concurrency guard: the later of two racing appends fails with
/// `Conflict` and the caller must reload and retry. I/O failures are fatal
/// and never retried here.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
    broadcaster: Arc<ProjectBroadcaster>,
}

impl EventStore {
    /// Open the store at `{data_dir}/boardd.db`, creating it if missing.
    pub async fn open(
        data_dir: &Path,
        broadcaster: Arc<ProjectBroadcaster>,
    ) -> Result<Self, BoardError> {
        let pool = super::open_pool(data_dir).await?;
        Ok(Self { pool, broadcaster })
    }

    /// Wrap an existing pool. The pool must already be migrated.
    pub fn with_pool(pool: SqlitePool, broadcaster: Arc<ProjectBroadcaster>) -> Self {
        Self { pool, broadcaster }
    }

    pub fn broadcaster(&self) -> Arc<ProjectBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Stamp a server timestamp, persist the event at `version`, and return
    /// the stored record (now carrying its sequence id).
    ///
    /// Fails with `Conflict` if `(stream_type, stream_id, version)` already
    /// exists; nothing is written in that case. Project-stream events are
    /// handed to the live broadcaster as soon as the insert succeeds.
    pub async fn append(
        &self,
        stream_type: StreamType,
        stream_id: &str,
        event: &BoardEvent,
        version: i64,
    ) -> Result<EventRecord, BoardError> {
        let (event_type, event_data) = event.wire_parts()?;
        // Truncate to microseconds so the stored RFC-3339 text is fixed-width
        // and lexicographic order equals chronological order.
        let timestamp = Utc::now().trunc_subsecs(6);

        let result = sqlx::query(
            "INSERT INTO events (stream_type, stream_id, event_type, event_data, version, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(stream_type.as_str())
        .bind(stream_id)
        .bind(&event_type)
        .bind(event_data.to_string())
        .bind(version)
        .bind(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await;

        let done = match result {
            Ok(done) => done,
            Err(e) if is_unique_violation(&e) => {
                return Err(BoardError::Conflict {
                    stream_type,
                    stream_id: stream_id.to_string(),
                    version,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let record = EventRecord {
            id: Some(done.last_insert_rowid()),
            event: EventKind::Known(event.clone()),
            version,
            timestamp,
        };

        if stream_type == StreamType::Project {
            self.broadcaster.broadcast(stream_id, &record);
        }

        Ok(record)
    }

    /// Full history of one stream, ordered by version.
    pub async fn events(
        &self,
        stream_type: StreamType,
        stream_id: &str,
    ) -> Result<Vec<EventRecord>, BoardError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, event_data, version, timestamp FROM events
             WHERE stream_type = ? AND stream_id = ?
             ORDER BY version ASC",
        )
        .bind(stream_type.as_str())
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EventRow::into_record).collect()
    }

    /// Highest version in the stream, or 0 if the stream is empty.
    pub async fn latest_version(
        &self,
        stream_type: StreamType,
        stream_id: &str,
    ) -> Result<i64, BoardError> {
        let (version,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM events
             WHERE stream_type = ? AND stream_id = ?",
        )
        .bind(stream_type.as_str())
        .bind(stream_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }

    /// The workspace's own stream merged with every project stream whose
    /// creation event references the workspace, ordered by timestamp across
    /// streams (ties broken by sequence id). `limit` keeps the newest tail.
    pub async fn workspace_events(
        &self,
        workspace_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, BoardError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, event_data, version, timestamp FROM events
             WHERE (stream_type = 'workspace' AND stream_id = ?)
                OR (stream_type = 'project' AND stream_id IN (
                     SELECT stream_id FROM events
                     WHERE stream_type = 'project'
                       AND event_type = 'project_created'
                       AND json_extract(event_data, '$.workspace_id') = ?))
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(workspace_id)
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = rows
            .into_iter()
            .map(EventRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(limit) = limit {
            if records.len() > limit {
                records = records.split_off(records.len() - limit);
            }
        }
        Ok(records)
    }

    /// One project stream filtered to events that name `card_id` as subject
    /// or as a dependency target, newest first. `limit` keeps the head.
    pub async fn card_events(
        &self,
        project_id: &str,
        card_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, BoardError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, event_data, version, timestamp FROM events
             WHERE stream_type = 'project' AND stream_id = ?
               AND (json_extract(event_data, '$.card_id') = ?
                 OR json_extract(event_data, '$.depends_on_id') = ?)
             ORDER BY version DESC
             LIMIT ?",
        )
        .bind(project_id)
        .bind(card_id)
        .bind(card_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EventRow::into_record).collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> EventStore {
        EventStore::open(dir.path(), Arc::new(ProjectBroadcaster::new()))
            .await
            .unwrap()
    }

    fn created(project_id: &str, workspace_id: &str) -> BoardEvent {
        BoardEvent::ProjectCreated {
            project_id: project_id.to_string(),
            workspace_id: workspace_id.to_string(),
            name: "P".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn append_stamps_sequence_id_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let record = store
            .append(StreamType::Project, "p1", &created("p1", "w1"), 1)
            .await
            .unwrap();
        assert!(record.id.is_some());
        assert_eq!(record.version, 1);

        let replayed = store.events(StreamType::Project, "p1").await.unwrap();
        assert_eq!(replayed, vec![record]);
    }

    #[tokio::test]
    async fn duplicate_version_fails_without_mutating_state() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .append(StreamType::Project, "p1", &created("p1", "w1"), 1)
            .await
            .unwrap();
        let err = store
            .append(
                StreamType::Project,
                "p1",
                &BoardEvent::ProjectRenamed {
                    name: "clash".to_string(),
                },
                1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Conflict { version: 1, .. }));

        let events = store.events(StreamType::Project, "p1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(store.latest_version(StreamType::Project, "p1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn latest_version_is_zero_for_empty_stream() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert_eq!(
            store
                .latest_version(StreamType::Workspace, "nope")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn workspace_events_merge_streams_in_timestamp_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .append(
                StreamType::Workspace,
                "w1",
                &BoardEvent::WorkspaceCreated {
                    workspace_id: "w1".to_string(),
                },
                1,
            )
            .await
            .unwrap();
        store
            .append(StreamType::Project, "p1", &created("p1", "w1"), 1)
            .await
            .unwrap();
        store
            .append(StreamType::Project, "p2", &created("p2", "other"), 1)
            .await
            .unwrap();
        store
            .append(
                StreamType::Project,
                "p1",
                &BoardEvent::ProjectRenamed {
                    name: "renamed".to_string(),
                },
                2,
            )
            .await
            .unwrap();

        let merged = store.workspace_events("w1", None).await.unwrap();
        // w1's own stream + p1's stream; p2 belongs to another workspace.
        assert_eq!(merged.len(), 3);
        assert!(merged.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let tail = store.workspace_events("w1", Some(2)).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].event, merged[2].event);
    }

    #[tokio::test]
    async fn card_events_filter_by_subject_and_dependency_target() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .append(StreamType::Project, "p1", &created("p1", "w1"), 1)
            .await
            .unwrap();
        store
            .append(
                StreamType::Project,
                "p1",
                &BoardEvent::CardAdded {
                    card_id: "c1".to_string(),
                    column_id: "col".to_string(),
                    title: "A".to_string(),
                    description: String::new(),
                    position: 0,
                    source: None,
                },
                2,
            )
            .await
            .unwrap();
        store
            .append(
                StreamType::Project,
                "p1",
                &BoardEvent::CardAdded {
                    card_id: "c2".to_string(),
                    column_id: "col".to_string(),
                    title: "B".to_string(),
                    description: String::new(),
                    position: 1,
                    source: None,
                },
                3,
            )
            .await
            .unwrap();
        store
            .append(
                StreamType::Project,
                "p1",
                &BoardEvent::DependencyAdded {
                    card_id: "c2".to_string(),
                    depends_on_id: "c1".to_string(),
                    source: None,
                },
                4,
            )
            .await
            .unwrap();

        let history = store.card_events("p1", "c1", None).await.unwrap();
        // c1 as subject (card_added) and as dependency target, newest first.
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 4);
        assert_eq!(history[1].version, 2);

        let head = store.card_events("p1", "c1", Some(1)).await.unwrap();
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].version, 4);
    }

    #[tokio::test]
    async fn unknown_event_types_survive_the_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        sqlx::query(
            "INSERT INTO events (stream_type, stream_id, event_type, event_data, version, timestamp)
             VALUES ('project', 'p1', 'card_archived', '{\"card_id\":\"c9\",\"reason\":\"done\"}', 1,
                     '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let events = store.events(StreamType::Project, "p1").await.unwrap();
        assert_eq!(
            events[0].event,
            EventKind::Unknown {
                event_type: "card_archived".to_string(),
                event_data: json!({ "card_id": "c9", "reason": "done" }),
            }
        );

        // History endpoints serialize records as-is; the foreign tag and
        // payload come back untouched.
        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(value["event_type"], "card_archived");
        assert_eq!(value["event_data"]["card_id"], "c9");
        assert_eq!(value["event_data"]["reason"], "done");
        assert_eq!(value["version"], 1);
    }

    #[tokio::test]
    async fn streams_with_foreign_tags_still_read_end_to_end() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .append(StreamType::Project, "p1", &created("p1", "w1"), 1)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO events (stream_type, stream_id, event_type, event_data, version, timestamp)
             VALUES ('project', 'p1', 'card_archived', '{\"card_id\":\"c9\"}', 2,
                     '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let events = store.events(StreamType::Project, "p1").await.unwrap();
        assert_eq!(events.len(), 2);

        let merged = store.workspace_events("w1", None).await.unwrap();
        assert_eq!(merged.len(), 2);

        let history = store.card_events("p1", "c9", None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0].event, EventKind::Unknown { .. }));

        // The aggregate replays over the foreign tag and keeps counting
        // versions from the stream tail.
        let project = crate::board::ProjectAggregate::load(&store, "p1")
            .await
            .unwrap();
        assert_eq!(project.version(), 2);
    }
}
