use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generate a new stream / column / card ID (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The two aggregate stream families in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Workspace,
    Project,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Workspace => "workspace",
            StreamType::Project => "project",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All event kinds this build knows how to record and fold.
///
/// The wire shape is `{"event_type": "...", "event_data": {...}}`. Decoding
/// stored events goes through [`EventKind`], which keeps tags this build
/// does not know instead of failing on them.
///
/// Card-scoped payloads carry an optional `_source` tag identifying which
/// caller issued the command. It is stored for audit display only — replay
/// never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "event_data", rename_all = "snake_case")]
pub enum BoardEvent {
    // ── Workspace stream ─────────────────────────────────────────────────────
    WorkspaceCreated {
        workspace_id: String,
    },
    // ── Project lifecycle ────────────────────────────────────────────────────
    ProjectCreated {
        project_id: String,
        workspace_id: String,
        name: String,
        description: String,
    },
    ProjectRenamed {
        name: String,
    },
    ProjectDescriptionUpdated {
        description: String,
    },
    ProjectDeleted {},
    // ── Columns ──────────────────────────────────────────────────────────────
    ColumnAdded {
        column_id: String,
        name: String,
        position: i64,
    },
    ColumnRenamed {
        column_id: String,
        name: String,
    },
    ColumnMoved {
        column_id: String,
        position: i64,
    },
    ColumnDeleted {
        column_id: String,
    },
    // ── Cards ────────────────────────────────────────────────────────────────
    CardAdded {
        card_id: String,
        column_id: String,
        title: String,
        description: String,
        position: i64,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    CardUpdated {
        card_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    CardMoved {
        card_id: String,
        column_id: String,
        position: i64,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    CardDeleted {
        card_id: String,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    // ── Dependencies ─────────────────────────────────────────────────────────
    DependencyAdded {
        card_id: String,
        depends_on_id: String,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    DependencyRemoved {
        card_id: String,
        depends_on_id: String,
        #[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

/// A stored event: either a tag this build declares, or one written by a
/// newer build.
///
/// Deserialization tries the declared variants first and falls back to
/// `Unknown`, keeping the raw tag and payload. Unknown events fold as
/// no-ops but re-serialize byte-for-byte in the stored wire shape, so the
/// history and audit queries never strip them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventKind {
    Known(BoardEvent),
    Unknown {
        event_type: String,
        #[serde(default)]
        event_data: Value,
    },
}

impl BoardEvent {
    /// Split into the wire tag and payload, e.g. `("card_added", {...})`.
    pub fn wire_parts(&self) -> Result<(String, Value), serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let tag = value
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = value
            .get("event_data")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok((tag, payload))
    }
}

/// A single immutable event as stored in the log.
///
/// `id` is the store-assigned sequence id (absent before the append) and
/// `timestamp` is stamped by the store at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub event: EventKind,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
}
