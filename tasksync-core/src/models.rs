use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use strum::{Display, EnumString};

/// A single task record. `id` is either a client-generated temporary id
/// (see [`next_temp_id`]) or the server-assigned permanent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub category: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub due_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Tombstone flag. Deleted records stay in the store until compaction.
    #[serde(default)]
    pub deleted: bool,
}

impl Task {
    pub fn from_draft(id: String, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        let completed = draft.completed;
        Self {
            id,
            text: draft.text,
            category: draft.category.unwrap_or_else(|| "other".to_string()),
            completed,
            due_date: draft.due_date,
            due_time: draft.due_time,
            created_at: now,
            completed_at: completed.then_some(now),
            deleted: false,
        }
    }

    /// Apply a sparse update in place. Flipping `completed` maintains
    /// `completed_at` the same way the server does.
    pub fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
            self.completed_at = completed.then_some(now);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(due_time) = patch.due_time {
            self.due_time = Some(due_time);
        }
    }
}

/// Input for task creation. Everything except the text is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm")]
    pub due_time: Option<NaiveTime>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Sparse set of changed fields for an update. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub due_time: Option<NaiveTime>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// A mutation not yet confirmed by the server. Stored in strict FIFO order:
/// an Update or Delete must never be replayed before the Create that
/// introduced its `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub target_id: String,
    /// Create: full `Task` snapshot. Update: a `TaskPatch`. Delete: null.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn create(task: &Task, now: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            kind: OperationKind::Create,
            target_id: task.id.clone(),
            payload: serde_json::to_value(task)?,
            enqueued_at: now,
        })
    }

    pub fn update(id: &str, patch: &TaskPatch, now: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            kind: OperationKind::Update,
            target_id: id.to_string(),
            payload: serde_json::to_value(patch)?,
            enqueued_at: now,
        })
    }

    pub fn delete(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            kind: OperationKind::Delete,
            target_id: id.to_string(),
            payload: serde_json::Value::Null,
            enqueued_at: now,
        }
    }
}

/// Derived connection state, rebuilt at startup from the queue length and
/// an initial probe. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub online: bool,
    pub syncing: bool,
    pub pending_count: usize,
}

static TEMP_ID_SEQ: AtomicU64 = AtomicU64::new(0);

const TEMP_ID_PREFIX: &str = "tmp-";

/// Generate a client-local temporary id: high-resolution clock plus an
/// atomic counter so ids stay unique within the session even when two
/// creates land on the same clock tick.
pub fn next_temp_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = TEMP_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{TEMP_ID_PREFIX}{nanos}-{seq}")
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Serde helper for `Option<NaiveTime>` in the server's "HH:MM" form.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => NaiveTime::parse_from_str(&raw, FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
