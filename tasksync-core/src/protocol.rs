//! Wire types for the REST task service.
//!
//! The sync worker drains the queue through `POST /tasks/batch` exclusively;
//! `GET /tasks` backs the cache refresh and `GET /ping` the connectivity
//! probe.

use crate::models::{OperationKind, PendingOperation, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /tasks/batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operations: Vec<BatchOperation>,
}

impl BatchRequest {
    pub fn from_queue(ops: &[PendingOperation]) -> Self {
        Self {
            operations: ops.iter().map(BatchOperation::from).collect(),
        }
    }
}

/// One queued mutation on the wire: `{type, id?, temp_id?, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl From<&PendingOperation> for BatchOperation {
    fn from(op: &PendingOperation) -> Self {
        match op.kind {
            // Creates carry the temporary id so the server can answer with
            // an id mapping; the permanent id is the server's to assign.
            OperationKind::Create => Self {
                kind: op.kind,
                id: None,
                temp_id: Some(op.target_id.clone()),
                data: op.payload.clone(),
            },
            OperationKind::Update | OperationKind::Delete => Self {
                kind: op.kind,
                id: Some(op.target_id.clone()),
                temp_id: None,
                data: op.payload.clone(),
            },
        }
    }
}

/// Response of `POST /tasks/batch`. `id_mapping` pairs every acknowledged
/// temporary id with the server-assigned permanent id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub id_mapping: HashMap<String, String>,
}

/// Response of `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Query filters for task listings, applied identically to the local store
/// and to `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(category) = &self.category {
            if &task.category != category {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        true
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(category) = &self.category {
            query.push(("category", category.clone()));
        }
        if let Some(completed) = self.completed {
            query.push(("completed", completed.to_string()));
        }
        query
    }
}
