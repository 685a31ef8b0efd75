//! Rewrites client temporary ids to server-assigned permanent ids after a
//! create is acknowledged.

use std::collections::HashMap;

use serde_json::Value;
use tasksync_core::models::OperationKind;

use crate::storage::LocalStore;

/// Apply a `{temp_id: permanent_id}` mapping to the store: move the task
/// record under its permanent id and rewrite the `target_id` of every
/// not-yet-sent queue entry so dependent updates and deletes go out under
/// the id the server knows. Must run under the store lock, before any
/// observer is notified.
///
/// Applying the same mapping twice is a no-op the second time. Returns the
/// `(old, new)` pairs whose record actually moved, for event emission.
pub fn apply_mapping(
    store: &mut LocalStore,
    mapping: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut applied = Vec::new();

    for (temp_id, permanent_id) in mapping {
        if let Some(mut task) = store.remove(temp_id) {
            task.id = permanent_id.clone();
            store.put(task);
            applied.push((temp_id.clone(), permanent_id.clone()));
        }

        for op in store.operations_mut() {
            if &op.target_id == temp_id {
                op.target_id = permanent_id.clone();
                if op.kind == OperationKind::Create {
                    if let Some(id) = op.payload.get_mut("id") {
                        *id = Value::String(permanent_id.clone());
                    }
                }
            }
        }
    }

    applied
}
