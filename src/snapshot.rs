// Snapshot encoding and tolerant decoding

use crate::task::{MAX_NAME_LEN, Task, TaskId};
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of decoding a persisted snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Tasks in stored order
    pub tasks: Vec<Task>,
    /// True when entries were dropped or given fresh ids
    pub repaired: bool,
}

/// Serialize the full collection as a JSON array
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task snapshot")
}

/// Decode a snapshot, never failing
///
/// A missing, empty or unparseable snapshot, or one that is not a JSON
/// array, decodes to an empty collection. Inside an array:
/// - entries that are not objects, or lack a string `name` or a boolean
///   `completed`, are skipped
/// - entries whose trimmed name is empty are skipped; names are trimmed and
///   cut to [`MAX_NAME_LEN`] characters
/// - entries with a missing, non-integer or duplicate `id` get fresh ids in
///   document order, starting just above the largest valid id; entries
///   that would need an id past `i64::MAX` are skipped
pub fn decode(raw: Option<&str>) -> Decoded {
    let Some(raw) = raw else {
        debug!("No snapshot stored, starting empty");
        return Decoded::default();
    };

    if raw.trim().is_empty() {
        return Decoded::default();
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = ?e, "Snapshot is not valid JSON, starting empty");
            return Decoded {
                tasks: Vec::new(),
                repaired: true,
            };
        }
    };

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Decoded::default(),
        other => {
            warn!(kind = json_kind(&other), "Snapshot is not an array, starting empty");
            return Decoded {
                tasks: Vec::new(),
                repaired: true,
            };
        }
    };

    let mut repaired = false;
    let mut seen: HashSet<TaskId> = HashSet::new();
    // (name, completed, id if usable)
    let mut parsed: Vec<(String, bool, Option<TaskId>)> = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            warn!(index, "Snapshot entry is not an object, skipping");
            repaired = true;
            continue;
        };

        let (Some(name), Some(completed)) = (
            obj.get("name").and_then(Value::as_str),
            obj.get("completed").and_then(Value::as_bool),
        ) else {
            warn!(index, "Snapshot entry lacks name or completed, skipping");
            repaired = true;
            continue;
        };

        let trimmed = name.trim();
        if trimmed.is_empty() {
            warn!(index, "Snapshot entry has an empty name, skipping");
            repaired = true;
            continue;
        }

        let normalized: String = trimmed.chars().take(MAX_NAME_LEN).collect();
        if normalized != name {
            repaired = true;
        }

        let id = obj.get("id").and_then(Value::as_i64);
        let id = match id {
            Some(id) if seen.insert(id) => Some(id),
            Some(id) => {
                warn!(index, id, "Duplicate task id in snapshot, assigning a new one");
                repaired = true;
                None
            }
            None => {
                warn!(index, "Snapshot entry has no usable id, assigning a new one");
                repaired = true;
                None
            }
        };

        parsed.push((normalized, completed, id));
    }

    let mut next_id = seen.iter().copied().max().unwrap_or(0);
    let mut tasks = Vec::with_capacity(parsed.len());
    for (name, completed, id) in parsed {
        let id = match id {
            Some(id) => id,
            None => match next_id.checked_add(1) {
                Some(id) => {
                    next_id = id;
                    id
                }
                None => {
                    // Ids already reach i64::MAX, nothing left to assign
                    warn!(name = %name, "No id left for snapshot entry, skipping");
                    repaired = true;
                    continue;
                }
            },
        };
        tasks.push(Task { id, name, completed });
    }

    Decoded { tasks, repaired }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
