//! Execution status snapshots as returned by the status endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::ExecutionStatus;

/// One snapshot of a server-side execution.
///
/// Only `id` and `status` are interpreted. Every other field (instruction
/// text, model name, generated sections, id aliases) is kept in `extra` and
/// serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Opaque identifier, stable for the execution's lifetime.
    pub id: String,
    /// Authoritative status; every decision derives from this field.
    pub status: ExecutionStatus,
    /// Uninterpreted payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionRecord {
    /// Create a record with no extra payload.
    pub fn new(id: impl Into<String>, status: impl Into<ExecutionStatus>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            extra: Map::new(),
        }
    }

    /// Attach an opaque payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up an opaque payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Returns `true` if any execution in `records` should keep a list poll alive.
pub fn any_list_active(records: &[ExecutionRecord]) -> bool {
    records.iter().any(|r| r.status.is_list_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extra_fields_pass_through() {
        let raw = r#"{
            "id": "ex-1",
            "status": "running",
            "execution_id": "ex-1",
            "instruction": "Summarise section 2",
            "model": "large",
            "sections": [{"title": "Intro"}]
        }"#;
        let record: ExecutionRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(record.id, "ex-1");
        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.field("model"), Some(&Value::from("large")));
        assert_eq!(record.extra.len(), 4);

        let back: Value = serde_json::to_value(&record).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn unknown_status_does_not_reject_record() {
        let record: ExecutionRecord =
            serde_json::from_str(r#"{"id": "ex-2", "status": "archived"}"#).unwrap();
        assert_eq!(
            record.status,
            ExecutionStatus::Unrecognized("archived".into())
        );
    }

    #[test]
    fn aggregate_activity() {
        let idle = vec![
            ExecutionRecord::new("a", "completed"),
            ExecutionRecord::new("b", "failed"),
            ExecutionRecord::new("c", "paused"),
        ];
        assert!(!any_list_active(&idle));
        assert!(!any_list_active(&[]));

        let busy = vec![
            ExecutionRecord::new("a", "completed"),
            ExecutionRecord::new("b", "running"),
        ];
        assert!(any_list_active(&busy));
    }
}
