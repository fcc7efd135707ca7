//! Serialized shapes exchanged with the grading backend, plus the
//! per-question source-code store the workbench persists drafts into.

use crate::schema::{Entity, Relationship, SchemaState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How long a backend validation call may take before the workbench
/// gives up and surfaces a timeout to the user.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the backend needs to grade one answer: the workbench
/// source plus the full diagram model as entry lists, preserving
/// insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub question_id: String,
    pub code: String,
    pub schema: Vec<(String, Entity)>,
    pub relationships: Vec<(String, Relationship)>,
}

pub fn submission_payload(question_id: &str, code: &str, state: &SchemaState) -> SubmissionPayload {
    SubmissionPayload {
        question_id: question_id.to_string(),
        code: code.to_string(),
        schema: state
            .schema
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        relationships: state
            .relationships
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResponse {
    pub success: bool,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub line: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

/// Per-question draft persistence for the code workbench. The browser
/// host backs this with local storage; tests use the in-memory one.
pub trait CodeStore {
    fn load(&self, question_id: &str) -> Option<String>;
    fn store(&mut self, question_id: &str, code: &str);
}

#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    drafts: HashMap<String, String>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeStore for MemoryCodeStore {
    fn load(&self, question_id: &str) -> Option<String> {
        self.drafts.get(question_id).cloned()
    }

    fn store(&mut self, question_id: &str, code: &str) {
        self.drafts.insert(question_id.to_string(), code.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeKey, RelationKind, RelationshipDraft};
    use serde_json::json;

    fn sample_state() -> SchemaState {
        SchemaState::new()
            .add_entity("Fish", Vec::new())
            .add_attribute("Fish", "id", AttributeKey::Primary, "int")
            .add_entity("Tank", Vec::new())
            .add_relationship(
                RelationshipDraft::new("Tank", "Fish", RelationKind::cardinality("1", "many"))
                    .with_id("edge-1"),
            )
    }

    #[test]
    fn payload_serializes_entries_in_order() {
        let payload = submission_payload("q-7", "class Fish {}", &sample_state());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["question_id"], "q-7");
        assert_eq!(value["code"], "class Fish {}");
        assert_eq!(value["schema"][0][0], "fish");
        assert_eq!(value["schema"][1][0], "tank");
        assert_eq!(value["schema"][0][1]["attributes"]["id"]["key"], "PK");
        assert_eq!(value["relationships"][0][0], "edge-1");
        assert_eq!(value["relationships"][0][1]["type"], "cardinality");
        assert_eq!(value["relationships"][0][1]["cardinality_a"], "1");
    }

    #[test]
    fn grade_response_tolerates_missing_fields() {
        let response: GradeResponse =
            serde_json::from_value(json!({ "success": false, "error": "timeout" })).unwrap();
        assert!(!response.success);
        assert!(response.grade.is_none());
        assert_eq!(response.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn validation_issues_deserialize() {
        let response: ValidationResponse = serde_json::from_value(json!({
            "success": false,
            "errors": [{ "line": 3, "message": "missing semicolon" }]
        }))
        .unwrap();
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].line, Some(3));
        assert!(response.errors[0].severity.is_none());
    }

    #[test]
    fn memory_store_round_trips_drafts() {
        let mut store = MemoryCodeStore::new();
        assert!(store.load("q-1").is_none());
        store.store("q-1", "class A {}");
        store.store("q-1", "class B {}");
        assert_eq!(store.load("q-1").as_deref(), Some("class B {}"));
    }
}
