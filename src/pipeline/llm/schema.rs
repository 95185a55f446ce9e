//! Strict JSON schemas sent with each structured completion.
//!
//! Strict mode requires every property to be listed in `required` and
//! `additionalProperties: false` on every object.

use serde_json::{json, Value};

pub const TERM_LIST_SCHEMA_NAME: &str = "term_list";
pub const TASK_RELEVANCY_SCHEMA_NAME: &str = "task_relevancy";
pub const VALIDITY_SCHEMA_NAME: &str = "validity_assessment";

fn term_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "section": {
                "type": "string",
                "description": "Full section reference, including the document part for multi-part contracts"
            },
            "name": { "type": "string" },
            "description": { "type": "string" }
        },
        "required": ["section", "name", "description"],
        "additionalProperties": false
    })
}

/// `{terms: [Term]}`
pub fn term_list() -> Value {
    json!({
        "type": "object",
        "properties": {
            "terms": {
                "type": "array",
                "items": term_schema()
            }
        },
        "required": ["terms"],
        "additionalProperties": false
    })
}

pub fn task_relevancy() -> Value {
    json!({
        "type": "object",
        "properties": {
            "contract_objective": {
                "type": "string",
                "description": "The main objective of the contract"
            },
            "relevant": {
                "type": "boolean",
                "description": "Whether the task is relevant to the main objective of the contract"
            },
            "ambiguous": {
                "type": "boolean",
                "description": "Whether the relevancy of the task is ambiguous"
            }
        },
        "required": ["contract_objective", "relevant", "ambiguous"],
        "additionalProperties": false
    })
}

pub fn validity_assessment() -> Value {
    json!({
        "type": "object",
        "properties": {
            "related_terms": {
                "type": "array",
                "description": "The terms related to the task",
                "items": term_schema()
            },
            "explanation": {
                "type": "string",
                "description": "Short chain-of-thought reasoning for whether the task should be accepted or not"
            },
            "status": {
                "type": "string",
                "enum": ["valid", "invalid", "ambiguous"],
                "description": "Whether the task is allowed by the terms, or ambiguous if it cannot be decided confidently"
            }
        },
        "required": ["related_terms", "explanation", "status"],
        "additionalProperties": false
    })
}
