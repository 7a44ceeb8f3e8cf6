//! Built-in sample grades shown when the server cannot be reached

use gsync_core::GradePayload;
use serde_json::json;

/// The fixed sample dataset. Always the same value.
pub fn sample_grades() -> GradePayload {
    GradePayload::from_value(json!({
        "schemaVersion": 1,
        "sample": true,
        "subjects": [
            {"name": "Mathematik", "grades": [
                {"value": 2.0, "weight": 2, "type": "exam"},
                {"value": 1.7, "weight": 1, "type": "oral"}
            ]},
            {"name": "Deutsch", "grades": [
                {"value": 2.3, "weight": 2, "type": "exam"},
                {"value": 2.0, "weight": 1, "type": "homework"}
            ]},
            {"name": "Englisch", "grades": [
                {"value": 1.3, "weight": 2, "type": "exam"}
            ]},
            {"name": "Biologie", "grades": [
                {"value": 2.7, "weight": 1, "type": "oral"}
            ]}
        ]
    }))
}
