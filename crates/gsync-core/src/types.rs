use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// The grade document being protected.
///
/// Well-formed grade books are parsed into a typed schema; anything else that
/// is still valid JSON is carried as `Raw` so foreign documents survive a
/// round trip untouched. The typed schema is lossless too: numbers keep their
/// integer or float form, explicit `null`s stay `null`, absent fields stay
/// absent, and unknown fields at every level are preserved in the `extra` bags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GradePayload {
    Book(GradeBook),
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBook {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<Option<u32>>,
    pub subjects: Vec<Subject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<Vec<GradeEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub value: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Number>,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Subject {
    /// Grades of this subject; an absent list reads as empty.
    pub fn grades(&self) -> &[GradeEntry] {
        self.grades.as_deref().unwrap_or_default()
    }
}

impl GradeEntry {
    pub fn value(&self) -> f64 {
        self.value.as_f64().unwrap_or_default()
    }

    /// Weight used for averaging; a missing weight counts as 1.
    pub fn effective_weight(&self) -> f64 {
        self.weight.as_ref().and_then(Number::as_f64).unwrap_or(1.0)
    }
}

impl GradePayload {
    /// Parse a payload from JSON bytes. Fails only if the bytes are not JSON.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Wrap any JSON value, typing it as a grade book when it has that shape.
    pub fn from_value(value: Value) -> Self {
        GradePayload::deserialize(&value).unwrap_or(GradePayload::Raw(value))
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Number of subjects, if this is a typed grade book.
    pub fn subject_count(&self) -> Option<usize> {
        match self {
            GradePayload::Book(book) => Some(book.subjects.len()),
            GradePayload::Raw(_) => None,
        }
    }
}

impl From<GradeBook> for GradePayload {
    fn from(book: GradeBook) -> Self {
        GradePayload::Book(book)
    }
}

/// A user identity as resolved from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
}

/// Outcome of a mobile sync attempt. Always one of these; sync never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SyncResult {
    Live { payload: GradePayload },
    Fallback { payload: GradePayload, reason: String },
}

impl SyncResult {
    pub fn payload(&self) -> &GradePayload {
        match self {
            SyncResult::Live { payload } | SyncResult::Fallback { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> GradePayload {
        match self {
            SyncResult::Live { payload } | SyncResult::Fallback { payload, .. } => payload,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SyncResult::Live { .. })
    }
}

/// Outcome of a best-effort upload from the mobile side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PushResult {
    Uploaded,
    StoredLocallyOnly { reason: String },
}
