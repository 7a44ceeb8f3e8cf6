//! HTTP wire contracts shared by `gsyncd` and the mobile sync client.
//!
//! Field names are camelCase on the wire. Request types carrying a password
//! implement `Debug` by hand so the secret never reaches a log line.

use serde::{Deserialize, Serialize};

use crate::types::GradePayload;

pub const HEALTH_PATH: &str = "/api/health";
pub const MOBILE_DECRYPT_PATH: &str = "/api/grades/mobile-decrypt";
pub const MOBILE_ENCRYPT_PATH: &str = "/api/grades/mobile-encrypt";
pub const BRIDGE_DECRYPT_PATH: &str = "/api/mobile/grades/decrypt";
pub const BRIDGE_ENCRYPT_PATH: &str = "/api/mobile/grades/encrypt";
pub const BRIDGE_TEST_DECRYPT_PATH: &str = "/api/mobile/grades/test-decrypt";

/// Cookie carrying the session credential when no Authorization header is sent.
pub const SESSION_COOKIE: &str = "gsync_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// `POST /api/grades/mobile-decrypt`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileDecryptRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileDecryptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted_data: Option<GradePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/grades/mobile-encrypt`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileEncryptRequest {
    pub user_id: String,
    pub password: String,
    pub grades_data: GradePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileEncryptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of both bridge conversion endpoints.
///
/// `token` may be omitted when the credential travels in the Authorization
/// header or session cookie. `user_id` is optional and only ever compared
/// against the verified identity; it is never used as key material.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub encrypted_grades: String,
    pub user_password: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInfo {
    pub method: String,
    pub algorithm: String,
    pub key_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMetadata {
    pub request_id: String,
    pub user_id: String,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub success: bool,
    pub encrypted_grades: String,
    pub encryption: EncryptionInfo,
    pub metadata: BridgeMetadata,
}

/// `POST /api/mobile/grades/test-decrypt` (diagnostics only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDecryptRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub mobile_encrypted_grades: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDecryptResponse {
    pub success: bool,
    pub decrypted_data: GradePayload,
    pub metadata: BridgeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl std::fmt::Debug for MobileDecryptRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileDecryptRequest")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for MobileEncryptRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileEncryptRequest")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .field("grades_data", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for BridgeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeRequest")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("encrypted_grades_len", &self.encrypted_grades.len())
            .field("user_password", &"[REDACTED]")
            .field("request_id", &self.request_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}
