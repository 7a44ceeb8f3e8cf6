//! HTTP handlers
//!
//! Identity always comes from the verified credential. A `userId` in the
//! request body is only compared against it, never trusted.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use gsync_core::api::{
    BridgeMetadata, BridgeRequest, BridgeResponse, HealthResponse, MobileDecryptRequest,
    MobileDecryptResponse, MobileEncryptRequest, MobileEncryptResponse, TestDecryptRequest,
    TestDecryptResponse, BRIDGE_DECRYPT_PATH, BRIDGE_ENCRYPT_PATH, BRIDGE_TEST_DECRYPT_PATH,
    HEALTH_PATH, MOBILE_DECRYPT_PATH, MOBILE_ENCRYPT_PATH,
};
use gsync_core::{GsyncError, GsyncResult, UserIdentity};
use gsync_crypto::{Direction, MobileEncryptedEnvelope, WebEncryptedEnvelope};
use secrecy::SecretString;
use tracing::info;

use crate::error::{outcome, ApiError};
use crate::identity::extract_token;
use crate::server::AppState;

type AppResult<T> = Result<Json<T>, ApiError>;

// ── Routers ─────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route(HEALTH_PATH, get(health))
}

pub fn sync_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(MOBILE_DECRYPT_PATH, post(mobile_decrypt))
        .route(MOBILE_ENCRYPT_PATH, post(mobile_encrypt))
}

pub fn bridge_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(BRIDGE_DECRYPT_PATH, post(bridge_decrypt))
        .route(BRIDGE_ENCRYPT_PATH, post(bridge_encrypt))
        .route(BRIDGE_TEST_DECRYPT_PATH, post(test_decrypt))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ── Sync endpoints ──────────────────────────────────────────────────────

/// `POST /api/grades/mobile-decrypt`: load the caller's web envelope and
/// return its plaintext for the device to re-encrypt locally.
async fn mobile_decrypt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<MobileDecryptRequest>, JsonRejection>,
) -> AppResult<MobileDecryptResponse> {
    let result = async {
        let Json(req) = body?;
        let identity = authenticate(&state, None, &headers)?;
        check_claimed_user(&identity, Some(&req.user_id))?;
        let password = require_password(req.password)?;

        let transport = state
            .documents
            .get_web_envelope(&identity.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("no grades stored for this user".into()))?;

        let web = *state.bridge.web();
        let envelope = WebEncryptedEnvelope::new(transport);
        let payload = blocking(move || web.decrypt(&envelope, &password)).await?;

        info!(user_id = %identity.user_id, "grades decrypted for mobile sync");
        Ok::<_, ApiError>(MobileDecryptResponse {
            success: true,
            decrypted_data: Some(payload),
            error: None,
        })
    }
    .await;

    state.metrics.record_sync("decrypt", outcome(&result));
    result.map(Json)
}

/// `POST /api/grades/mobile-encrypt`: encrypt grades edited on the device
/// under the user's password and store them as the web envelope.
async fn mobile_encrypt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<MobileEncryptRequest>, JsonRejection>,
) -> AppResult<MobileEncryptResponse> {
    let result = async {
        let Json(req) = body?;
        let identity = authenticate(&state, None, &headers)?;
        check_claimed_user(&identity, Some(&req.user_id))?;
        let password = require_password(req.password)?;

        let web = *state.bridge.web();
        let payload = req.grades_data;
        let envelope = blocking(move || web.encrypt(&payload, &password)).await?;

        state
            .documents
            .put_web_envelope(&identity.user_id, envelope.as_str())
            .await?;

        info!(user_id = %identity.user_id, "grades from mobile stored");
        Ok::<_, ApiError>(MobileEncryptResponse {
            success: true,
            error: None,
        })
    }
    .await;

    state.metrics.record_sync("encrypt", outcome(&result));
    result.map(Json)
}

// ── Bridge endpoints ────────────────────────────────────────────────────

/// `POST /api/mobile/grades/decrypt`: web envelope in, mobile envelope out.
async fn bridge_decrypt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<BridgeRequest>, JsonRejection>,
) -> AppResult<BridgeResponse> {
    let result = match body {
        Ok(Json(req)) => convert(&state, &headers, req, Direction::WebToMobile).await,
        Err(rejection) => Err(rejection.into()),
    };
    state
        .metrics
        .record_bridge(Direction::WebToMobile.as_str(), outcome(&result));
    result.map(Json)
}

/// `POST /api/mobile/grades/encrypt`: mobile envelope in, web envelope out.
async fn bridge_encrypt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<BridgeRequest>, JsonRejection>,
) -> AppResult<BridgeResponse> {
    let result = match body {
        Ok(Json(req)) => convert(&state, &headers, req, Direction::MobileToWeb).await,
        Err(rejection) => Err(rejection.into()),
    };
    state
        .metrics
        .record_bridge(Direction::MobileToWeb.as_str(), outcome(&result));
    result.map(Json)
}

async fn convert(
    state: &AppState,
    headers: &HeaderMap,
    req: BridgeRequest,
    direction: Direction,
) -> Result<BridgeResponse, ApiError> {
    let identity = authenticate(state, req.token.as_deref(), headers)?;
    check_claimed_user(&identity, req.user_id.as_deref())?;
    if req.encrypted_grades.trim().is_empty() {
        return Err(GsyncError::Validation("encryptedGrades is required".into()).into());
    }
    let password = require_password(req.user_password)?;

    let bridge = state.bridge;
    let who = identity.clone();
    let transport = req.encrypted_grades;
    let encrypted_grades = match direction {
        Direction::WebToMobile => {
            let envelope = WebEncryptedEnvelope::new(transport);
            blocking(move || bridge.web_to_mobile(&envelope, &password, &who))
                .await?
                .into_string()
        }
        Direction::MobileToWeb => {
            let envelope = MobileEncryptedEnvelope::new(transport);
            blocking(move || bridge.mobile_to_web(&envelope, &password, &who))
                .await?
                .into_string()
        }
    };

    info!(
        user_id = %identity.user_id,
        direction = direction.as_str(),
        "envelope re-encrypted"
    );

    Ok(BridgeResponse {
        success: true,
        encrypted_grades,
        encryption: state.bridge.encryption_info(direction),
        metadata: metadata(req.request_id, &identity),
    })
}

/// `POST /api/mobile/grades/test-decrypt`: open a mobile envelope for the
/// caller. Answers 404 unless diagnostics are enabled.
async fn test_decrypt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<TestDecryptRequest>, JsonRejection>,
) -> AppResult<TestDecryptResponse> {
    if !state.diagnostics {
        return Err(ApiError::NotFound("not found".into()));
    }

    let result = match body {
        Ok(Json(req)) => open_for_caller(&state, &headers, req),
        Err(rejection) => Err(rejection.into()),
    };
    state.metrics.record_bridge("test_decrypt", outcome(&result));
    result.map(Json)
}

fn open_for_caller(
    state: &AppState,
    headers: &HeaderMap,
    req: TestDecryptRequest,
) -> Result<TestDecryptResponse, ApiError> {
    let identity = authenticate(state, req.token.as_deref(), headers)?;
    let envelope = MobileEncryptedEnvelope::new(req.mobile_encrypted_grades);
    let payload = state.bridge.mobile().decrypt(&envelope, &identity.user_id)?;
    Ok(TestDecryptResponse {
        success: true,
        decrypted_data: payload,
        metadata: metadata(None, &identity),
    })
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn authenticate(
    state: &AppState,
    body_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<UserIdentity, ApiError> {
    let token = extract_token(body_token, headers)
        .ok_or_else(|| GsyncError::Authentication("missing session token".into()))?;
    Ok(state.verifier.verify(&token)?)
}

fn check_claimed_user(identity: &UserIdentity, claimed: Option<&str>) -> Result<(), ApiError> {
    match claimed {
        Some(id) if id != identity.user_id => Err(ApiError::IdentityMismatch),
        _ => Ok(()),
    }
}

fn require_password(password: String) -> Result<SecretString, ApiError> {
    if password.is_empty() {
        return Err(GsyncError::Validation("password is required".into()).into());
    }
    Ok(SecretString::from(password))
}

fn metadata(request_id: Option<String>, identity: &UserIdentity) -> BridgeMetadata {
    BridgeMetadata {
        request_id: request_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        user_id: identity.user_id.clone(),
        processed_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Run PBKDF2-bound work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> GsyncResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GsyncError::Other(anyhow::anyhow!("crypto task failed: {e}")))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use gsync_core::config::AuthConfig;
    use gsync_core::GradePayload;
    use gsync_crypto::{MobileCipher, ReencryptionBridge, WebCipher};
    use gsync_store::operator::build_memory_operator;
    use gsync_store::DocumentStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::identity::JwtVerifier;
    use crate::metrics::Metrics;
    use crate::server::build_app;

    const SECRET: &str = "routes-test-secret-0123456789abcdef";

    struct Harness {
        app: Router,
        state: AppState,
        verifier: Arc<JwtVerifier>,
    }

    fn harness(diagnostics: bool) -> Harness {
        let verifier = Arc::new(JwtVerifier::new(
            &SecretString::from(SECRET),
            &AuthConfig::default(),
        ));
        let state = AppState {
            bridge: ReencryptionBridge::new(
                WebCipher::new(10_000).unwrap(),
                MobileCipher::default(),
            ),
            documents: DocumentStore::new(build_memory_operator().unwrap()),
            verifier: verifier.clone(),
            metrics: Arc::new(Metrics::new()),
            diagnostics,
        };
        Harness {
            app: build_app(state.clone()),
            state,
            verifier,
        }
    }

    impl Harness {
        fn token(&self, user_id: &str) -> String {
            self.verifier
                .issue(
                    &UserIdentity {
                        user_id: user_id.into(),
                        email: format!("{user_id}@example.com"),
                    },
                    3600,
                )
                .unwrap()
        }

        async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
            let mut req = Request::post(path).header(header::CONTENT_TYPE, "application/json");
            if let Some(t) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
            }
            let resp = self
                .app
                .clone()
                .oneshot(req.body(Body::from(body.to_string())).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    fn mathematik() -> Value {
        json!({"subjects": [{"name": "Mathematik", "grades": [{"value": 2.3, "weight": 1}]}]})
    }

    fn expected() -> GradePayload {
        serde_json::from_value(mathematik()).unwrap()
    }

    fn payload_of(v: &Value) -> GradePayload {
        serde_json::from_value(v.clone()).unwrap()
    }

    fn web_envelope(h: &Harness, password: &str) -> String {
        let payload = expected();
        h.state
            .bridge
            .web()
            .encrypt(&payload, &SecretString::from(password))
            .unwrap()
            .into_string()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let h = harness(false);
        let resp = h
            .app
            .clone()
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn bridge_web_to_mobile_and_back() {
        let h = harness(false);
        let token = h.token("alice");
        let env = web_envelope(&h, "correct-horse");

        let (status, body) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                None,
                json!({"token": token, "encryptedGrades": env, "userPassword": "correct-horse", "requestId": "req-1"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["encryption"]["algorithm"], "aes-256-cbc");
        assert_eq!(body["metadata"]["requestId"], "req-1");
        assert_eq!(body["metadata"]["userId"], "alice");

        let mobile = MobileEncryptedEnvelope::new(body["encryptedGrades"].as_str().unwrap());
        let payload = h.state.bridge.mobile().decrypt(&mobile, "alice").unwrap();
        assert_eq!(payload, expected());

        let (status, body) = h
            .post(
                BRIDGE_ENCRYPT_PATH,
                Some(&token),
                json!({"encryptedGrades": mobile.as_str(), "userPassword": "correct-horse"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["encryption"]["algorithm"], "aes-256-gcm");
        assert!(!body["metadata"]["requestId"].as_str().unwrap().is_empty());

        let web = WebEncryptedEnvelope::new(body["encryptedGrades"].as_str().unwrap());
        let back = h
            .state
            .bridge
            .web()
            .decrypt(&web, &SecretString::from("correct-horse"))
            .unwrap();
        assert_eq!(back, payload);
    }

    #[tokio::test]
    async fn wrong_password_is_generic_400() {
        let h = harness(false);
        let token = h.token("alice");
        let env = web_envelope(&h, "correct-horse");

        let (status, body) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                Some(&token),
                json!({"encryptedGrades": env, "userPassword": "wrong-password"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "decryption failed: check your password");
    }

    #[tokio::test]
    async fn body_user_id_mismatch_is_forbidden() {
        let h = harness(false);
        let token = h.token("alice");
        let env = web_envelope(&h, "pw");

        let (status, _) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                Some(&token),
                json!({"encryptedGrades": env, "userPassword": "pw", "userId": "mallory"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h
            .post(
                MOBILE_DECRYPT_PATH,
                Some(&token),
                json!({"userId": "mallory", "password": "pw"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let h = harness(false);
        let env = web_envelope(&h, "pw");

        let (status, body) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                None,
                json!({"encryptedGrades": env, "userPassword": "pw"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authentication required: please log in again");

        let (status, _) = h
            .post(
                MOBILE_DECRYPT_PATH,
                Some("forged.token.value"),
                json!({"userId": "alice", "password": "pw"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_fields_are_validation_errors() {
        let h = harness(false);
        let token = h.token("alice");

        let (status, _) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                Some(&token),
                json!({"encryptedGrades": "", "userPassword": "pw"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .post(
                BRIDGE_DECRYPT_PATH,
                Some(&token),
                json!({"encryptedGrades": "abc", "userPassword": ""}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_push_then_fetch() {
        let h = harness(false);
        let token = h.token("alice");

        let (status, _) = h
            .post(
                MOBILE_DECRYPT_PATH,
                Some(&token),
                json!({"userId": "alice", "password": "correct-horse"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = h
            .post(
                MOBILE_ENCRYPT_PATH,
                Some(&token),
                json!({"userId": "alice", "password": "correct-horse", "gradesData": mathematik()}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert!(h.state.documents.get_web_envelope("alice").await.unwrap().is_some());

        let (status, body) = h
            .post(
                MOBILE_DECRYPT_PATH,
                Some(&token),
                json!({"userId": "alice", "password": "correct-horse"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(payload_of(&body["decryptedData"]), expected());

        let (status, body) = h
            .post(
                MOBILE_DECRYPT_PATH,
                Some(&token),
                json!({"userId": "alice", "password": "wrong-password"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "decryption failed: check your password");

        let text = h.state.metrics.encode_text().unwrap();
        assert!(text.contains(r#"gsync_sync_requests_total{op="decrypt",outcome="ok"} 1"#));
        assert!(text.contains(r#"op="decrypt",outcome="decryption_error"} 1"#));
    }

    #[tokio::test]
    async fn unreadable_bodies_get_json_errors() {
        let h = harness(false);
        let token = h.token("alice");

        let (status, body) = h
            .post(MOBILE_DECRYPT_PATH, Some(&token), json!({"userId": "alice"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("password"), "{body}");

        let req = Request::post(BRIDGE_DECRYPT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("{not json"))
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["success"], false);

        let text = h.state.metrics.encode_text().unwrap();
        assert!(text.contains(r#"gsync_sync_requests_total{op="decrypt",outcome="invalid"} 1"#));
        assert!(text.contains(r#"op="web_to_mobile",outcome="invalid"} 1"#), "{text}");
    }

    #[tokio::test]
    async fn session_cookie_is_accepted() {
        let h = harness(false);
        let token = h.token("alice");
        let env = web_envelope(&h, "pw");

        let req = Request::post(BRIDGE_DECRYPT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("gsync_session={token}"))
            .body(Body::from(
                json!({"encryptedGrades": env, "userPassword": "pw"}).to_string(),
            ))
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_decrypt_gated_by_diagnostics() {
        let h = harness(false);
        let token = h.token("alice");
        let mobile = MobileCipher::default().encrypt(&expected(), "alice").unwrap();

        let (status, _) = h
            .post(
                BRIDGE_TEST_DECRYPT_PATH,
                Some(&token),
                json!({"mobileEncryptedGrades": mobile.as_str()}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let h = harness(true);
        let token = h.token("alice");
        let (status, body) = h
            .post(
                BRIDGE_TEST_DECRYPT_PATH,
                Some(&token),
                json!({"mobileEncryptedGrades": mobile.as_str()}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(payload_of(&body["decryptedData"]), expected());
        assert_eq!(body["metadata"]["userId"], "alice");
    }
}
