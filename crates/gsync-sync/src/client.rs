//! Mobile sync client
//!
//! Talks to gsyncd over HTTP and keeps a mobile-envelope copy of the user's
//! grades in a `LocalStore`. Network trouble never surfaces as an error:
//! `sync` falls back to the sample dataset and `push` keeps the edit locally.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gsync_core::api::{
    MobileDecryptRequest, MobileDecryptResponse, MobileEncryptRequest, MobileEncryptResponse,
    HEALTH_PATH, MOBILE_DECRYPT_PATH, MOBILE_ENCRYPT_PATH,
};
use gsync_core::config::ClientConfig;
use gsync_core::{GradePayload, GsyncError, GsyncResult, PushResult, SyncResult};
use gsync_crypto::{MobileCipher, MobileEncryptedEnvelope};
use gsync_store::LocalStore;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::fallback::sample_grades;
use crate::guard::InFlightRegistry;
use crate::phase::{SyncPhase, SyncReport};

/// Local store key for a user's mobile envelope.
pub fn local_key(user_id: &str) -> String {
    format!("grades/{user_id}")
}

pub struct MobileSyncClient {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<SecretString>,
    reachability_timeout: Duration,
    fetch_timeout: Duration,
    push_timeout: Duration,
    cipher: MobileCipher,
    store: Arc<dyn LocalStore>,
    in_flight: InFlightRegistry,
    cancel: CancellationToken,
}

impl MobileSyncClient {
    /// Build a client from `[client]` config.
    ///
    /// A plaintext `http://` base URL is refused when `enforce_tls` is set
    /// and warned about otherwise: the password travels in request bodies.
    pub fn new(
        config: &ClientConfig,
        cipher: MobileCipher,
        store: Arc<dyn LocalStore>,
    ) -> Result<Self, SyncError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.starts_with("http://") {
            if config.enforce_tls {
                return Err(SyncError::InsecureBaseUrl(base_url));
            }
            warn!(
                base_url = %base_url,
                "sync server uses plaintext HTTP: passwords are sent unencrypted. \
                 Set client.enforce_tls = true and use HTTPS in production."
            );
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("gsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            bearer: None,
            reachability_timeout: Duration::from_millis(config.reachability_timeout_ms),
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
            push_timeout: Duration::from_millis(config.push_timeout_ms),
            cipher,
            store,
            in_flight: InFlightRegistry::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/health` within the reachability timeout.
    ///
    /// Errors, timeouts, cancellation, and non-2xx statuses all count as
    /// unreachable.
    pub async fn check_reachability(&self) -> bool {
        let url = self.url(HEALTH_PATH);
        let result = self
            .bounded(self.reachability_timeout, async {
                let resp = self.authorized(self.http.get(&url)).send().await.map_err(net)?;
                if resp.status().is_success() {
                    Ok(())
                } else {
                    Err(GsyncError::Network(format!("health returned {}", resp.status())))
                }
            })
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(url = %url, "reachability check failed: {e}");
                false
            }
        }
    }

    /// Fetch the user's grades via `POST /api/grades/mobile-decrypt`.
    ///
    /// Any failure becomes `SyncResult::Fallback` with the sample dataset.
    pub async fn fetch(&self, user_id: &str, password: &SecretString) -> SyncResult {
        match self.fetch_live(user_id, password).await {
            Ok(payload) => SyncResult::Live { payload },
            Err(e) => {
                warn!(user_id, "grade fetch failed, using sample data: {e}");
                SyncResult::Fallback {
                    payload: sample_grades(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run a full sync attempt and store the result locally.
    ///
    /// The result always replaces the local envelope, fallback included: an
    /// offline sync after a `StoredLocallyOnly` push discards that unsent
    /// edit in favour of the sample grades. Callers holding unsent edits
    /// should `push` again before syncing.
    ///
    /// Only fails if a sync or push for `user_id` is already running.
    pub async fn sync(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<SyncReport, SyncError> {
        let _guard = self
            .in_flight
            .try_acquire(user_id)
            .ok_or_else(|| SyncError::InFlight(user_id.to_string()))?;

        let mut phases = vec![SyncPhase::Idle, SyncPhase::CheckingReachability];

        let result = if self.check_reachability().await {
            phases.extend([SyncPhase::Reachable, SyncPhase::Fetching]);
            match self.fetch_live(user_id, password).await {
                Ok(payload) => {
                    phases.push(SyncPhase::Success);
                    SyncResult::Live { payload }
                }
                Err(e) => {
                    warn!(user_id, "grade fetch failed, using sample data: {e}");
                    phases.extend([SyncPhase::Failed, SyncPhase::Fallback]);
                    SyncResult::Fallback {
                        payload: sample_grades(),
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            phases.extend([SyncPhase::Unreachable, SyncPhase::Fallback]);
            SyncResult::Fallback {
                payload: sample_grades(),
                reason: format!("server {} unreachable", self.base_url),
            }
        };

        if !result.is_live() && self.has_local(user_id).await {
            warn!(user_id, "replacing local grades with sample data");
        }

        let stored_locally = match self.store_local(user_id, result.payload()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id, "could not write grades to local store: {e}");
                false
            }
        };

        info!(
            user_id,
            live = result.is_live(),
            stored_locally,
            "sync finished"
        );

        Ok(SyncReport {
            result,
            phases,
            stored_locally,
        })
    }

    /// Store `payload` locally, then upload it via
    /// `POST /api/grades/mobile-encrypt`.
    ///
    /// Upload failures are logged and reported as `StoredLocallyOnly`. The
    /// local copy only lasts until the next `sync`, which overwrites it.
    pub async fn push(
        &self,
        payload: &GradePayload,
        password: &SecretString,
        user_id: &str,
    ) -> Result<PushResult, SyncError> {
        let _guard = self
            .in_flight
            .try_acquire(user_id)
            .ok_or_else(|| SyncError::InFlight(user_id.to_string()))?;

        if let Err(e) = self.store_local(user_id, payload).await {
            warn!(user_id, "could not write grades to local store: {e}");
        }

        match self.upload(payload, password, user_id).await {
            Ok(()) => {
                info!(user_id, "grades uploaded");
                Ok(PushResult::Uploaded)
            }
            Err(e) => {
                warn!(user_id, "upload failed, grades kept locally: {e}");
                Ok(PushResult::StoredLocallyOnly {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Read and decrypt the locally stored grades for `user_id`.
    pub async fn load_local(&self, user_id: &str) -> GsyncResult<Option<GradePayload>> {
        let Some(bytes) = self.store.get(&local_key(user_id)).await? else {
            return Ok(None);
        };
        let transport = String::from_utf8(bytes)
            .map_err(|_| GsyncError::Storage("local envelope is not UTF-8".into()))?;
        let envelope = MobileEncryptedEnvelope::new(transport);
        self.cipher.decrypt(&envelope, user_id).map(Some)
    }

    async fn fetch_live(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> GsyncResult<GradePayload> {
        let url = self.url(MOBILE_DECRYPT_PATH);
        let body = MobileDecryptRequest {
            user_id: user_id.to_string(),
            password: password.expose_secret().to_string(),
        };

        let resp: MobileDecryptResponse = self
            .bounded(self.fetch_timeout, async {
                let resp = self
                    .authorized(self.http.post(&url))
                    .json(&body)
                    .send()
                    .await
                    .map_err(net)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(GsyncError::Network(format!("server returned {status}")));
                }
                resp.json::<MobileDecryptResponse>()
                    .await
                    .map_err(|e| GsyncError::Network(format!("malformed response: {e}")))
            })
            .await?;

        match resp {
            MobileDecryptResponse {
                success: true,
                decrypted_data: Some(payload),
                ..
            } => Ok(payload),
            MobileDecryptResponse { error, .. } => Err(GsyncError::Network(
                error.unwrap_or_else(|| "server reported failure".into()),
            )),
        }
    }

    async fn upload(
        &self,
        payload: &GradePayload,
        password: &SecretString,
        user_id: &str,
    ) -> GsyncResult<()> {
        let url = self.url(MOBILE_ENCRYPT_PATH);
        let body = MobileEncryptRequest {
            user_id: user_id.to_string(),
            password: password.expose_secret().to_string(),
            grades_data: payload.clone(),
        };

        let resp: MobileEncryptResponse = self
            .bounded(self.push_timeout, async {
                let resp = self
                    .authorized(self.http.post(&url))
                    .json(&body)
                    .send()
                    .await
                    .map_err(net)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(GsyncError::Network(format!("server returned {status}")));
                }
                resp.json::<MobileEncryptResponse>()
                    .await
                    .map_err(|e| GsyncError::Network(format!("malformed response: {e}")))
            })
            .await?;

        if resp.success {
            Ok(())
        } else {
            Err(GsyncError::Network(
                resp.error.unwrap_or_else(|| "server reported failure".into()),
            ))
        }
    }

    async fn has_local(&self, user_id: &str) -> bool {
        matches!(self.store.get(&local_key(user_id)).await, Ok(Some(_)))
    }

    async fn store_local(&self, user_id: &str, payload: &GradePayload) -> GsyncResult<()> {
        let envelope = self.cipher.encrypt(payload, user_id)?;
        self.store
            .set(&local_key(user_id), envelope.into_string().into_bytes())
            .await
    }

    /// Race `fut` against the timeout and the client's cancellation token.
    async fn bounded<T>(
        &self,
        timeout: Duration,
        fut: impl Future<Output = GsyncResult<T>>,
    ) -> GsyncResult<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(GsyncError::Network("cancelled".into())),
            r = tokio::time::timeout(timeout, fut) => match r {
                Ok(inner) => inner,
                Err(_) => Err(GsyncError::Network(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                ))),
            },
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn net(e: reqwest::Error) -> GsyncError {
    GsyncError::Network(e.to_string())
}
