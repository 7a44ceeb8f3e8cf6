use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration (loaded from gsync.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GsyncConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub crypto: CryptoConfig,
    pub storage: StorageConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address for the bridge and sync endpoints
    pub listen: String,
    /// Prometheus metrics endpoint (None disables it)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Expose the diagnostics-only test-decrypt endpoint
    pub diagnostics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// File holding the HS256 JWT secret (GSYNC_JWT_SECRET takes precedence)
    pub jwt_secret_file: Option<PathBuf>,
    /// Required `iss` claim, if set
    pub issuer: Option<String>,
    /// Clock skew tolerance for `exp`/`nbf` in seconds
    pub leeway_secs: u64,
}

/// Key scheme for the device-local (mobile) envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileKeyScheme {
    /// HKDF-SHA256 over the user id
    #[default]
    Hkdf,
    /// User id right-padded with '0' to 32 bytes (legacy envelopes)
    Padded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations for the web envelope (minimum 10000)
    pub pbkdf2_iterations: u32,
    pub mobile_key_scheme: MobileKeyScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
    Memory,
}

/// Cloud document store holding web-encrypted grade envelopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Enforce HTTPS for S3 connections
    pub enforce_tls: bool,
}

/// Mobile sync client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of gsyncd
    pub base_url: String,
    /// Reachability probe timeout in milliseconds
    pub reachability_timeout_ms: u64,
    /// Sync fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Push (upload) timeout in milliseconds
    pub push_timeout_ms: u64,
    /// Refuse plaintext http:// base URLs (passwords travel in the body)
    pub enforce_tls: bool,
    /// Directory for the device-local encrypted store
    pub local_store_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".into(),
            metrics_addr: Some("127.0.0.1:9187".into()),
            log_level: "info".into(),
            log_format: "json".into(),
            diagnostics: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_file: None,
            issuer: None,
            leeway_secs: 30,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            mobile_key_scheme: MobileKeyScheme::Hkdf,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/gsyncd/documents"),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "gsync".into(),
            enforce_tls: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".into(),
            reachability_timeout_ms: 3_000,
            fetch_timeout_ms: 10_000,
            push_timeout_ms: 10_000,
            enforce_tls: false,
            local_store_dir: PathBuf::from("~/.local/share/gsync"),
        }
    }
}

impl GsyncConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    }
}

/// Expand a leading `~/` against $HOME. Other paths are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
