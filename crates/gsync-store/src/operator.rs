//! OpenDAL Operator factory for gsync storage backends

use std::path::Path;

use anyhow::{Context, Result};
use gsync_core::config::{expand_tilde, StorageBackend, StorageConfig};
use opendal::Operator;

/// Build an operator for the configured document store backend.
///
/// S3 credentials are picked up by opendal from the standard `AWS_*`
/// environment variables. If `enforce_tls` is set and the endpoint uses
/// plain HTTP, construction fails; otherwise a warning is logged.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    match cfg.backend {
        StorageBackend::Fs => build_fs_operator(&expand_tilde(&cfg.root)),
        StorageBackend::S3 => build_s3_operator(cfg),
        StorageBackend::Memory => build_memory_operator(),
    }
}

/// Filesystem operator rooted at `root`.
///
/// Writes go through a temp file in `<root>/.tmp` and are renamed into place,
/// so a crash mid-write never leaves a truncated envelope behind.
pub fn build_fs_operator(root: &Path) -> Result<Operator> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("creating storage root {}", root.display()))?;
    let tmp = root.join(".tmp");
    std::fs::create_dir_all(&tmp)
        .with_context(|| format!("creating temp dir {}", tmp.display()))?;

    // opendal 0.55: builders use the consuming pattern
    let builder = opendal::services::Fs::default()
        .root(&root.to_string_lossy())
        .atomic_write_dir(&tmp.to_string_lossy());

    Ok(Operator::new(builder)
        .context("creating OpenDAL fs operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .finish())
}

pub fn build_memory_operator() -> Result<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish())
}

/// S3 (or any S3-compatible endpoint) with path-style addressing.
fn build_s3_operator(cfg: &StorageConfig) -> Result<Operator> {
    let endpoint = cfg.endpoint.as_str();
    if endpoint.is_empty() {
        anyhow::bail!("storage.endpoint is required for the s3 backend");
    }

    if endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({endpoint}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development."
            );
        }
        tracing::warn!(
            endpoint,
            "S3 endpoint uses plaintext HTTP: grade envelopes travel unencrypted in transit. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    let builder = opendal::services::S3::default()
        .endpoint(endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket);

    Ok(Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish())
}
