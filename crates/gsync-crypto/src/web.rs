//! Web envelope: password-derived key, AES-256-GCM
//!
//! This is the format grades are stored in when created or edited on the web
//! client. A 16-byte GCM nonce is used (rather than the usual 12) so that
//! envelopes produced by the web client decrypt here unchanged.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use gsync_core::{GradePayload, GsyncError, GsyncResult};
use rand::RngCore;
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::envelope::{WebEncryptedEnvelope, WebEnvelopeParts};
use crate::kdf::{derive_web_key, DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Encrypts and decrypts web envelopes.
///
/// Holds only the PBKDF2 iteration count, so it is `Copy` and safe to share
/// across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebCipher {
    iterations: u32,
}

impl Default for WebCipher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl WebCipher {
    /// Build a cipher with the given PBKDF2 iteration count.
    ///
    /// Counts below `MIN_PBKDF2_ITERATIONS` are rejected.
    pub fn new(iterations: u32) -> GsyncResult<Self> {
        if iterations < MIN_PBKDF2_ITERATIONS {
            return Err(GsyncError::Validation(format!(
                "pbkdf2 iterations {iterations} below minimum {MIN_PBKDF2_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Encrypt a payload under `password` with a fresh salt and IV.
    pub fn encrypt(
        &self,
        payload: &GradePayload,
        password: &SecretString,
    ) -> GsyncResult<WebEncryptedEnvelope> {
        let plaintext = Zeroizing::new(
            payload
                .to_json_vec()
                .map_err(|e| anyhow::anyhow!("payload serialization: {e}"))?,
        );

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = derive_web_key(password, &salt, self.iterations);
        let cipher = Aes256Gcm16::new(key.as_bytes().into());

        let mut sealed = cipher
            .encrypt(GenericArray::from_slice(&iv), plaintext.as_slice())
            .map_err(|e| anyhow::anyhow!("web encryption failed: {e}"))?;

        // aes-gcm appends the tag; the envelope stores it separately
        let auth_tag = sealed.split_off(sealed.len() - TAG_SIZE);

        WebEnvelopeParts {
            encrypted: sealed,
            iv: iv.to_vec(),
            auth_tag,
            salt: salt.to_vec(),
        }
        .encode()
    }

    /// Decrypt a web envelope.
    ///
    /// Wrong password, corrupted or tampered envelope, and non-JSON plaintext
    /// all fail with the same `GsyncError::Decryption`.
    pub fn decrypt(
        &self,
        envelope: &WebEncryptedEnvelope,
        password: &SecretString,
    ) -> GsyncResult<GradePayload> {
        let parts = WebEnvelopeParts::decode(envelope)?;

        if parts.iv.len() != IV_SIZE || parts.auth_tag.len() != TAG_SIZE || parts.salt.len() < 16 {
            debug!(
                iv = parts.iv.len(),
                tag = parts.auth_tag.len(),
                salt = parts.salt.len(),
                "web envelope has wrong component sizes"
            );
            return Err(GsyncError::Decryption);
        }

        let key = derive_web_key(password, &parts.salt, self.iterations);
        let cipher = Aes256Gcm16::new(key.as_bytes().into());

        let mut sealed = Vec::with_capacity(parts.encrypted.len() + TAG_SIZE);
        sealed.extend_from_slice(&parts.encrypted);
        sealed.extend_from_slice(&parts.auth_tag);

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(GenericArray::from_slice(&parts.iv), sealed.as_slice())
                .map_err(|_| {
                    debug!("web envelope authentication failed");
                    GsyncError::Decryption
                })?,
        );

        GradePayload::from_json_slice(&plaintext).map_err(|e| {
            debug!("web plaintext is not JSON: {e}");
            GsyncError::Decryption
        })
    }
}
