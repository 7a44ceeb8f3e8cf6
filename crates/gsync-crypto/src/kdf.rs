//! Key derivation: password → web key (PBKDF2), user id → mobile key (HKDF)

use gsync_core::config::MobileKeyScheme;
use gsync_core::{GsyncError, GsyncResult};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// Lowest PBKDF2 iteration count accepted for the web envelope
pub const MIN_PBKDF2_ITERATIONS: u32 = 10_000;

/// Iteration count used when nothing is configured
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// HKDF info string binding mobile keys to this envelope version
const MOBILE_KEY_INFO: &[u8] = b"gsync-mobile-v1";

/// A 256-bit symmetric key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the web envelope key from a password and salt with
/// PBKDF2-HMAC-SHA256.
///
/// The salt is stored in the envelope next to the ciphertext; it does not
/// need to be secret but must be fresh for every encryption.
pub fn derive_web_key(password: &SecretString, salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut key,
    );
    DerivedKey::from_bytes(key)
}

/// Derive the mobile envelope key from the user id alone.
///
/// No secret goes into this key. It only keeps casual readers of the device
/// store out.
pub fn derive_mobile_key(user_id: &str, scheme: MobileKeyScheme) -> GsyncResult<DerivedKey> {
    if user_id.is_empty() {
        return Err(GsyncError::Validation("user id must not be empty".into()));
    }

    match scheme {
        MobileKeyScheme::Hkdf => {
            let hkdf = Hkdf::<Sha256>::new(None, user_id.as_bytes());
            let mut okm = [0u8; KEY_SIZE];
            hkdf.expand(MOBILE_KEY_INFO, &mut okm)
                .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
            Ok(DerivedKey::from_bytes(okm))
        }
        MobileKeyScheme::Padded => {
            let mut key = [b'0'; KEY_SIZE];
            let id = user_id.as_bytes();
            let n = id.len().min(KEY_SIZE);
            key[..n].copy_from_slice(&id[..n]);
            Ok(DerivedKey::from_bytes(key))
        }
    }
}
