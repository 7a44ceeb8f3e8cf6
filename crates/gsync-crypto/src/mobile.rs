//! Mobile envelope: user-id-derived key, AES-256-CBC with PKCS#7 padding
//!
//! The device must be able to open its local store without the user typing a
//! password every session, so the key comes from the user id alone. That makes
//! this envelope obfuscation against casual inspection of the device store,
//! not confidentiality against someone holding the device. There is no
//! authentication tag: a modified envelope may decrypt to garbage rather than
//! fail.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use gsync_core::config::MobileKeyScheme;
use gsync_core::{GradePayload, GsyncError, GsyncResult};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::envelope::{MobileEncryptedEnvelope, MobileEnvelopeParts};
use crate::kdf::derive_mobile_key;
use crate::IV_SIZE;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Encrypts and decrypts mobile envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MobileCipher {
    scheme: MobileKeyScheme,
}

impl MobileCipher {
    pub fn new(scheme: MobileKeyScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> MobileKeyScheme {
        self.scheme
    }

    /// Encrypt a payload for the device store of `user_id`.
    pub fn encrypt(
        &self,
        payload: &GradePayload,
        user_id: &str,
    ) -> GsyncResult<MobileEncryptedEnvelope> {
        let key = derive_mobile_key(user_id, self.scheme)?;
        let plaintext = Zeroizing::new(
            payload
                .to_json_vec()
                .map_err(|e| anyhow::anyhow!("payload serialization: {e}"))?,
        );

        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| anyhow::anyhow!("CBC init failed: {e}"))?;
        let encrypted = encryptor.encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        MobileEnvelopeParts {
            iv: iv.to_vec(),
            encrypted,
        }
        .encode()
    }

    /// Decrypt a mobile envelope for `user_id`.
    ///
    /// Fails with `GsyncError::Decryption` on a malformed envelope, bad
    /// padding, or non-JSON plaintext. Decrypting with the wrong user id
    /// usually fails, but is not guaranteed to.
    pub fn decrypt(
        &self,
        envelope: &MobileEncryptedEnvelope,
        user_id: &str,
    ) -> GsyncResult<GradePayload> {
        let key = derive_mobile_key(user_id, self.scheme)?;
        let parts = MobileEnvelopeParts::decode(envelope)?;

        if parts.iv.len() != IV_SIZE
            || parts.encrypted.is_empty()
            || parts.encrypted.len() % BLOCK_SIZE != 0
        {
            debug!(
                iv = parts.iv.len(),
                encrypted = parts.encrypted.len(),
                "mobile envelope has wrong component sizes"
            );
            return Err(GsyncError::Decryption);
        }

        let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), &parts.iv)
            .map_err(|e| anyhow::anyhow!("CBC init failed: {e}"))?;
        let plaintext = Zeroizing::new(
            decryptor
                .decrypt_padded_vec_mut::<Pkcs7>(&parts.encrypted)
                .map_err(|_| {
                    debug!("mobile envelope padding invalid");
                    GsyncError::Decryption
                })?,
        );

        GradePayload::from_json_slice(&plaintext).map_err(|e| {
            debug!("mobile plaintext is not JSON: {e}");
            GsyncError::Decryption
        })
    }
}
