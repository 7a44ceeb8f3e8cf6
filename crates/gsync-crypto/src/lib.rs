//! gsync-crypto: the two grade envelope formats and the bridge between them
//!
//! ```text
//! Web envelope (cloud document store, created by the web client)
//!   key  = PBKDF2-HMAC-SHA256(password, salt[32], iterations) -> 256-bit
//!   body = AES-256-GCM(key, iv[16]) -> ciphertext || tag[16]
//!   wire = base64(json{ encrypted, iv, authTag, salt })      (hex fields)
//!
//! Mobile envelope (device-local store)
//!   key  = HKDF-SHA256(user_id)  |  user_id padded to 32 bytes (legacy)
//!   body = AES-256-CBC/PKCS#7(key, iv[16])
//!   wire = base64(json{ iv, encrypted })                     (hex fields)
//! ```
//!
//! The mobile envelope is obfuscation only: its key is derived from a
//! non-secret identifier and it carries no authentication tag. Anything that
//! reaches the device store must be treated as tamperable.

pub mod bridge;
pub mod envelope;
pub mod kdf;
pub mod mobile;
pub mod web;

pub use bridge::{Direction, ReencryptionBridge};
pub use envelope::{MobileEncryptedEnvelope, MobileEnvelopeParts, WebEncryptedEnvelope, WebEnvelopeParts};
pub use kdf::{derive_mobile_key, derive_web_key, DerivedKey};
pub use mobile::MobileCipher;
pub use web::WebCipher;

/// Size of a derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the web envelope salt
pub const SALT_SIZE: usize = 32;

/// Size of the IV used by both ciphers
pub const IV_SIZE: usize = 16;

/// Size of the GCM authentication tag
pub const TAG_SIZE: usize = 16;
