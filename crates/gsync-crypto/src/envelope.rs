//! Envelope transport codec
//!
//! Both envelope formats travel as a single base64 string wrapping a JSON
//! object whose fields are lowercase hex:
//!
//! ```text
//! web:    base64(json{ "encrypted", "iv", "authTag", "salt" })
//! mobile: base64(json{ "iv", "encrypted" })
//! ```
//!
//! Every decode failure collapses into `GsyncError::Decryption`; the cause
//! is only visible at debug level.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gsync_core::{GsyncError, GsyncResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Web-format envelope as a base64 transport string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebEncryptedEnvelope(String);

/// Mobile-format envelope as a base64 transport string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MobileEncryptedEnvelope(String);

/// Decoded components of a web envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebEnvelopeParts {
    pub encrypted: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Decoded components of a mobile envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileEnvelopeParts {
    pub iv: Vec<u8>,
    pub encrypted: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebWire {
    encrypted: String,
    iv: String,
    auth_tag: String,
    salt: String,
}

#[derive(Serialize, Deserialize)]
struct MobileWire {
    iv: String,
    encrypted: String,
}

macro_rules! transport_string {
    ($ty:ty) => {
        impl $ty {
            pub fn new(transport: impl Into<String>) -> Self {
                Self(transport.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

transport_string!(WebEncryptedEnvelope);
transport_string!(MobileEncryptedEnvelope);

impl WebEnvelopeParts {
    pub fn encode(&self) -> GsyncResult<WebEncryptedEnvelope> {
        let wire = WebWire {
            encrypted: hex::encode(&self.encrypted),
            iv: hex::encode(&self.iv),
            auth_tag: hex::encode(&self.auth_tag),
            salt: hex::encode(&self.salt),
        };
        encode_wire(&wire).map(WebEncryptedEnvelope)
    }

    pub fn decode(envelope: &WebEncryptedEnvelope) -> GsyncResult<Self> {
        let wire: WebWire = decode_wire(envelope.as_str())?;
        Ok(Self {
            encrypted: decode_hex("encrypted", &wire.encrypted)?,
            iv: decode_hex("iv", &wire.iv)?,
            auth_tag: decode_hex("authTag", &wire.auth_tag)?,
            salt: decode_hex("salt", &wire.salt)?,
        })
    }
}

impl MobileEnvelopeParts {
    pub fn encode(&self) -> GsyncResult<MobileEncryptedEnvelope> {
        let wire = MobileWire {
            iv: hex::encode(&self.iv),
            encrypted: hex::encode(&self.encrypted),
        };
        encode_wire(&wire).map(MobileEncryptedEnvelope)
    }

    pub fn decode(envelope: &MobileEncryptedEnvelope) -> GsyncResult<Self> {
        let wire: MobileWire = decode_wire(envelope.as_str())?;
        Ok(Self {
            iv: decode_hex("iv", &wire.iv)?,
            encrypted: decode_hex("encrypted", &wire.encrypted)?,
        })
    }
}

fn encode_wire<T: Serialize>(wire: &T) -> GsyncResult<String> {
    let json = serde_json::to_vec(wire)
        .map_err(|e| anyhow::anyhow!("envelope serialization: {e}"))?;
    Ok(STANDARD.encode(json))
}

fn decode_wire<T: DeserializeOwned>(transport: &str) -> GsyncResult<T> {
    let json = STANDARD.decode(transport.trim()).map_err(|e| {
        debug!("envelope is not base64: {e}");
        GsyncError::Decryption
    })?;
    serde_json::from_slice(&json).map_err(|e| {
        debug!("envelope JSON malformed: {e}");
        GsyncError::Decryption
    })
}

fn decode_hex(field: &str, value: &str) -> GsyncResult<Vec<u8>> {
    hex::decode(value).map_err(|e| {
        debug!(envelope_field = field, "envelope field is not hex: {e}");
        GsyncError::Decryption
    })
}
