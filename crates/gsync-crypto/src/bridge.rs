//! Re-encryption bridge: web envelope ⇄ mobile envelope
//!
//! Both directions decrypt into memory and immediately re-encrypt under the
//! other scheme. The intermediate payload never leaves the function.
//!
//! The `identity` argument must come from the identity verifier for the
//! current request. The bridge itself cannot tell a verified identity from a
//! caller-supplied one; enforcing that is the HTTP layer's job.

use gsync_core::api::EncryptionInfo;
use gsync_core::config::{CryptoConfig, MobileKeyScheme};
use gsync_core::{GsyncResult, UserIdentity};
use secrecy::SecretString;
use tracing::debug;

use crate::envelope::{MobileEncryptedEnvelope, WebEncryptedEnvelope};
use crate::mobile::MobileCipher;
use crate::web::WebCipher;

/// Conversion direction, used for metrics labels and response descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    WebToMobile,
    MobileToWeb,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::WebToMobile => "web_to_mobile",
            Direction::MobileToWeb => "mobile_to_web",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReencryptionBridge {
    web: WebCipher,
    mobile: MobileCipher,
}

impl ReencryptionBridge {
    pub fn new(web: WebCipher, mobile: MobileCipher) -> Self {
        Self { web, mobile }
    }

    pub fn from_config(config: &CryptoConfig) -> GsyncResult<Self> {
        Ok(Self {
            web: WebCipher::new(config.pbkdf2_iterations)?,
            mobile: MobileCipher::new(config.mobile_key_scheme),
        })
    }

    pub fn web(&self) -> &WebCipher {
        &self.web
    }

    pub fn mobile(&self) -> &MobileCipher {
        &self.mobile
    }

    /// Decrypt a web envelope with `password` and re-encrypt it for the
    /// device store of `identity`.
    ///
    /// Every web-side failure surfaces as `GsyncError::Decryption`, whether
    /// the password was wrong or the envelope was damaged.
    pub fn web_to_mobile(
        &self,
        envelope: &WebEncryptedEnvelope,
        password: &SecretString,
        identity: &UserIdentity,
    ) -> GsyncResult<MobileEncryptedEnvelope> {
        let payload = self.web.decrypt(envelope, password).inspect_err(|_| {
            debug!(user_id = %identity.user_id, "bridge: web envelope rejected");
        })?;
        self.mobile.encrypt(&payload, &identity.user_id)
    }

    /// Decrypt a mobile envelope for `identity` and re-encrypt it under
    /// `password` with a freshly generated salt.
    pub fn mobile_to_web(
        &self,
        envelope: &MobileEncryptedEnvelope,
        password: &SecretString,
        identity: &UserIdentity,
    ) -> GsyncResult<WebEncryptedEnvelope> {
        let payload = self.mobile.decrypt(envelope, &identity.user_id).inspect_err(|_| {
            debug!(user_id = %identity.user_id, "bridge: mobile envelope rejected");
        })?;
        self.web.encrypt(&payload, password)
    }

    /// Describe the envelope produced by `direction`.
    pub fn encryption_info(&self, direction: Direction) -> EncryptionInfo {
        match direction {
            Direction::WebToMobile => EncryptionInfo {
                method: "mobile".into(),
                algorithm: "aes-256-cbc".into(),
                key_source: match self.mobile.scheme() {
                    MobileKeyScheme::Hkdf => "user-id (hkdf-sha256)".into(),
                    MobileKeyScheme::Padded => "user-id (padded)".into(),
                },
            },
            Direction::MobileToWeb => EncryptionInfo {
                method: "web".into(),
                algorithm: "aes-256-gcm".into(),
                key_source: format!(
                    "password (pbkdf2-sha256, {} iterations)",
                    self.web.iterations()
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::WebEnvelopeParts;
    use crate::kdf::MIN_PBKDF2_ITERATIONS;
    use gsync_core::{GradePayload, GsyncError};
    use serde_json::json;

    fn bridge() -> ReencryptionBridge {
        ReencryptionBridge::new(
            WebCipher::new(MIN_PBKDF2_ITERATIONS).unwrap(),
            MobileCipher::default(),
        )
    }

    fn identity(user_id: &str) -> UserIdentity {
        UserIdentity {
            user_id: user_id.into(),
            email: format!("{user_id}@example.com"),
        }
    }

    fn payload() -> GradePayload {
        serde_json::from_value(json!({
            "subjects": [{"name": "Mathematik", "grades": [{"value": 2.3, "weight": 1}]}]
        }))
        .unwrap()
    }

    #[test]
    fn test_bridge_roundtrip() {
        let b = bridge();
        let password = SecretString::from("correct-horse");
        let user = identity("u-1");

        let web = b.web().encrypt(&payload(), &password).unwrap();
        let mobile = b.web_to_mobile(&web, &password, &user).unwrap();
        assert_eq!(b.mobile().decrypt(&mobile, "u-1").unwrap(), payload());

        let web_again = b.mobile_to_web(&mobile, &password, &user).unwrap();
        assert_eq!(b.web().decrypt(&web_again, &password).unwrap(), payload());
    }

    #[test]
    fn test_bridge_roundtrip_preserves_document() {
        let b = bridge();
        let password = SecretString::from("correct-horse");
        let user = identity("u-1");
        let doc = json!({
            "schemaVersion": null,
            "subjects": [
                {"name": "M", "grades": [{"value": 2, "type": null, "date": null}]},
                {"name": "E"}
            ]
        });
        let payload: GradePayload = serde_json::from_value(doc.clone()).unwrap();

        let web = b.web().encrypt(&payload, &password).unwrap();
        let mobile = b.web_to_mobile(&web, &password, &user).unwrap();
        let web_again = b.mobile_to_web(&mobile, &password, &user).unwrap();

        let back = b.web().decrypt(&web_again, &password).unwrap();
        assert_eq!(serde_json::to_value(&back).unwrap(), doc);
    }

    #[test]
    fn test_mobile_to_web_uses_fresh_salt() {
        let b = bridge();
        let password = SecretString::from("pw");
        let user = identity("u-1");

        let original = b.web().encrypt(&payload(), &password).unwrap();
        let mobile = b.web_to_mobile(&original, &password, &user).unwrap();
        let reissued = b.mobile_to_web(&mobile, &password, &user).unwrap();

        let a = WebEnvelopeParts::decode(&original).unwrap();
        let r = WebEnvelopeParts::decode(&reissued).unwrap();
        assert_ne!(a.salt, r.salt);
        assert_ne!(a.iv, r.iv);
    }

    #[test]
    fn test_idempotent_in_effect_not_bytes() {
        let b = bridge();
        let password = SecretString::from("pw");
        let user = identity("u-1");
        let web = b.web().encrypt(&payload(), &password).unwrap();

        let m1 = b.web_to_mobile(&web, &password, &user).unwrap();
        let m2 = b.web_to_mobile(&web, &password, &user).unwrap();
        assert_ne!(m1, m2);
        assert_eq!(
            b.mobile().decrypt(&m1, "u-1").unwrap(),
            b.mobile().decrypt(&m2, "u-1").unwrap()
        );
    }

    #[test]
    fn test_wrong_password_and_corruption_look_identical() {
        let b = bridge();
        let password = SecretString::from("correct-horse");
        let user = identity("u-1");
        let web = b.web().encrypt(&payload(), &password).unwrap();

        let wrong_pw = b
            .web_to_mobile(&web, &SecretString::from("wrong-password"), &user)
            .unwrap_err();

        let mut parts = WebEnvelopeParts::decode(&web).unwrap();
        parts.encrypted[0] ^= 0xFF;
        let corrupted = b
            .web_to_mobile(&parts.encode().unwrap(), &password, &user)
            .unwrap_err();

        assert!(matches!(wrong_pw, GsyncError::Decryption));
        assert!(matches!(corrupted, GsyncError::Decryption));
        assert_eq!(wrong_pw.to_string(), corrupted.to_string());
    }

    #[test]
    fn test_mobile_envelope_bound_to_identity() {
        let b = bridge();
        let password = SecretString::from("pw");
        let web = b.web().encrypt(&payload(), &password).unwrap();
        let mobile = b.web_to_mobile(&web, &password, &identity("alice")).unwrap();

        match b.mobile_to_web(&mobile, &password, &identity("mallory")) {
            Err(e) => assert!(matches!(e, GsyncError::Decryption)),
            Ok(env) => assert_ne!(b.web().decrypt(&env, &password).unwrap(), payload()),
        }
    }

    #[test]
    fn test_encryption_info() {
        let b = bridge();
        let to_mobile = b.encryption_info(Direction::WebToMobile);
        assert_eq!(to_mobile.algorithm, "aes-256-cbc");
        assert!(to_mobile.key_source.contains("hkdf"));

        let to_web = b.encryption_info(Direction::MobileToWeb);
        assert_eq!(to_web.algorithm, "aes-256-gcm");
        assert!(to_web.key_source.contains("10000"));
    }

    #[test]
    fn test_from_config_rejects_weak_kdf() {
        let config = CryptoConfig {
            pbkdf2_iterations: 500,
            ..Default::default()
        };
        assert!(ReencryptionBridge::from_config(&config).is_err());
        assert!(ReencryptionBridge::from_config(&CryptoConfig::default()).is_ok());
    }
}
