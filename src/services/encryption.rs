use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::store::models::{DataClassification, EncryptedPayload, Permission};

type HmacSha256 = Hmac<Sha256>;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cipher failures are deliberately opaque: no plaintext, ciphertext or
    /// key material in the message.
    #[error("Cipher operation failed")]
    Cipher,

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Claims carried inside a signed access token. Ephemeral: tokens are never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub protocol_id: Uuid,
    pub permissions: Vec<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of access-token verification. `payload` is only set when the
/// signature checked out and the token is unexpired.
#[derive(Debug, Clone)]
pub struct TokenVerification {
    pub valid: bool,
    pub payload: Option<TokenPayload>,
}

impl TokenVerification {
    fn invalid() -> Self {
        Self {
            valid: false,
            payload: None,
        }
    }
}

/// Seals and unseals sensitive protocol fields, hashes user ids, and
/// issues/verifies HMAC-signed access tokens. Stateless: every operation is
/// a pure function of the process key and its inputs.
pub struct EncryptionService {
    key: [u8; 32],
    token_ttl: Duration,
}

impl EncryptionService {
    /// Build from an optional durable secret. Without one, an ephemeral key
    /// is generated for the process lifetime: data sealed under it is
    /// unrecoverable after restart.
    pub fn new(secret: Option<&str>, token_expiry_hours: i64) -> Self {
        let key = match secret {
            Some(secret) if !secret.is_empty() => {
                let mut hasher = Sha256::new();
                hasher.update(secret.as_bytes());
                hasher.finalize().into()
            }
            _ => {
                tracing::warn!(
                    "No encryption secret configured; generated an ephemeral key. \
                     Data encrypted this session will be unrecoverable after restart."
                );
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                key
            }
        };

        Self {
            key,
            token_ttl: Duration::hours(token_expiry_hours),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.encryption_secret.as_deref(),
            config.token_expiry_hours,
        )
    }

    /// True for classifications whose payloads must be sealed at rest.
    pub fn requires_encryption(&self, classification: DataClassification) -> bool {
        matches!(
            classification,
            DataClassification::Confidential
                | DataClassification::Personal
                | DataClassification::Sensitive
        )
    }

    /// Serialize and seal a value under a fresh random IV.
    pub fn encrypt_sensitive_data(
        &self,
        data: &Value,
        classification: DataClassification,
    ) -> Result<EncryptedPayload, EncryptionError> {
        let plaintext = serde_json::to_vec(data)?;

        let mut iv = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| EncryptionError::Cipher)?;

        Ok(EncryptedPayload {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
            classification,
            encrypted_at: Utc::now(),
        })
    }

    /// Unseal a payload. Any format mismatch or failed authentication tag
    /// is an error; a tampered ciphertext never yields plaintext.
    pub fn decrypt_sensitive_data(
        &self,
        payload: &EncryptedPayload,
    ) -> Result<Value, EncryptionError> {
        let ciphertext = BASE64
            .decode(&payload.ciphertext)
            .map_err(|e| EncryptionError::Malformed(format!("ciphertext: {}", e)))?;
        let iv = BASE64
            .decode(&payload.iv)
            .map_err(|e| EncryptionError::Malformed(format!("iv: {}", e)))?;

        if iv.len() != NONCE_LEN {
            return Err(EncryptionError::Malformed(format!(
                "iv must be {} bytes, got {}",
                NONCE_LEN,
                iv.len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| EncryptionError::Cipher)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// One-way digest of a user id under the process secret.
    pub fn hash_user_id(&self, user_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(self.key);
        format!("{:x}", hasher.finalize())
    }

    /// Recompute and compare in constant time.
    pub fn verify_user_id_hash(&self, user_id: &str, hash: &str) -> bool {
        let computed = self.hash_user_id(user_id);
        if computed.len() != hash.len() {
            return false;
        }
        computed.as_bytes().ct_eq(hash.as_bytes()).into()
    }

    /// Issue a signed access token: base64 JSON payload, a dot, and a hex
    /// HMAC-SHA256 signature over the encoded payload.
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        protocol_id: Uuid,
        permissions: &[Permission],
    ) -> Result<String, EncryptionError> {
        let issued_at = Utc::now();
        let payload = TokenPayload {
            user_id,
            protocol_id,
            permissions: permissions.to_vec(),
            issued_at,
            expires_at: issued_at + self.token_ttl,
        };

        let encoded = BASE64.encode(serde_json::to_vec(&payload)?);
        let signature = hex::encode(self.sign(&encoded)?);
        Ok(format!("{}.{}", encoded, signature))
    }

    /// Verify a token's signature (constant time) and expiry. Any parse or
    /// signature mismatch yields an invalid result rather than an error.
    pub fn verify_access_token(&self, token: &str) -> TokenVerification {
        let Some((encoded, signature_hex)) = token.split_once('.') else {
            return TokenVerification::invalid();
        };

        let Ok(provided) = hex::decode(signature_hex) else {
            return TokenVerification::invalid();
        };
        let Ok(expected) = self.sign(encoded) else {
            return TokenVerification::invalid();
        };
        if provided.len() != expected.len() || !bool::from(provided.ct_eq(&expected)) {
            return TokenVerification::invalid();
        }

        let Ok(bytes) = BASE64.decode(encoded) else {
            return TokenVerification::invalid();
        };
        let Ok(payload) = serde_json::from_slice::<TokenPayload>(&bytes) else {
            return TokenVerification::invalid();
        };

        if payload.expires_at <= Utc::now() {
            return TokenVerification::invalid();
        }

        TokenVerification {
            valid: true,
            payload: Some(payload),
        }
    }

    /// Protocol parameters are personal training data.
    pub fn encrypt_protocol_parameters(
        &self,
        data: &Value,
    ) -> Result<EncryptedPayload, EncryptionError> {
        self.encrypt_sensitive_data(data, DataClassification::Personal)
    }

    pub fn decrypt_protocol_parameters(
        &self,
        payload: &EncryptedPayload,
    ) -> Result<Value, EncryptionError> {
        self.decrypt_sensitive_data(payload)
    }

    /// Per-user adaptations carry physiological response data.
    pub fn encrypt_user_adaptations(
        &self,
        data: &Value,
    ) -> Result<EncryptedPayload, EncryptionError> {
        self.encrypt_sensitive_data(data, DataClassification::Sensitive)
    }

    pub fn decrypt_user_adaptations(
        &self,
        payload: &EncryptedPayload,
    ) -> Result<Value, EncryptionError> {
        self.decrypt_sensitive_data(payload)
    }

    fn sign(&self, encoded: &str) -> Result<[u8; 32], EncryptionError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.key).map_err(|_| EncryptionError::Cipher)?;
        mac.update(encoded.as_bytes());
        Ok(mac.finalize().into_bytes().into())
    }
}
