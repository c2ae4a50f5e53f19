use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who can discover a protocol without an explicit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Private,
    Tenant,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::Tenant => "TENANT",
            Visibility::Public => "PUBLIC",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIVATE" => Ok(Visibility::Private),
            "TENANT" => Ok(Visibility::Tenant),
            "PUBLIC" => Ok(Visibility::Public),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// Sensitivity level driving field-level encryption decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataClassification {
    Public,
    Internal,
    Confidential,
    Personal,
    Sensitive,
}

impl DataClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            DataClassification::Public => "PUBLIC",
            DataClassification::Internal => "INTERNAL",
            DataClassification::Confidential => "CONFIDENTIAL",
            DataClassification::Personal => "PERSONAL",
            DataClassification::Sensitive => "SENSITIVE",
        }
    }
}

impl std::str::FromStr for DataClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(DataClassification::Public),
            "INTERNAL" => Ok(DataClassification::Internal),
            "CONFIDENTIAL" => Ok(DataClassification::Confidential),
            "PERSONAL" => Ok(DataClassification::Personal),
            "SENSITIVE" => Ok(DataClassification::Sensitive),
            other => Err(format!("unknown data classification: {}", other)),
        }
    }
}

/// Sealed field value as persisted inside protocol rows. The ciphertext
/// carries the AES-GCM authentication tag; the IV is the 12-byte nonce
/// used for that encryption. Both are base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub ciphertext: String,
    pub iv: String,
    pub classification: DataClassification,
    pub encrypted_at: DateTime<Utc>,
}

/// A training protocol. Ownership is a standalone fact independent of the
/// grant table: the owner passes every permission check with zero grant rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub visibility: Visibility,
    pub data_classification: DataClassification,
    pub parameters: Option<EncryptedPayload>,
    pub adaptations: Option<EncryptedPayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
