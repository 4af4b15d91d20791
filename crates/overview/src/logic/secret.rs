//! Secret records as they travel from the secrets API into the overview

use encryption::logic::crypto_services::EncryptedString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A secret exactly as fetched: name in clear, value and comment still sealed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSecret {
    pub environment: String,
    pub path: String,
    pub key: String,
    pub ciphertext: EncryptedString,
    #[serde(default)]
    pub ciphertext_comment: Option<EncryptedString>,
}

/// A decrypted secret, one per (environment, path, key)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SecretRecord {
    pub environment: String,
    pub path: String,
    pub key: String,
    pub value: String,
    pub comment: String,
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("environment", &self.environment)
            .field("path", &self.path)
            .field("key", &self.key)
            .field("value", &"************")
            .finish_non_exhaustive()
    }
}

/// What one environment holds for one key.
///
/// A record that failed to decrypt keeps its place so the key never vanishes from the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecretSlot {
    Present {
        record: SecretRecord,
    },
    DecryptionFailed {
        environment: String,
        path: String,
        key: String,
        reason: String,
    },
}

impl SecretSlot {
    pub fn key(&self) -> &str {
        match self {
            SecretSlot::Present { record } => &record.key,
            SecretSlot::DecryptionFailed { key, .. } => key,
        }
    }

    pub fn environment(&self) -> &str {
        match self {
            SecretSlot::Present { record } => &record.environment,
            SecretSlot::DecryptionFailed { environment, .. } => environment,
        }
    }

    pub fn record(&self) -> Option<&SecretRecord> {
        match self {
            SecretSlot::Present { record } => Some(record),
            SecretSlot::DecryptionFailed { .. } => None,
        }
    }
}

impl From<SecretRecord> for SecretSlot {
    fn from(record: SecretRecord) -> Self {
        SecretSlot::Present { record }
    }
}
