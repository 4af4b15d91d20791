//! Decryption of fetched secrets before they enter the aggregate

use encryption::logic::crypto_services::{CryptoService, DecryptionService};
use encryption::logic::workspace_key::WorkspaceKey;
use thiserror::Error;
use tracing::{trace, warn};

use super::secret::{RawSecret, SecretRecord, SecretSlot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("workspace key is not available")]
    KeyUnavailable,
}

/// Decrypt every fetched secret with the workspace key.
///
/// Without a key nothing is decrypted and `KeyUnavailable` is returned. A record
/// whose value or comment cannot be decrypted becomes a `DecryptionFailed` slot;
/// the rest of the batch is unaffected.
pub fn decrypt_all(
    raw_secrets: Vec<RawSecret>,
    workspace_key: Option<&WorkspaceKey>,
) -> Result<Vec<SecretSlot>, DecryptionError> {
    let workspace_key = workspace_key.ok_or(DecryptionError::KeyUnavailable)?;
    let decryption_service = DecryptionService::new(CryptoService::new(workspace_key.clone()));

    Ok(raw_secrets
        .into_iter()
        .map(|raw| decrypt_one(&decryption_service, raw))
        .collect())
}

fn decrypt_one(decryption_service: &DecryptionService, raw: RawSecret) -> SecretSlot {
    trace!(environment = %raw.environment, key = %raw.key, "Decrypting secret");

    let decrypted = decryption_service
        .decrypt_data(&raw.ciphertext)
        .and_then(|value| {
            let comment = match &raw.ciphertext_comment {
                Some(ciphertext_comment) => decryption_service.decrypt_data(ciphertext_comment)?,
                None => String::new(),
            };
            Ok((value, comment))
        });

    match decrypted {
        Ok((value, comment)) => SecretSlot::Present {
            record: SecretRecord {
                environment: raw.environment,
                path: raw.path,
                key: raw.key,
                value,
                comment,
            },
        },
        Err(e) => {
            warn!(
                environment = %raw.environment,
                key = %raw.key,
                error = ?e,
                "Failed to decrypt secret"
            );
            SecretSlot::DecryptionFailed {
                environment: raw.environment,
                path: raw.path,
                key: raw.key,
                reason: e.detail(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use encryption::logic::crypto_services::{EncryptedString, crypto_services_for};

        fn raw(env: &str, key: &str, ciphertext: EncryptedString) -> RawSecret {
            RawSecret {
                environment: env.to_string(),
                path: "/".to_string(),
                key: key.to_string(),
                ciphertext,
                ciphertext_comment: None,
            }
        }

        #[test]
        fn test_missing_key_signals_key_unavailable() {
            let workspace_key = WorkspaceKey::generate();
            let (encryption_service, _) = crypto_services_for(&workspace_key);
            let sealed = encryption_service.encrypt_data("value").unwrap();

            let result = decrypt_all(vec![raw("dev", "A", sealed)], None);
            assert_eq!(result, Err(DecryptionError::KeyUnavailable));
        }

        #[test]
        fn test_decrypts_value_and_comment() {
            let workspace_key = WorkspaceKey::generate();
            let (encryption_service, _) = crypto_services_for(&workspace_key);

            let mut secret = raw(
                "dev",
                "DB_URL",
                encryption_service.encrypt_data("postgres://db").unwrap(),
            );
            secret.ciphertext_comment = Some(encryption_service.encrypt_data("primary").unwrap());

            let slots = decrypt_all(vec![secret], Some(&workspace_key)).unwrap();
            let record = slots[0].record().unwrap();
            assert_eq!(record.value, "postgres://db");
            assert_eq!(record.comment, "primary");
        }

        #[test]
        fn test_one_bad_record_does_not_block_the_batch() {
            let workspace_key = WorkspaceKey::generate();
            let (encryption_service, _) = crypto_services_for(&workspace_key);

            let batch = vec![
                raw("dev", "GOOD", encryption_service.encrypt_data("ok").unwrap()),
                raw("dev", "BAD", EncryptedString("garbage".to_string())),
                raw("dev", "EMPTY", encryption_service.encrypt_data("").unwrap()),
            ];

            let slots = decrypt_all(batch, Some(&workspace_key)).unwrap();
            assert_eq!(slots.len(), 3);
            assert_eq!(slots[0].record().unwrap().value, "ok");
            assert!(matches!(
                &slots[1],
                SecretSlot::DecryptionFailed { key, .. } if key == "BAD"
            ));
            assert_eq!(slots[2].record().unwrap().value, "");
        }

        #[test]
        fn test_bad_comment_marks_record_failed() {
            let workspace_key = WorkspaceKey::generate();
            let (encryption_service, _) = crypto_services_for(&workspace_key);

            let mut secret = raw("dev", "A", encryption_service.encrypt_data("v").unwrap());
            secret.ciphertext_comment = Some(EncryptedString("AAAA".to_string()));

            let slots = decrypt_all(vec![secret], Some(&workspace_key)).unwrap();
            assert!(slots[0].record().is_none());
            assert_eq!(slots[0].key(), "A");
        }
    }
}
