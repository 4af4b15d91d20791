//! Single-environment secret mutations.
//!
//! A mutation is validated, turned into one sealed write for the collaborator and,
//! once that write succeeded, patched into the aggregate of the same view.

use encryption::logic::crypto_services::EncryptionService;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use super::aggregate::AggregateState;
use super::event::OverviewChangeEvt;
use super::secret::{SecretRecord, SecretSlot};
use crate::repository::WriteSecret;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A change to one key of one environment at the current path
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretMutation {
    Create { key: String, value: String },
    Update { key: String, value: String },
    Delete { key: String },
}

impl std::fmt::Debug for SecretMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMutation")
            .field("kind", &self.kind())
            .field("key", &self.key())
            .finish_non_exhaustive()
    }
}

impl SecretMutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            SecretMutation::Create { .. } => MutationKind::Create,
            SecretMutation::Update { .. } => MutationKind::Update,
            SecretMutation::Delete { .. } => MutationKind::Delete,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            SecretMutation::Create { key, .. }
            | SecretMutation::Update { key, .. }
            | SecretMutation::Delete { key } => key,
        }
    }

    fn value(&self) -> Option<&str> {
        match self {
            SecretMutation::Create { value, .. } | SecretMutation::Update { value, .. } => {
                Some(value)
            }
            SecretMutation::Delete { .. } => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("invalid mutation: {0}")]
    Validation(String),
    #[error("workspace key is not available")]
    KeyUnavailable,
    #[error("environment '{0}' is not available in the current view")]
    EnvironmentUnavailable(String),
    #[error("a mutation of '{key}' in '{environment}' is already in flight")]
    InFlight { environment: String, key: String },
    #[error("{kind} of '{key}' in '{environment}' failed: {reason}")]
    Failed {
        environment: String,
        key: String,
        kind: MutationKind,
        reason: String,
    },
}

impl From<MutationError> for CommonError {
    fn from(error: MutationError) -> Self {
        match &error {
            MutationError::Failed { .. } => CommonError::InvalidResponse {
                msg: error.to_string(),
                source: None,
            },
            MutationError::Validation(_)
            | MutationError::KeyUnavailable
            | MutationError::EnvironmentUnavailable(_)
            | MutationError::InFlight { .. } => CommonError::InvalidRequest {
                msg: error.to_string(),
                source: None,
            },
        }
    }
}

/// Reject malformed input before anything leaves the process
pub fn validate(mutation: &SecretMutation) -> Result<(), MutationError> {
    if mutation.key().trim().is_empty() {
        return Err(MutationError::Validation(
            "secret key must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Seal `mutation` into the write handed to the collaborator.
///
/// A create carries an empty comment. An update leaves the comment unset so the
/// collaborator keeps whatever comment the secret already has, unless `current`
/// failed to decrypt: that comment cannot be shown, so the update resets it to empty.
pub fn prepare_write(
    workspace_id: &str,
    environment: &str,
    secret_path: &str,
    mutation: &SecretMutation,
    current: Option<&SecretSlot>,
    encryption_service: Option<&EncryptionService>,
) -> Result<WriteSecret, MutationError> {
    validate(mutation)?;

    let (ciphertext, ciphertext_comment) = match mutation.value() {
        Some(value) => {
            let encryption_service = encryption_service.ok_or(MutationError::KeyUnavailable)?;
            let seal = |data: &str| {
                encryption_service
                    .encrypt_data(data)
                    .map_err(|e| MutationError::Failed {
                        environment: environment.to_string(),
                        key: mutation.key().to_string(),
                        kind: mutation.kind(),
                        reason: e.detail(),
                    })
            };
            let reset_comment = match mutation.kind() {
                MutationKind::Create => true,
                _ => matches!(current, Some(SecretSlot::DecryptionFailed { .. })),
            };
            let comment = if reset_comment { Some(seal("")?) } else { None };
            (Some(seal(value)?), comment)
        }
        None => (None, None),
    };

    Ok(WriteSecret {
        kind: mutation.kind(),
        workspace_id: workspace_id.to_string(),
        environment: environment.to_string(),
        secret_path: secret_path.to_string(),
        key: mutation.key().to_string(),
        ciphertext,
        ciphertext_comment,
    })
}

/// Patch a successful write into `state`, touching only `environment`'s slot of the key
pub fn apply_to_aggregate(
    state: &mut AggregateState,
    environment: &str,
    mutation: &SecretMutation,
) -> OverviewChangeEvt {
    let secret_path = state.secret_path().to_string();
    match mutation {
        SecretMutation::Create { key, value } | SecretMutation::Update { key, value } => {
            let comment = match state.secret(environment, key) {
                Some(SecretSlot::Present { record }) if mutation.kind() == MutationKind::Update => {
                    record.comment.clone()
                }
                _ => String::new(),
            };
            let record = SecretRecord {
                environment: environment.to_string(),
                path: secret_path,
                key: key.clone(),
                value: value.clone(),
                comment,
            };
            let previous = state.upsert_secret(record.clone());
            debug!(
                environment = %environment,
                key = %key,
                replaced = previous.is_some(),
                "Patched secret into overview"
            );
            match mutation.kind() {
                MutationKind::Create => OverviewChangeEvt::SecretCreated(record),
                _ => OverviewChangeEvt::SecretUpdated(record),
            }
        }
        SecretMutation::Delete { key } => {
            let previous = state.remove_secret(environment, key);
            debug!(
                environment = %environment,
                key = %key,
                removed = previous.is_some(),
                "Cleared secret from overview"
            );
            OverviewChangeEvt::SecretDeleted {
                environment: environment.to_string(),
                path: secret_path,
                key: key.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use std::collections::HashMap;

        use super::super::*;
        use crate::logic::aggregate::FetchResult;
        use crate::logic::environment::Environment;
        use encryption::logic::crypto_services::crypto_services_for;
        use encryption::logic::workspace_key::WorkspaceKey;

        fn state() -> AggregateState {
            let slot = |env: &str, key: &str, comment: &str| {
                SecretSlot::from(SecretRecord {
                    environment: env.to_string(),
                    path: "/app".to_string(),
                    key: key.to_string(),
                    value: "old".to_string(),
                    comment: comment.to_string(),
                })
            };
            AggregateState::build(
                "ws",
                "/app",
                vec![
                    Environment::new("dev", "Development"),
                    Environment::new("prod", "Production"),
                ],
                HashMap::from([
                    (
                        "dev".to_string(),
                        FetchResult::Ok(vec![slot("dev", "SHARED", "rotated monthly")]),
                    ),
                    (
                        "prod".to_string(),
                        FetchResult::Ok(vec![slot("prod", "SHARED", "")]),
                    ),
                ]),
                HashMap::new(),
            )
        }

        #[test]
        fn test_empty_key_is_rejected() {
            let mutation = SecretMutation::Create {
                key: "   ".to_string(),
                value: "v".to_string(),
            };
            assert!(matches!(
                validate(&mutation),
                Err(MutationError::Validation(_))
            ));

            let delete = SecretMutation::Delete { key: String::new() };
            assert!(matches!(validate(&delete), Err(MutationError::Validation(_))));
        }

        #[test]
        fn test_prepare_write_without_key_is_key_unavailable() {
            let mutation = SecretMutation::Update {
                key: "A".to_string(),
                value: "v".to_string(),
            };
            assert_eq!(
                prepare_write("ws", "dev", "/", &mutation, None, None).unwrap_err(),
                MutationError::KeyUnavailable
            );
        }

        #[test]
        fn test_delete_needs_no_key_material() {
            let mutation = SecretMutation::Delete {
                key: "A".to_string(),
            };
            let write = prepare_write("ws", "dev", "/", &mutation, None, None).unwrap();
            assert_eq!(write.kind, MutationKind::Delete);
            assert!(write.ciphertext.is_none());
        }

        #[test]
        fn test_prepare_write_seals_value() {
            let workspace_key = WorkspaceKey::generate();
            let (encryption_service, decryption_service) = crypto_services_for(&workspace_key);
            let mutation = SecretMutation::Create {
                key: "A".to_string(),
                value: "plain".to_string(),
            };

            let write =
                prepare_write("ws", "dev", "/app", &mutation, None, Some(&encryption_service)).unwrap();
            assert_eq!(write.environment, "dev");
            assert_eq!(write.secret_path, "/app");
            assert_eq!(
                decryption_service
                    .decrypt_data(write.ciphertext.as_ref().unwrap())
                    .unwrap(),
                "plain"
            );
            assert_eq!(
                decryption_service
                    .decrypt_data(write.ciphertext_comment.as_ref().unwrap())
                    .unwrap(),
                ""
            );

            let update = SecretMutation::Update {
                key: "A".to_string(),
                value: "next".to_string(),
            };
            let write =
                prepare_write("ws", "dev", "/app", &update, None, Some(&encryption_service)).unwrap();
            assert!(write.ciphertext_comment.is_none());
        }

        #[test]
        fn test_update_over_undecryptable_slot_resets_comment() {
            let (encryption_service, decryption_service) =
                crypto_services_for(&WorkspaceKey::generate());
            let current = SecretSlot::DecryptionFailed {
                environment: "dev".to_string(),
                path: "/app".to_string(),
                key: "A".to_string(),
                reason: "bad tag".to_string(),
            };
            let update = SecretMutation::Update {
                key: "A".to_string(),
                value: "next".to_string(),
            };

            let write = prepare_write(
                "ws",
                "dev",
                "/app",
                &update,
                Some(&current),
                Some(&encryption_service),
            )
            .unwrap();
            assert_eq!(
                decryption_service
                    .decrypt_data(write.ciphertext_comment.as_ref().unwrap())
                    .unwrap(),
                ""
            );

            let mut state = AggregateState::build(
                "ws",
                "/app",
                vec![Environment::new("dev", "Development")],
                HashMap::from([("dev".to_string(), FetchResult::Ok(vec![current]))]),
                HashMap::new(),
            );
            let OverviewChangeEvt::SecretUpdated(record) =
                apply_to_aggregate(&mut state, "dev", &update)
            else {
                panic!("expected an update event");
            };
            assert_eq!(record.comment, "");
        }

        #[test]
        fn test_update_keeps_comment_of_that_environment_only() {
            let mut state = state();
            let evt = apply_to_aggregate(
                &mut state,
                "dev",
                &SecretMutation::Update {
                    key: "SHARED".to_string(),
                    value: "new".to_string(),
                },
            );

            let OverviewChangeEvt::SecretUpdated(record) = evt else {
                panic!("expected an update event");
            };
            assert_eq!(record.comment, "rotated monthly");
            assert_eq!(record.path, "/app");
            assert_eq!(
                state.secret("prod", "SHARED").and_then(SecretSlot::record).unwrap().value,
                "old"
            );
        }

        #[test]
        fn test_create_then_delete_round_trip_on_aggregate() {
            let mut state = state();
            apply_to_aggregate(
                &mut state,
                "prod",
                &SecretMutation::Create {
                    key: "NEW".to_string(),
                    value: "v".to_string(),
                },
            );
            assert_eq!(state.missing_count("dev"), Some(1));

            apply_to_aggregate(
                &mut state,
                "prod",
                &SecretMutation::Delete {
                    key: "NEW".to_string(),
                },
            );
            assert!(state.get_by_key("NEW").is_none());
            assert_eq!(state.missing_count("dev"), Some(0));
        }

        #[test]
        fn test_error_mapping_to_common_error() {
            let validation: CommonError = MutationError::Validation("x".to_string()).into();
            assert!(matches!(validation, CommonError::InvalidRequest { .. }));

            let failed: CommonError = MutationError::Failed {
                environment: "dev".to_string(),
                key: "A".to_string(),
                kind: MutationKind::Update,
                reason: "boom".to_string(),
            }
            .into();
            assert!(matches!(failed, CommonError::InvalidResponse { .. }));
        }

        #[test]
        fn test_debug_does_not_show_value() {
            let mutation = SecretMutation::Create {
                key: "A".to_string(),
                value: "hunter2".to_string(),
            };
            assert!(!format!("{mutation:?}").contains("hunter2"));
        }
    }
}
