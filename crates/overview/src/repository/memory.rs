//! In-process secrets API.
//!
//! Backs the CLI fixtures and the tests. Fetches and writes of an environment can
//! be held back or made to fail so that loading and failure paths are observable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use encryption::logic::crypto_services::EncryptionService;
use serde::Deserialize;
use shared::error::CommonError;
use tokio::sync::{RwLock, watch};
use tracing::{debug, trace};

use super::{SecretsApiLike, WriteSecret};
use crate::logic::environment::Environment;
use crate::logic::folder::{FolderListing, FolderRecord, join_path, normalize_path};
use crate::logic::mutation::MutationKind;
use crate::logic::secret::RawSecret;

fn default_path() -> String {
    normalize_path("")
}

/// A plaintext secret as written in a fixture file
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSecret {
    pub environment: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub comment: String,
}

/// A whole workspace described in JSON: its environments, secrets and folders
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceFixture {
    pub workspace_id: String,
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub secrets: Vec<FixtureSecret>,
    #[serde(default)]
    pub folders: Vec<FolderRecord>,
}

impl WorkspaceFixture {
    pub fn from_json(json: &str) -> Result<Self, CommonError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Default)]
struct Store {
    secrets: Vec<RawSecret>,
    folders: Vec<FolderRecord>,
}

pub struct InMemorySecretsApi {
    workspace_id: String,
    store: RwLock<Store>,
    held: watch::Sender<HashSet<String>>,
    failing: RwLock<HashSet<String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemorySecretsApi {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        let (held, _) = watch::channel(HashSet::new());
        Self {
            workspace_id: workspace_id.into(),
            store: RwLock::new(Store::default()),
            held,
            failing: RwLock::new(HashSet::new()),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seal every fixture secret with `encryption_service` and store it
    pub async fn from_fixture(
        fixture: &WorkspaceFixture,
        encryption_service: &EncryptionService,
    ) -> Result<Self, CommonError> {
        let api = Self::new(fixture.workspace_id.clone());
        for secret in &fixture.secrets {
            let ciphertext_comment = if secret.comment.is_empty() {
                None
            } else {
                Some(encryption_service.encrypt_data(&secret.comment)?)
            };
            api.insert_secret(RawSecret {
                environment: secret.environment.clone(),
                path: normalize_path(&secret.path),
                key: secret.key.clone(),
                ciphertext: encryption_service.encrypt_data(&secret.value)?,
                ciphertext_comment,
            })
            .await;
        }
        for folder in &fixture.folders {
            api.insert_folder(folder.clone()).await;
        }
        debug!(
            workspace_id = %fixture.workspace_id,
            secrets = fixture.secrets.len(),
            folders = fixture.folders.len(),
            "Loaded workspace fixture"
        );
        Ok(api)
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub async fn insert_secret(&self, secret: RawSecret) {
        self.store.write().await.secrets.push(secret);
    }

    pub async fn insert_folder(&self, mut folder: FolderRecord) {
        folder.path = normalize_path(&folder.path);
        self.store.write().await.folders.push(folder);
    }

    /// Block fetches and writes for `environment` until released
    pub fn hold_environment(&self, environment: &str) {
        self.held.send_modify(|held| {
            held.insert(environment.to_string());
        });
    }

    pub fn release_environment(&self, environment: &str) {
        self.held.send_modify(|held| {
            held.remove(environment);
        });
    }

    pub async fn fail_environment(&self, environment: &str) {
        self.failing.write().await.insert(environment.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of writes that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn gate(&self, workspace_id: &str, environment: &str) -> Result<(), CommonError> {
        let mut held = self.held.subscribe();
        held.wait_for(|held| !held.contains(environment))
            .await
            .map_err(|e| CommonError::TokioChannelError {
                source: Box::new(e),
            })?;

        if workspace_id != self.workspace_id {
            return Err(CommonError::NotFound {
                msg: format!("workspace '{workspace_id}' not found"),
                lookup_id: workspace_id.to_string(),
                source: None,
            });
        }
        if self.failing.read().await.contains(environment) {
            return Err(CommonError::Repository {
                msg: format!("environment '{environment}' is unreachable"),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SecretsApiLike for InMemorySecretsApi {
    async fn fetch_secrets(
        &self,
        workspace_id: &str,
        environment: &str,
        secret_path: &str,
    ) -> Result<Vec<RawSecret>, CommonError> {
        self.gate(workspace_id, environment).await?;
        let secret_path = normalize_path(secret_path);
        let store = self.store.read().await;
        let secrets: Vec<RawSecret> = store
            .secrets
            .iter()
            .filter(|s| s.environment == environment && s.path == secret_path)
            .cloned()
            .collect();
        trace!(environment = %environment, count = secrets.len(), "Fetched secrets");
        Ok(secrets)
    }

    async fn fetch_folders(
        &self,
        workspace_id: &str,
        environment: &str,
        parent_path: &str,
    ) -> Result<FolderListing, CommonError> {
        self.gate(workspace_id, environment).await?;
        let parent_path = normalize_path(parent_path);
        let store = self.store.read().await;

        let folders: Vec<FolderRecord> = store
            .folders
            .iter()
            .filter(|f| f.environment == environment && f.path == parent_path)
            .cloned()
            .collect();
        let current_dir_id = store
            .folders
            .iter()
            .find(|f| f.environment == environment && join_path(&f.path, &f.name) == parent_path)
            .map(|f| f.id.clone());

        trace!(environment = %environment, count = folders.len(), "Fetched folders");
        Ok(FolderListing {
            folders,
            current_dir_id,
        })
    }

    async fn write_secret(&self, params: &WriteSecret) -> Result<(), CommonError> {
        self.gate(&params.workspace_id, &params.environment).await?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CommonError::Repository {
                msg: format!("write to '{}' rejected", params.environment),
                source: None,
            });
        }

        let secret_path = normalize_path(&params.secret_path);
        let mut store = self.store.write().await;
        let existing = store.secrets.iter().position(|s| {
            s.environment == params.environment && s.path == secret_path && s.key == params.key
        });

        let not_found = || CommonError::NotFound {
            msg: format!(
                "secret '{}' not found in '{}'",
                params.key, params.environment
            ),
            lookup_id: params.key.clone(),
            source: None,
        };
        let missing_value = || CommonError::InvalidRequest {
            msg: format!("{} of '{}' carries no value", params.kind, params.key),
            source: None,
        };

        match (params.kind, existing) {
            (MutationKind::Create, Some(_)) => {
                return Err(CommonError::InvalidRequest {
                    msg: format!(
                        "secret '{}' already exists in '{}'",
                        params.key, params.environment
                    ),
                    source: None,
                });
            }
            (MutationKind::Create, None) => {
                let ciphertext = params.ciphertext.clone().ok_or_else(missing_value)?;
                store.secrets.push(RawSecret {
                    environment: params.environment.clone(),
                    path: secret_path,
                    key: params.key.clone(),
                    ciphertext,
                    ciphertext_comment: params.ciphertext_comment.clone(),
                });
            }
            (MutationKind::Update, Some(pos)) => {
                let ciphertext = params.ciphertext.clone().ok_or_else(missing_value)?;
                let secret = &mut store.secrets[pos];
                secret.ciphertext = ciphertext;
                if let Some(comment) = &params.ciphertext_comment {
                    secret.ciphertext_comment = Some(comment.clone());
                }
            }
            (MutationKind::Delete, Some(pos)) => {
                store.secrets.remove(pos);
            }
            (MutationKind::Update | MutationKind::Delete, None) => return Err(not_found()),
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(
            kind = %params.kind,
            environment = %params.environment,
            key = %params.key,
            "Secret written"
        );
        Ok(())
    }
}
