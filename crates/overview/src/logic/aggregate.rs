//! Aggregate state of one (workspace, path) view.
//!
//! Each participating environment is a column. A column's secrets and folders
//! resolve independently; until a fetch resolves the column is pending and it
//! neither contributes names nor counts as missing anything.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::environment::Environment;
use super::folder::{FolderListing, FolderRecord};
use super::presence::{PresenceEntry, PresenceUnion};
use super::secret::{SecretRecord, SecretSlot};

/// Outcome of one per-environment fetch as handed over by the fetch adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult<T> {
    Pending,
    Ok(T),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchStatus {
    Pending,
    Resolved,
    Failed { reason: String },
}

impl FetchStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, FetchStatus::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FetchStatus::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    Secrets,
    Folders,
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Secrets => write!(f, "secrets"),
            FetchKind::Folders => write!(f, "folders"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvironmentColumn {
    environment: Environment,
    secrets_status: FetchStatus,
    folders_status: FetchStatus,
    secrets: Vec<SecretSlot>,
    folders: Vec<FolderRecord>,
    current_dir_id: Option<String>,
}

impl EnvironmentColumn {
    fn pending(environment: Environment) -> Self {
        Self {
            environment,
            secrets_status: FetchStatus::Pending,
            folders_status: FetchStatus::Pending,
            secrets: Vec::new(),
            folders: Vec::new(),
            current_dir_id: None,
        }
    }
}

/// One environment's cell in a key's row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentSlot<'a> {
    pub environment: &'a Environment,
    pub status: &'a FetchStatus,
    pub slot: Option<&'a SecretSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateState {
    workspace_id: String,
    secret_path: String,
    columns: Vec<EnvironmentColumn>,
    secrets: PresenceUnion<SecretSlot>,
    folders: PresenceUnion<FolderRecord>,
    key_seed: Vec<String>,
    folder_seed: Vec<String>,
    key_unavailable: bool,
}

impl AggregateState {
    /// A view in which every environment is still pending
    pub fn new(
        workspace_id: impl Into<String>,
        secret_path: impl Into<String>,
        environments: Vec<Environment>,
    ) -> Self {
        let width = environments.len();
        Self {
            workspace_id: workspace_id.into(),
            secret_path: secret_path.into(),
            columns: environments
                .into_iter()
                .map(EnvironmentColumn::pending)
                .collect(),
            secrets: PresenceUnion::new(width),
            folders: PresenceUnion::new(width),
            key_seed: Vec::new(),
            folder_seed: Vec::new(),
            key_unavailable: false,
        }
    }

    /// Aggregate a complete set of fetch results.
    ///
    /// An environment missing from a result map is treated as pending.
    pub fn build(
        workspace_id: impl Into<String>,
        secret_path: impl Into<String>,
        environments: Vec<Environment>,
        secrets: HashMap<String, FetchResult<Vec<SecretSlot>>>,
        folders: HashMap<String, FetchResult<FolderListing>>,
    ) -> Self {
        let mut state = Self::new(workspace_id, secret_path, environments);
        for (slug, result) in secrets {
            state.store_secrets(&slug, result);
        }
        for (slug, result) in folders {
            state.store_folders(&slug, result);
        }
        state.reindex_secrets();
        state.reindex_folders();
        state
    }

    /// Carry the current name order into a replacement state for the same path.
    ///
    /// Used when the environment list changes: names already on screen keep
    /// their relative order in the rebuilt view.
    pub fn with_order_of(mut self, previous: &AggregateState) -> Self {
        if previous.secret_path == self.secret_path {
            self.key_seed = previous.secrets.names().map(str::to_string).collect();
            self.folder_seed = previous.folders.names().map(str::to_string).collect();
            self.reindex_secrets();
            self.reindex_folders();
        }
        self
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn secret_path(&self) -> &str {
        &self.secret_path
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.columns.iter().map(|column| &column.environment)
    }

    pub fn environment_index(&self, slug: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.environment.slug == slug)
    }

    pub fn secrets_status(&self, slug: &str) -> Option<&FetchStatus> {
        self.column(slug).map(|column| &column.secrets_status)
    }

    pub fn folders_status(&self, slug: &str) -> Option<&FetchStatus> {
        self.column(slug).map(|column| &column.folders_status)
    }

    /// True while any participating environment has a fetch in flight
    pub fn is_loading(&self) -> bool {
        self.columns.iter().any(|column| {
            column.secrets_status.is_pending() || column.folders_status.is_pending()
        })
    }

    pub fn is_key_unavailable(&self) -> bool {
        self.key_unavailable
    }

    /// Secret values cannot be shown because the workspace key is missing.
    /// Folders remain visible.
    pub fn mark_key_unavailable(&mut self) {
        if !self.key_unavailable {
            warn!(secret_path = %self.secret_path, "Workspace key unavailable, secret values suppressed");
        }
        self.key_unavailable = true;
        for column in &mut self.columns {
            column.secrets.clear();
        }
        self.secrets = PresenceUnion::new(self.columns.len());
    }

    pub fn secret_keys(&self) -> impl Iterator<Item = &str> {
        self.secrets.names()
    }

    pub fn folder_names(&self) -> impl Iterator<Item = &str> {
        self.folders.names()
    }

    pub fn total_keys(&self) -> usize {
        self.secrets.len()
    }

    /// Keys of the key-space that `slug` does not define.
    ///
    /// `None` when the answer is unknown: the environment is pending, failed,
    /// not part of the view, or the workspace key is missing.
    pub fn missing_count(&self, slug: &str) -> Option<usize> {
        if self.key_unavailable {
            return None;
        }
        let pos = self.environment_index(slug)?;
        if !self.columns[pos].secrets_status.is_resolved() {
            return None;
        }
        Some(self.secrets.len() - self.secrets.count_present(pos))
    }

    pub fn is_folder_present(&self, folder_name: &str, slug: &str) -> bool {
        self.environment_index(slug)
            .is_some_and(|pos| self.folders.is_present(folder_name, pos))
    }

    /// Row of `key` across all environments, `None` if the key is not in the key-space
    pub fn get_by_key(&self, key: &str) -> Option<Vec<EnvironmentSlot<'_>>> {
        let entry = self.secrets.get(key)?;
        Some(
            self.columns
                .iter()
                .enumerate()
                .map(|(pos, column)| EnvironmentSlot {
                    environment: &column.environment,
                    status: &column.secrets_status,
                    slot: entry.slot(pos),
                })
                .collect(),
        )
    }

    pub fn secret(&self, slug: &str, key: &str) -> Option<&SecretSlot> {
        let pos = self.environment_index(slug)?;
        self.secrets.get(key)?.slot(pos)
    }

    pub fn secret_entries(&self) -> &[PresenceEntry<SecretSlot>] {
        self.secrets.entries()
    }

    pub fn folder_entries(&self) -> &[PresenceEntry<FolderRecord>] {
        self.folders.entries()
    }

    /// Id of the directory shown for `slug`, as reported by its folder listing
    pub fn current_dir_id(&self, slug: &str) -> Option<&str> {
        self.column(slug)?.current_dir_id.as_deref()
    }

    /// Apply the secrets fetch of one environment. Returns false for an unknown slug.
    pub fn resolve_secrets(&mut self, slug: &str, result: FetchResult<Vec<SecretSlot>>) -> bool {
        if !self.store_secrets(slug, result) {
            return false;
        }
        self.reindex_secrets();
        true
    }

    /// Apply the folders fetch of one environment. Returns false for an unknown slug.
    pub fn resolve_folders(&mut self, slug: &str, result: FetchResult<FolderListing>) -> bool {
        if !self.store_folders(slug, result) {
            return false;
        }
        self.reindex_folders();
        true
    }

    /// Put `record` into its environment's slot, adding the key to the key-space if new.
    /// Other environments' slots are untouched.
    pub fn upsert_secret(&mut self, record: SecretRecord) -> Option<SecretSlot> {
        let pos = self.environment_index(&record.environment)?;
        let key = record.key.clone();
        let slot = SecretSlot::from(record);

        let column = &mut self.columns[pos];
        match column.secrets.iter_mut().find(|s| s.key() == key) {
            Some(existing) => *existing = slot.clone(),
            None => column.secrets.push(slot.clone()),
        }

        let is_new = self.secrets.get(&key).is_none();
        let previous = self.secrets.insert(pos, key, slot);
        if is_new {
            // pin the on-screen order so a column resolving later appends after it
            self.key_seed = self.secrets.names().map(str::to_string).collect();
        }
        previous
    }

    /// Empty one environment's slot for `key`; the key leaves the key-space once no environment holds it
    pub fn remove_secret(&mut self, slug: &str, key: &str) -> Option<SecretSlot> {
        let pos = self.environment_index(slug)?;
        self.columns[pos].secrets.retain(|s| s.key() != key);
        self.secrets.clear(pos, key)
    }

    fn column(&self, slug: &str) -> Option<&EnvironmentColumn> {
        self.columns
            .iter()
            .find(|column| column.environment.slug == slug)
    }

    fn store_secrets(&mut self, slug: &str, result: FetchResult<Vec<SecretSlot>>) -> bool {
        let key_unavailable = self.key_unavailable;
        let Some(column) = self
            .columns
            .iter_mut()
            .find(|column| column.environment.slug == slug)
        else {
            debug!(environment = %slug, "Ignoring secrets for environment outside the view");
            return false;
        };

        match result {
            FetchResult::Pending => {
                column.secrets_status = FetchStatus::Pending;
                column.secrets.clear();
            }
            FetchResult::Ok(slots) => {
                column.secrets_status = FetchStatus::Resolved;
                column.secrets = if key_unavailable {
                    Vec::new()
                } else {
                    last_per_key(slots.into_iter().filter(|slot| {
                        let matches = slot.environment() == slug;
                        if !matches {
                            warn!(
                                environment = %slug,
                                key = %slot.key(),
                                "Dropping secret attributed to another environment"
                            );
                        }
                        matches
                    }))
                };
            }
            FetchResult::Error(reason) => {
                warn!(environment = %slug, reason = %reason, "Secrets fetch failed");
                column.secrets_status = FetchStatus::Failed { reason };
                column.secrets.clear();
            }
        }
        true
    }

    fn store_folders(&mut self, slug: &str, result: FetchResult<FolderListing>) -> bool {
        let Some(column) = self
            .columns
            .iter_mut()
            .find(|column| column.environment.slug == slug)
        else {
            debug!(environment = %slug, "Ignoring folders for environment outside the view");
            return false;
        };

        match result {
            FetchResult::Pending => {
                column.folders_status = FetchStatus::Pending;
                column.folders.clear();
                column.current_dir_id = None;
            }
            FetchResult::Ok(listing) => {
                column.folders_status = FetchStatus::Resolved;
                column.folders = listing.folders;
                column.current_dir_id = listing.current_dir_id;
            }
            FetchResult::Error(reason) => {
                warn!(environment = %slug, reason = %reason, "Folders fetch failed");
                column.folders_status = FetchStatus::Failed { reason };
                column.folders.clear();
                column.current_dir_id = None;
            }
        }
        true
    }

    fn reindex_secrets(&mut self) {
        self.secrets = PresenceUnion::build(
            self.columns.len(),
            &self.key_seed,
            self.columns.iter().enumerate().map(|(pos, column)| {
                (
                    pos,
                    column
                        .secrets
                        .iter()
                        .map(|slot| (slot.key().to_string(), slot.clone())),
                )
            }),
        );
    }

    fn reindex_folders(&mut self) {
        self.folders = PresenceUnion::build(
            self.columns.len(),
            &self.folder_seed,
            self.columns.iter().enumerate().map(|(pos, column)| {
                (
                    pos,
                    column
                        .folders
                        .iter()
                        .map(|folder| (folder.name.clone(), folder.clone())),
                )
            }),
        );
    }
}

/// One slot per key: a repeated key keeps the position of its first row and the value of its last
fn last_per_key(slots: impl IntoIterator<Item = SecretSlot>) -> Vec<SecretSlot> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SecretSlot> = Vec::new();
    for slot in slots {
        match seen.get(slot.key()) {
            Some(&pos) => {
                debug!(key = %slot.key(), "Duplicate secret key in one environment, keeping the last");
                unique[pos] = slot;
            }
            None => {
                seen.insert(slot.key().to_string(), unique.len());
                unique.push(slot);
            }
        }
    }
    unique
}
