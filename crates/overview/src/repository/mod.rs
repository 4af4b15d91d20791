//! Boundary to the remote secrets API.
//!
//! The overview only reads sealed secrets and folder listings through this trait
//! and hands it sealed writes; transport is the implementor's concern.

pub mod memory;

use async_trait::async_trait;
use encryption::logic::crypto_services::EncryptedString;
use shared::error::CommonError;

pub use memory::{InMemorySecretsApi, WorkspaceFixture};

use crate::logic::{folder::FolderListing, mutation::MutationKind, secret::RawSecret};

/// Parameters for writing one secret of one environment
#[derive(Debug, Clone)]
pub struct WriteSecret {
    pub kind: MutationKind,
    pub workspace_id: String,
    pub environment: String,
    pub secret_path: String,
    pub key: String,
    /// Sealed value, absent for deletes
    pub ciphertext: Option<EncryptedString>,
    /// Sealed comment; absent leaves the stored comment as it is
    pub ciphertext_comment: Option<EncryptedString>,
}

/// Secrets API operations the overview depends on
#[async_trait]
pub trait SecretsApiLike: Send + Sync {
    /// Sealed secrets of one environment at `secret_path`
    async fn fetch_secrets(
        &self,
        workspace_id: &str,
        environment: &str,
        secret_path: &str,
    ) -> Result<Vec<RawSecret>, CommonError>;

    /// Folders of one environment directly below `parent_path`
    async fn fetch_folders(
        &self,
        workspace_id: &str,
        environment: &str,
        parent_path: &str,
    ) -> Result<FolderListing, CommonError>;

    async fn write_secret(&self, params: &WriteSecret) -> Result<(), CommonError>;
}
