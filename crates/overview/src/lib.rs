//! Cross-environment secrets overview
//!
//! This crate provides:
//! - Decryption of fetched secrets with the workspace key
//! - Aggregation of secrets and folders of many environments into one key-space
//! - A filterable matrix projection with per-environment missing counts
//! - Single-environment mutations that patch the aggregate after a successful write
//! - HTTP API endpoints for the presentation layer

pub mod logic;
pub mod repository;
pub mod router;
pub mod service;

// Re-export commonly used types
pub use logic::aggregate::{AggregateState, FetchResult, FetchStatus};
pub use logic::environment::Environment;
pub use logic::event::{
    OverviewChangeEvt, OverviewChangeRx, OverviewChangeTx, create_overview_change_channel,
};
pub use logic::matrix::{MatrixCell, OverviewMatrix};
pub use logic::mutation::{MutationError, MutationKind, SecretMutation};
pub use repository::{InMemorySecretsApi, SecretsApiLike, WorkspaceFixture};
pub use router::create_router;
pub use service::{ExploreTarget, OverviewService, OverviewServiceParams};
