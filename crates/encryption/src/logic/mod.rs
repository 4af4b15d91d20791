// Workspace-scoped symmetric encryption used for secret values and comments

pub mod crypto_services;
pub mod workspace_key;

pub use crypto_services::*;
pub use workspace_key::*;
