pub mod matrix;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use encryption::logic::{crypto_services::crypto_services_for, workspace_key::WorkspaceKey};
use overview::{
    InMemorySecretsApi, OverviewService, OverviewServiceParams, WorkspaceFixture,
    create_overview_change_channel,
};
use shared::error::CommonError;
use tracing::{info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 100;

/// Where the workspace comes from and how its secrets are sealed
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// JSON fixture describing environments, secrets and folders
    #[arg(long, env = "OVERVIEW_FIXTURE")]
    pub fixture: PathBuf,

    /// Path the overview opens at
    #[arg(long, env = "OVERVIEW_SECRET_PATH", default_value = "/")]
    pub secret_path: String,

    /// Base64 encoded 32 byte workspace key
    #[arg(long, env = "OVERVIEW_WORKSPACE_KEY", hide_env_values = true)]
    pub workspace_key: Option<String>,
}

fn resolve_workspace_key(encoded: Option<&str>) -> Result<WorkspaceKey, CommonError> {
    match encoded {
        Some(encoded) => WorkspaceKey::from_base64(encoded),
        None => {
            warn!("No workspace key configured, generating an ephemeral one");
            Ok(WorkspaceKey::generate())
        }
    }
}

/// Load the fixture into an in-memory secrets API and start an overview over it
pub async fn load_overview(args: &WorkspaceArgs) -> Result<Arc<OverviewService>, CommonError> {
    let json = tokio::fs::read_to_string(&args.fixture).await?;
    let fixture = WorkspaceFixture::from_json(&json)?;
    let workspace_key = resolve_workspace_key(args.workspace_key.as_deref())?;

    let (encryption_service, _) = crypto_services_for(&workspace_key);
    let secrets_api = InMemorySecretsApi::from_fixture(&fixture, &encryption_service).await?;
    let (change_tx, _) = create_overview_change_channel(CHANGE_CHANNEL_CAPACITY);

    info!(
        fixture = %args.fixture.display(),
        workspace_id = %fixture.workspace_id,
        environments = fixture.environments.len(),
        "Workspace loaded"
    );

    let service = Arc::new(OverviewService::new(OverviewServiceParams {
        workspace_id: fixture.workspace_id,
        environments: fixture.environments,
        workspace_key: Some(workspace_key),
        secret_path: args.secret_path.clone(),
        secrets_api: Arc::new(secrets_api),
        change_tx,
    }));
    service.refresh().await;
    Ok(service)
}

pub fn cmd_openapi() -> Result<(), CommonError> {
    let spec = overview::router::get_openapi_spec();
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
