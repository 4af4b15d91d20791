use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Args;
use overview::{OverviewChangeEvt, OverviewService};
use shared::error::CommonError;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::{WorkspaceArgs, load_overview};

#[derive(Args, Debug, Clone)]
pub struct ServeParams {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[arg(long, env = "OVERVIEW_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "OVERVIEW_PORT", default_value = "3000")]
    pub port: u16,
}

pub fn build_router(service: Arc<OverviewService>) -> Router {
    let (router, _) = overview::create_router().split_for_parts();
    router.with_state(service)
}

/// Log overview changes until the channel closes
async fn log_changes(service: Arc<OverviewService>) {
    let mut change_rx = service.subscribe();
    loop {
        match change_rx.recv().await {
            Ok(OverviewChangeEvt::Rebuilt { epoch, secret_path }) => {
                debug!(epoch, secret_path = %secret_path, "Overview rebuilt");
            }
            Ok(OverviewChangeEvt::EnvironmentResolved {
                epoch,
                environment,
                kind,
                failed,
            }) => {
                debug!(epoch, environment = %environment, kind = %kind, failed, "Environment resolved");
            }
            Ok(OverviewChangeEvt::SecretCreated(record)) => {
                info!(environment = %record.environment, key = %record.key, "Secret created");
            }
            Ok(OverviewChangeEvt::SecretUpdated(record)) => {
                info!(environment = %record.environment, key = %record.key, "Secret updated");
            }
            Ok(OverviewChangeEvt::SecretDeleted {
                environment, key, ..
            }) => {
                info!(environment = %environment, key = %key, "Secret deleted");
            }
            Ok(OverviewChangeEvt::MutationFailed {
                environment,
                key,
                kind,
                reason,
            }) => {
                warn!(environment = %environment, key = %key, kind = %kind, reason = %reason, "Mutation failed");
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Change log lagged behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub async fn cmd_serve(params: ServeParams) -> Result<(), CommonError> {
    let service = load_overview(&params.workspace).await?;
    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .map_err(|e| CommonError::AddrParseError { source: e })?;

    let change_log = tokio::spawn(log_changes(service.clone()));
    let router = build_router(service);

    let listener = TcpListener::bind(addr).await?;
    info!("Starting server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = ?e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down server, waiting for in-flight requests to complete...");
        })
        .await?;

    change_log.abort();
    info!("Server stopped");
    Ok(())
}
