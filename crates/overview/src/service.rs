//! Service layer for the overview crate
//! Owns the view of one workspace: the current path, its aggregate and the tasks filling it

use std::sync::Arc;

use dashmap::DashSet;
use encryption::logic::crypto_services::{EncryptionService, crypto_services_for};
use encryption::logic::workspace_key::WorkspaceKey;
use serde::Serialize;
use shared::error::CommonError;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::logic::aggregate::AggregateState;
use crate::logic::environment::{Environment, participating_environments};
use crate::logic::event::{OverviewChangeEvt, OverviewChangeRx, OverviewChangeTx};
use crate::logic::fetch::{FetchContext, OverviewView, spawn_fetches};
use crate::logic::folder::{join_path, normalize_path};
use crate::logic::matrix::{OverviewMatrix, matrix};
use crate::logic::mutation::{
    MutationError, SecretMutation, apply_to_aggregate, prepare_write, validate,
};
use crate::repository::SecretsApiLike;

/// Where the single-environment view should open for one column of the overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExploreTarget {
    pub environment: String,
    pub secret_path: String,
    /// Id of the folder currently shown, absent at the root
    pub folder_id: Option<String>,
}

/// Parameters for creating an OverviewService
pub struct OverviewServiceParams {
    pub workspace_id: String,
    pub environments: Vec<Environment>,
    pub workspace_key: Option<WorkspaceKey>,
    pub secret_path: String,
    pub secrets_api: Arc<dyn SecretsApiLike>,
    pub change_tx: OverviewChangeTx,
}

/// Main service struct for the overview
pub struct OverviewService {
    workspace_id: String,
    encryption_service: Option<EncryptionService>,
    fetch_ctx: FetchContext,
    in_flight: DashSet<(String, String, String)>,
}

/// Releases an in-flight (environment, path, key) slot when the mutation ends
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<(String, String, String)>,
    slot: (String, String, String),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.slot);
    }
}

impl OverviewService {
    /// Create the service with every environment pending. Nothing is fetched until [`Self::refresh`].
    pub fn new(params: OverviewServiceParams) -> Self {
        let environments = participating_environments(params.environments);
        let aggregate = AggregateState::new(
            params.workspace_id.clone(),
            normalize_path(&params.secret_path),
            environments,
        );
        let encryption_service = params
            .workspace_key
            .as_ref()
            .map(|key| crypto_services_for(key).0);
        let (revision, _) = watch::channel(0);

        Self {
            workspace_id: params.workspace_id,
            encryption_service,
            fetch_ctx: FetchContext {
                secrets_api: params.secrets_api,
                view: Arc::new(RwLock::new(OverviewView::new(aggregate))),
                workspace_key: params.workspace_key,
                change_tx: params.change_tx,
                revision: Arc::new(revision),
            },
            in_flight: DashSet::new(),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn subscribe(&self) -> OverviewChangeRx {
        self.fetch_ctx.change_tx.subscribe()
    }

    pub async fn secret_path(&self) -> String {
        self.fetch_ctx.view.read().await.aggregate.secret_path().to_string()
    }

    pub async fn environments(&self) -> Vec<Environment> {
        self.fetch_ctx
            .view
            .read()
            .await
            .aggregate
            .environments()
            .cloned()
            .collect()
    }

    /// Re-fetch every environment at the current path
    pub async fn refresh(&self) -> u64 {
        let secret_path = self.secret_path().await;
        let environments = self.environments().await;
        self.rebuild(secret_path, environments).await
    }

    /// Jump to `secret_path`, discarding whatever is still loading for the old path
    pub async fn navigate_to(&self, secret_path: &str) -> u64 {
        let environments = self.environments().await;
        self.rebuild(normalize_path(secret_path), environments).await
    }

    /// Descend into `folder_name` below the current path
    pub async fn navigate_into(&self, folder_name: &str) -> Result<u64, CommonError> {
        let folder_name = folder_name.trim();
        if folder_name.is_empty() || folder_name.contains('/') {
            return Err(CommonError::InvalidRequest {
                msg: format!("'{folder_name}' is not a folder name"),
                source: None,
            });
        }
        let secret_path = join_path(&self.secret_path().await, folder_name);
        let environments = self.environments().await;
        Ok(self.rebuild(secret_path, environments).await)
    }

    /// Replace the compared environments. Read-denied ones are left out; keys on screen keep their order.
    pub async fn set_environments(&self, environments: Vec<Environment>) -> u64 {
        let secret_path = self.secret_path().await;
        self.rebuild(secret_path, participating_environments(environments))
            .await
    }

    async fn rebuild(&self, secret_path: String, environments: Vec<Environment>) -> u64 {
        let mut view = self.fetch_ctx.view.write().await;
        let aggregate =
            AggregateState::new(self.workspace_id.clone(), secret_path.clone(), environments.clone())
                .with_order_of(&view.aggregate);
        let (epoch, cancel) = view.advance(aggregate);
        drop(view);

        info!(
            workspace_id = %self.workspace_id,
            secret_path = %secret_path,
            environments = environments.len(),
            epoch,
            "Rebuilding overview"
        );
        self.fetch_ctx.bump_revision();
        let _ = self.fetch_ctx.change_tx.send(OverviewChangeEvt::Rebuilt {
            epoch,
            secret_path: secret_path.clone(),
        });

        spawn_fetches(
            &self.fetch_ctx,
            epoch,
            &cancel,
            &self.workspace_id,
            &secret_path,
            &environments,
        );
        epoch
    }

    pub async fn matrix(&self, filter: &str) -> OverviewMatrix {
        matrix(&self.fetch_ctx.view.read().await.aggregate, filter)
    }

    /// Wait until `predicate` holds for the current aggregate
    pub async fn wait_for<F>(&self, mut predicate: F)
    where
        F: FnMut(&AggregateState) -> bool,
    {
        let mut revision = self.fetch_ctx.revision.subscribe();
        loop {
            if predicate(&self.fetch_ctx.view.read().await.aggregate) {
                return;
            }
            if revision.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until no environment of the current view is pending
    pub async fn wait_until_loaded(&self) -> OverviewMatrix {
        self.wait_for(|aggregate| !aggregate.is_loading()).await;
        self.matrix("").await
    }

    pub async fn explore_target(&self, environment: &str) -> Result<ExploreTarget, CommonError> {
        let view = self.fetch_ctx.view.read().await;
        let aggregate = &view.aggregate;
        if aggregate.environment_index(environment).is_none() {
            return Err(CommonError::NotFound {
                msg: format!("environment '{environment}' is not part of the overview"),
                lookup_id: environment.to_string(),
                source: None,
            });
        }
        Ok(ExploreTarget {
            environment: environment.to_string(),
            secret_path: aggregate.secret_path().to_string(),
            folder_id: aggregate.current_dir_id(environment).map(str::to_string),
        })
    }

    /// Apply `mutation` to one environment at the current path.
    ///
    /// The aggregate is patched only after the write succeeded, and only if the
    /// view is still the one the mutation was issued against.
    pub async fn mutate(
        &self,
        environment: &str,
        mutation: SecretMutation,
    ) -> Result<(), MutationError> {
        validate(&mutation)?;
        let Some(encryption_service) = self.encryption_service.as_ref() else {
            return Err(MutationError::KeyUnavailable);
        };

        let (epoch, secret_path, current) = {
            let view = self.fetch_ctx.view.read().await;
            let resolved = view
                .aggregate
                .secrets_status(environment)
                .is_some_and(|status| status.is_resolved());
            if !resolved {
                return Err(MutationError::EnvironmentUnavailable(environment.to_string()));
            }
            (
                view.epoch,
                view.aggregate.secret_path().to_string(),
                view.aggregate.secret(environment, mutation.key()).cloned(),
            )
        };

        let slot = (
            environment.to_string(),
            secret_path.clone(),
            mutation.key().to_string(),
        );
        if !self.in_flight.insert(slot.clone()) {
            return Err(MutationError::InFlight {
                environment: environment.to_string(),
                key: mutation.key().to_string(),
            });
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            slot,
        };

        let write = prepare_write(
            &self.workspace_id,
            environment,
            &secret_path,
            &mutation,
            current.as_ref(),
            Some(encryption_service),
        )?;
        debug!(kind = %write.kind, environment = %environment, key = %write.key, "Writing secret");

        if let Err(e) = self.fetch_ctx.secrets_api.write_secret(&write).await {
            let reason = e.detail();
            warn!(
                kind = %write.kind,
                environment = %environment,
                key = %write.key,
                error = ?e,
                "Secret write failed"
            );
            let _ = self
                .fetch_ctx
                .change_tx
                .send(OverviewChangeEvt::MutationFailed {
                    environment: environment.to_string(),
                    key: write.key.clone(),
                    kind: write.kind,
                    reason: reason.clone(),
                });
            return Err(MutationError::Failed {
                environment: environment.to_string(),
                key: write.key,
                kind: write.kind,
                reason,
            });
        }

        let mut view = self.fetch_ctx.view.write().await;
        // a same-path rebuild may have fetched before the write landed
        let patchable = view.epoch == epoch
            || (view.aggregate.secret_path() == secret_path
                && view
                    .aggregate
                    .secrets_status(environment)
                    .is_some_and(|status| status.is_resolved()));
        if !patchable {
            debug!(
                epoch,
                current_epoch = view.epoch,
                environment = %environment,
                key = %write.key,
                "View moved on, not patching written secret"
            );
            return Ok(());
        }
        let evt = apply_to_aggregate(&mut view.aggregate, environment, &mutation);
        drop(view);

        info!(kind = %write.kind, environment = %environment, key = %write.key, "Secret written");
        self.fetch_ctx.bump_revision();
        let _ = self.fetch_ctx.change_tx.send(evt);
        Ok(())
    }
}
