//! Per-environment fan-out of the read path.
//!
//! Every (environment, fetch kind) runs in its own task. A task carries the epoch of
//! the view it was started for and only lands its result if that view is still current.

use std::sync::Arc;

use encryption::logic::workspace_key::WorkspaceKey;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::aggregate::{AggregateState, FetchKind, FetchResult};
use super::decrypt::{DecryptionError, decrypt_all};
use super::environment::Environment;
use super::event::{OverviewChangeEvt, OverviewChangeTx};
use super::folder::FolderListing;
use super::secret::SecretSlot;
use crate::repository::SecretsApiLike;

/// The aggregate currently on screen and the epoch it belongs to
#[derive(Debug)]
pub struct OverviewView {
    pub epoch: u64,
    pub cancel: CancellationToken,
    pub aggregate: AggregateState,
}

impl OverviewView {
    pub fn new(aggregate: AggregateState) -> Self {
        Self {
            epoch: 0,
            cancel: CancellationToken::new(),
            aggregate,
        }
    }

    /// Swap in a fresh aggregate under a new epoch, cancelling the old epoch's tasks
    pub fn advance(&mut self, aggregate: AggregateState) -> (u64, CancellationToken) {
        self.cancel.cancel();
        self.epoch += 1;
        self.cancel = CancellationToken::new();
        self.aggregate = aggregate;
        (self.epoch, self.cancel.clone())
    }
}

/// Everything a fetch task needs, cheap to clone into each task
#[derive(Clone)]
pub struct FetchContext {
    pub secrets_api: Arc<dyn SecretsApiLike>,
    pub view: Arc<RwLock<OverviewView>>,
    pub workspace_key: Option<WorkspaceKey>,
    pub change_tx: OverviewChangeTx,
    /// Bumped whenever the view changes
    pub revision: Arc<watch::Sender<u64>>,
}

impl FetchContext {
    pub fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// Start both fetches of every environment for `secret_path` under `epoch`
pub fn spawn_fetches(
    ctx: &FetchContext,
    epoch: u64,
    cancel: &CancellationToken,
    workspace_id: &str,
    secret_path: &str,
    environments: &[Environment],
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(environments.len() * 2);
    for env in environments {
        for kind in [FetchKind::Secrets, FetchKind::Folders] {
            let task = FetchTask {
                ctx: ctx.clone(),
                epoch,
                cancel: cancel.child_token(),
                workspace_id: workspace_id.to_string(),
                secret_path: secret_path.to_string(),
                environment: env.slug.clone(),
                kind,
            };
            handles.push(tokio::spawn(task.run()));
        }
    }
    debug!(epoch, secret_path = %secret_path, tasks = handles.len(), "Spawned environment fetches");
    handles
}

struct FetchTask {
    ctx: FetchContext,
    epoch: u64,
    cancel: CancellationToken,
    workspace_id: String,
    secret_path: String,
    environment: String,
    kind: FetchKind,
}

enum Landed {
    Secrets {
        result: FetchResult<Vec<SecretSlot>>,
        key_unavailable: bool,
    },
    Folders(FetchResult<FolderListing>),
}

impl FetchTask {
    async fn run(self) {
        trace!(epoch = self.epoch, environment = %self.environment, kind = %self.kind, "Fetch started");

        let landed = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(
                    epoch = self.epoch,
                    environment = %self.environment,
                    kind = %self.kind,
                    "Fetch cancelled"
                );
                return;
            }
            landed = self.fetch() => landed,
        };

        self.land(landed).await;
    }

    async fn fetch(&self) -> Landed {
        let api = &self.ctx.secrets_api;
        match self.kind {
            FetchKind::Secrets => {
                let fetched = api
                    .fetch_secrets(&self.workspace_id, &self.environment, &self.secret_path)
                    .await;
                match fetched {
                    Ok(raw) => match decrypt_all(raw, self.ctx.workspace_key.as_ref()) {
                        Ok(slots) => Landed::Secrets {
                            result: FetchResult::Ok(slots),
                            key_unavailable: false,
                        },
                        Err(DecryptionError::KeyUnavailable) => Landed::Secrets {
                            result: FetchResult::Ok(Vec::new()),
                            key_unavailable: true,
                        },
                    },
                    Err(e) => Landed::Secrets {
                        result: FetchResult::Error(e.detail()),
                        key_unavailable: false,
                    },
                }
            }
            FetchKind::Folders => {
                let fetched = api
                    .fetch_folders(&self.workspace_id, &self.environment, &self.secret_path)
                    .await;
                Landed::Folders(match fetched {
                    Ok(listing) => FetchResult::Ok(listing),
                    Err(e) => FetchResult::Error(e.detail()),
                })
            }
        }
    }

    async fn land(self, landed: Landed) {
        let mut view = self.ctx.view.write().await;
        if view.epoch != self.epoch || self.cancel.is_cancelled() {
            debug!(
                epoch = self.epoch,
                current_epoch = view.epoch,
                environment = %self.environment,
                kind = %self.kind,
                "Discarding stale fetch result"
            );
            return;
        }

        let failed = match landed {
            Landed::Secrets {
                result,
                key_unavailable,
            } => {
                if key_unavailable {
                    view.aggregate.mark_key_unavailable();
                }
                let failed = matches!(result, FetchResult::Error(_));
                view.aggregate.resolve_secrets(&self.environment, result);
                failed
            }
            Landed::Folders(result) => {
                let failed = matches!(result, FetchResult::Error(_));
                view.aggregate.resolve_folders(&self.environment, result);
                failed
            }
        };
        let loading = view.aggregate.is_loading();
        drop(view);

        debug!(
            epoch = self.epoch,
            environment = %self.environment,
            kind = %self.kind,
            failed,
            loading,
            "Environment fetch resolved"
        );
        self.ctx.bump_revision();
        let _ = self.ctx.change_tx.send(OverviewChangeEvt::EnvironmentResolved {
            epoch: self.epoch,
            environment: self.environment,
            kind: self.kind,
            failed,
        });
    }
}
