//! Overview HTTP endpoints

use axum::extract::{Json, Path, Query, State};
use serde::{Deserialize, Serialize};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    logic::{
        matrix::OverviewMatrix,
        mutation::{MutationKind, SecretMutation},
    },
    service::{ExploreTarget, OverviewService},
};
use shared::{adapters::openapi::JsonResponse, error::CommonError};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "overview";

#[derive(Debug, Deserialize, IntoParams)]
pub struct MatrixQuery {
    /// Case-insensitive substring matched against secret keys and folder names
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigateRequest {
    /// Jump straight to a path
    Path { path: String },
    /// Descend into a folder of the current path
    Folder { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NavigateResponse {
    pub epoch: u64,
    pub secret_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MutateSecretResponse {
    pub environment: String,
    pub key: String,
    pub kind: MutationKind,
}

/// Create the overview router
pub fn create_router() -> OpenApiRouter<Arc<OverviewService>> {
    OpenApiRouter::new()
        .routes(routes!(route_get_matrix))
        .routes(routes!(route_navigate))
        .routes(routes!(route_mutate_secret))
        .routes(routes!(route_explore_target))
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/matrix", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        MatrixQuery
    ),
    responses(
        (status = 200, description = "Secrets and folders of every environment at the current path", body = OverviewMatrix),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get overview matrix",
    description = "Project the cross-environment matrix, optionally narrowed by a name filter",
    operation_id = "get-overview-matrix",
)]
async fn route_get_matrix(
    State(ctx): State<Arc<OverviewService>>,
    Query(query): Query<MatrixQuery>,
) -> JsonResponse<OverviewMatrix, CommonError> {
    let filter = query.filter.unwrap_or_default();
    trace!(filter = %filter, "Projecting overview matrix");
    let res: Result<OverviewMatrix, CommonError> = Ok(ctx.matrix(&filter).await);
    JsonResponse::from(res)
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/navigate", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = NavigateRequest,
    responses(
        (status = 200, description = "Navigation started, environments are being fetched", body = NavigateResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Navigate overview",
    description = "Move the overview to another path and rebuild it for every environment",
    operation_id = "navigate-overview",
)]
async fn route_navigate(
    State(ctx): State<Arc<OverviewService>>,
    Json(request): Json<NavigateRequest>,
) -> JsonResponse<NavigateResponse, CommonError> {
    trace!(request = ?request, "Navigating overview");
    let res = async {
        let epoch = match &request {
            NavigateRequest::Path { path } => ctx.navigate_to(path).await,
            NavigateRequest::Folder { name } => ctx.navigate_into(name).await?,
        };
        Ok::<_, CommonError>(NavigateResponse {
            epoch,
            secret_path: ctx.secret_path().await,
        })
    }
    .await;
    trace!(success = res.is_ok(), "Navigating overview completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/secret/{{environment}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("environment" = String, Path, description = "Environment slug"),
    ),
    request_body = SecretMutation,
    responses(
        (status = 200, description = "Secret written to the environment", body = MutateSecretResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Mutate secret",
    description = "Create, update or delete one secret in exactly one environment at the current path",
    operation_id = "mutate-overview-secret",
)]
async fn route_mutate_secret(
    State(ctx): State<Arc<OverviewService>>,
    Path(environment): Path<String>,
    Json(mutation): Json<SecretMutation>,
) -> JsonResponse<MutateSecretResponse, CommonError> {
    trace!(environment = %environment, mutation = ?mutation, "Mutating secret");
    let response = MutateSecretResponse {
        environment: environment.clone(),
        key: mutation.key().to_string(),
        kind: mutation.kind(),
    };
    let res = ctx
        .mutate(&environment, mutation)
        .await
        .map(|()| response)
        .map_err(CommonError::from);
    trace!(success = res.is_ok(), "Mutating secret completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/explore/{{environment}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("environment" = String, Path, description = "Environment slug"),
    ),
    responses(
        (status = 200, description = "Where to open the single-environment view", body = ExploreTarget),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Explore environment",
    description = "Resolve the environment, path and folder id of one overview column",
    operation_id = "explore-overview-environment",
)]
async fn route_explore_target(
    State(ctx): State<Arc<OverviewService>>,
    Path(environment): Path<String>,
) -> JsonResponse<ExploreTarget, CommonError> {
    let res = ctx.explore_target(&environment).await;
    JsonResponse::from(res)
}
