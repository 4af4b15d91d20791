//! Router layer for the overview crate

pub mod overview;

use std::sync::Arc;
use utoipa::openapi::OpenApi as OpenApiDoc;
use utoipa_axum::router::OpenApiRouter;

use crate::service::OverviewService;

/// Create the combined overview router
pub fn create_router() -> OpenApiRouter<Arc<OverviewService>> {
    OpenApiRouter::new().merge(overview::create_router())
}

/// Get the OpenAPI spec for the overview crate
pub fn get_openapi_spec() -> OpenApiDoc {
    let (_, spec) = create_router().split_for_parts();
    spec
}
