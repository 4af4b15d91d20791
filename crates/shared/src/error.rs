use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::{IntoResponses, PartialSchema, ToSchema};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("could not find resource")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("invalid request")]
    InvalidRequest {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("invalid response")]
    InvalidResponse {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("repository error")]
    Repository {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("tokio channel error")]
    TokioChannelError {
        #[serde(skip)]
        #[source]
        source: DynError,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("serde json error")]
    SerdeSerializationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("var error")]
    VarError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::env::VarError,
    },
}

impl CommonError {
    /// Human readable detail carried by the variant, falling back to the display message
    pub fn detail(&self) -> String {
        match self {
            CommonError::NotFound { msg, .. }
            | CommonError::InvalidRequest { msg, .. }
            | CommonError::InvalidResponse { msg, .. }
            | CommonError::Repository { msg, .. } => msg.clone(),
            CommonError::Unknown(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl<T: Send + Sync + 'static + std::fmt::Debug> From<tokio::sync::broadcast::error::SendError<T>>
    for CommonError
{
    fn from(e: tokio::sync::broadcast::error::SendError<T>) -> Self {
        CommonError::TokioChannelError {
            source: Box::new(e),
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for CommonError {
    fn from(e: tokio::sync::broadcast::error::RecvError) -> Self {
        CommonError::TokioChannelError {
            source: Box::new(e),
        }
    }
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }

    fn schemas(
        _schemas: &mut Vec<(
            String,
            utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
        )>,
    ) {
        // nothing by default
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .property(
                "name",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("name")
            .property(
                "message",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("message")
            .into()
    }
}

impl IntoResponses for CommonError {
    fn responses() -> std::collections::BTreeMap<
        String,
        utoipa::openapi::RefOr<utoipa::openapi::response::Response>,
    > {
        let mut responses = std::collections::BTreeMap::new();

        let error_content = utoipa::openapi::ContentBuilder::new()
            .schema(Some(CommonError::schema()))
            .build();

        responses.insert(
            "404".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Resource not found")
                .content("application/json", error_content.clone())
                .into(),
        );

        responses.insert(
            "400".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Invalid request")
                .content("application/json", error_content.clone())
                .into(),
        );

        responses.insert(
            "500".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Server error")
                .content("application/json", error_content)
                .into(),
        );

        responses
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = match self {
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::InvalidResponse { .. }
            | CommonError::Unknown(_)
            | CommonError::Repository { .. }
            | CommonError::TokioChannelError { .. }
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::VarError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let name = match self {
            CommonError::NotFound { .. } => "NotFound",
            CommonError::InvalidRequest { .. } => "InvalidRequest",
            CommonError::InvalidResponse { .. } => "InvalidResponse",
            CommonError::Repository { .. } => "Repository",
            CommonError::Unknown(_)
            | CommonError::TokioChannelError { .. }
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. }
            | CommonError::VarError { .. } => "InternalServerError",
        };

        let body = Json(ErrorResponse {
            name: name.to_string(),
            message: self.detail(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}
