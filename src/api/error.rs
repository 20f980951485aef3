use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::catalog::SubscriptionErrorKind;
use crate::player::PlayerError;
use crate::remote::StoreError;
use crate::services::CatalogError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError {
        field: Option<&'static str>,
        message: String,
    },

    Conflict(String),

    Unauthorized(String),

    Forbidden(String),

    /// The catalog subscription is in its failed state.
    CatalogUnavailable {
        kind: SubscriptionErrorKind,
        message: String,
    },

    StoreUnavailable(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError {
                field: Some(field),
                message,
            } => write!(f, "Validation error on {field}: {message}"),
            Self::ValidationError { message, .. } => write!(f, "Validation error: {message}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::CatalogUnavailable { kind, message } => {
                write!(f, "Catalog unavailable ({kind:?}): {message}")
            }
            Self::StoreUnavailable(msg) => write!(f, "Store unavailable: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, field) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            Self::ValidationError { field, message } => {
                (StatusCode::BAD_REQUEST, message.clone(), *field)
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), None),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            Self::Forbidden(msg) => {
                tracing::warn!("Store rejected request: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone(), None)
            }
            Self::CatalogUnavailable { kind, message } => {
                tracing::warn!(?kind, "Serving catalog error: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    kind.user_message().to_string(),
                    None,
                )
            }
            Self::StoreUnavailable(msg) => {
                tracing::warn!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "The catalog service is unavailable".to_string(),
                    None,
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = ApiResponse::<()>::error(error_message);
        body.field = field.map(str::to_string);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => Self::Forbidden(msg),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::NotFound { collection, id } => {
                Self::NotFound(format!("{collection} document {id} not found"))
            }
            StoreError::Conflict { id, .. } => {
                Self::Conflict(format!("{id} was modified concurrently"))
            }
            StoreError::Serialization(msg) | StoreError::Backend(msg) => Self::InternalError(msg),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(_)
            | CatalogError::DuplicateSeason { .. }
            | CatalogError::DuplicateEpisode { .. } => Self::ValidationError {
                field: err.field(),
                message: err.to_string(),
            },
            CatalogError::TitleNotFound(_)
            | CatalogError::SeasonNotFound(_)
            | CatalogError::EpisodeNotFound(_)
            | CatalogError::MovieNotFound(_) => Self::NotFound(err.to_string()),
            CatalogError::Conflict { .. } => Self::Conflict(err.to_string()),
            CatalogError::CreateFailed(e)
            | CatalogError::ReadFailed(e)
            | CatalogError::UpdateFailed(e)
            | CatalogError::DeleteFailed(e) => Self::from(e),
        }
    }
}

impl From<PlayerError> for ApiError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::Unavailable(_) => Self::validation_field("source", err.to_string()),
            PlayerError::InvalidTemplate { .. } | PlayerError::InvalidUrl { .. } => {
                Self::InternalError(err.to_string())
            }
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation_field(field: &'static str, msg: impl Into<String>) -> Self {
        Self::ValidationError {
            field: Some(field),
            message: msg.into(),
        }
    }
}
