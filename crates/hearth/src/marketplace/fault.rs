//! Request-level error taxonomy shared by every marketplace handler.
//!
//! Each handler converts its failures into a `Fault` before the response
//! boundary; nothing propagates uncaught. Internal details are logged
//! server-side and never leak into the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

use super::domain::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid state transition: status is {current}, allowed only from {allowed}")]
    InvalidTransition { current: String, allowed: String },
    #[error("internal error")]
    Internal(String),
}

impl Fault {
    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Fault::Validation(_) | Fault::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Fault::Unauthorized => StatusCode::UNAUTHORIZED,
            Fault::Forbidden(_) => StatusCode::FORBIDDEN,
            Fault::NotFound { .. } => StatusCode::NOT_FOUND,
            Fault::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        if let Fault::Internal(detail) = &self {
            tracing::error!(%detail, "request failed unexpectedly");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<RepositoryError> for Fault {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => Fault::internal("storage conflict"),
            RepositoryError::NotFound => Fault::internal("record missing during update"),
            RepositoryError::Unavailable(detail) => Fault::Internal(detail),
        }
    }
}
