//! Error type shared by every handler.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use peerassist_types::api::ErrorResponse;
use peerassist_types::models::WorkType;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid work type")]
    InvalidWorkType,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    InvalidState(String),

    /// The store missed its deadline. The operation was not cancelled and
    /// may still have been applied.
    #[error("store did not respond in time; the outcome of the request is unknown")]
    Unavailable,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors.field_errors();
        if fields.contains_key("work_type") {
            return Self::InvalidWorkType;
        }

        let mut messages: Vec<String> = fields
            .iter()
            .flat_map(|(field, issues)| {
                issues.iter().map(move |issue| match &issue.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        messages.dedup();

        Self::Validation(messages.join("; "))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidWorkType
            | Self::InvalidState(_)
            | Self::Json(_)
            | Self::Path(_)
            | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::Internal(err) => {
                error!(error = ?err, "request failed with 500");
                ErrorResponse {
                    error: self.to_string(),
                    valid_types: None,
                }
            }
            Self::InvalidWorkType => ErrorResponse {
                error: self.to_string(),
                valid_types: Some(WorkType::names().into_iter().map(String::from).collect()),
            },
            Self::Json(rejection) => ErrorResponse {
                error: rejection.body_text(),
                valid_types: None,
            },
            Self::Path(rejection) => ErrorResponse {
                error: rejection.body_text(),
                valid_types: None,
            },
            Self::Query(rejection) => ErrorResponse {
                error: rejection.body_text(),
                valid_types: None,
            },
            _ => ErrorResponse {
                error: self.to_string(),
                valid_types: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
