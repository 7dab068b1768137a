use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::gate::{Envelope, TokenError};

/// Errors a route can answer with. Chat routes use the plain
/// `{error, details?}` shape; auth failures use the `{success:false, ...}`
/// envelope the token endpoint speaks.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request: {details}")]
    BadRequest { details: String },

    #[error("endpoint not found")]
    NotFound,

    #[error("invalid or missing API key")]
    InvalidApiKey,

    #[error(transparent)]
    Unauthorized(#[from] TokenError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest { details } => {
                warn!(%details, "Rejected malformed request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody {
                        error: "Error processing request".to_string(),
                        details: Some(details),
                    }),
                )
                    .into_response()
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: "Endpoint not found".to_string(),
                    details: None,
                }),
            )
                .into_response(),
            AppError::InvalidApiKey => {
                warn!("Token requested with a bad API key");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(Envelope::<()>::failure("Invalid or missing API key")),
                )
                    .into_response()
            }
            AppError::Unauthorized(reason) => {
                warn!(%reason, "Rejected chat request");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(Envelope::<()>::failure(reason.to_string())),
                )
                    .into_response()
            }
        }
    }
}
