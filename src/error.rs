use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::ErrorBody;

/// ApiError
///
/// Every failure a handler can produce, translated once into a status code and a
/// short `{"error": "..."}` body. Backend details are logged where the error is
/// raised and never copied into the response.
///
/// Lookup faults (500) are kept apart from denials (403/404) so clients and
/// monitoring can tell infrastructure trouble from an expected refusal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Missing id")]
    MissingId,
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Subscription check failed")]
    SubscriptionLookupFailed,
    #[error("Forbidden")]
    Forbidden,
    #[error("Resource lookup failed")]
    ResourceLookupFailed,
    #[error("Not found")]
    NotFound,
    /// Premium resource with no private storage path.
    #[error("No file_path for resource")]
    InvalidResourceState,
    #[error("Could not sign URL")]
    SigningFailed,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingId | ApiError::InvalidResourceState | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::SubscriptionLookupFailed
            | ApiError::ResourceLookupFailed
            | ApiError::SigningFailed
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
