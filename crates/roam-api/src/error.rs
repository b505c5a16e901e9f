use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roam_core::CoreError;
use tracing::error;

/// HTTP wrapper around the workflow error taxonomy. Each kind has a stable
/// status code; storage failures are logged and surfaced as a bare 500.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Authorization(_) => StatusCode::FORBIDDEN,
            CoreError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Storage(err) => {
                error!("storage error: {:#}", err);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        (status, self.0.to_string()).into_response()
    }
}

/// Blocking work runs on the spawn_blocking pool; a join error means the
/// task panicked or was cancelled, never a business failure.
pub fn join_error(err: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", err);
    ApiError(CoreError::Storage(anyhow::anyhow!("blocking task failed: {err}")))
}
