use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::PredictorError;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Predictor(PredictorError::UntrainedModel) => StatusCode::CONFLICT,
            ServerError::Predictor(PredictorError::MalformedRecord { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Predictor(_) | ServerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ServerError::from(PredictorError::UntrainedModel).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(PredictorError::malformed("Age", "missing")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServerError::from(PredictorError::Training("diverged".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
