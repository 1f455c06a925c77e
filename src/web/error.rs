use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::model::{InferenceError, MalformedRequest};

pub const MODEL_NOT_LOADED: &str = "Model not loaded. Please check server logs.";
const PREDICTION_FAILED: &str = "Prediction failed. Please check server logs.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Model not loaded. Please check server logs.")]
    ModelNotLoaded,
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] MalformedRequest),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
    #[error("Prediction timed out after {0:?}")]
    Timeout(Duration),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ModelNotLoaded | AppError::Inference(InferenceError::ModelUnavailable) => {
                (StatusCode::INTERNAL_SERVER_ERROR, MODEL_NOT_LOADED.to_string())
            }
            AppError::InvalidInput(reason) => {
                (StatusCode::BAD_REQUEST, format!("Invalid input: {reason}"))
            }
            AppError::Inference(err) if err.is_input_error() => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            // Model internals stay in the server log.
            AppError::Inference(_) | AppError::InternalServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PREDICTION_FAILED.to_string(),
            ),
            AppError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Invalid input: request body exceeds {limit} bytes"),
            ),
            AppError::BodyRead(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid input: request body could not be read".to_string(),
            ),
            AppError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Prediction timed out after {} ms", limit.as_millis()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}
