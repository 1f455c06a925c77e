use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    routing::post,
};
use http_body_util::LengthLimitError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::model::{FeatureRecord, Prediction, Predictor};
use crate::web::{AppState, error::AppError, models::PredictionResponse};

/// Largest request body `/predict` will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn predict_router() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict_handler))
}

/// `POST /predict`: one JSON object in, one prediction out.
///
/// The availability check runs before the body is read, so an unloaded model
/// answers every request the same way whatever its size.
async fn predict_handler(
    State(app_state): State<Arc<AppState>>,
    body: Body,
) -> Result<Json<PredictionResponse>, AppError> {
    let Some(predictor) = app_state.model.predictor() else {
        warn!("Rejected prediction request: model is not loaded.");
        return Err(AppError::ModelNotLoaded);
    };

    let body = read_body(body).await.inspect_err(|e| {
        warn!(error = %e, "Failed to read prediction request body.");
    })?;

    let record = FeatureRecord::from_json_slice(&body).inspect_err(|e| {
        debug!(error = %e, body_len = body.len(), "Rejected malformed prediction request.");
    })?;

    let prediction = run_inference(predictor, record, app_state.config.predict_timeout())
        .await
        .inspect_err(|e| match e {
            AppError::Inference(err) if err.is_input_error() => {
                warn!(error = %err, "Prediction rejected the input record.");
            }
            other => error!(error = %other, "Prediction failed."),
        })?;

    debug!(%prediction, "Prediction served.");
    Ok(Json(PredictionResponse { prediction }))
}

async fn read_body(body: Body) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                AppError::PayloadTooLarge(MAX_BODY_BYTES)
            } else {
                AppError::BodyRead(inner.to_string())
            }
        })
}

/// Runs one inference off the async workers, optionally bounded by `timeout`.
///
/// On timeout the response is returned immediately; the blocking call is left
/// to finish on its own since it holds no shared mutable state.
pub async fn run_inference(
    predictor: Arc<dyn Predictor>,
    record: FeatureRecord,
    timeout: Option<Duration>,
) -> Result<Prediction, AppError> {
    let task = tokio::task::spawn_blocking(move || predictor.predict(&record));
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| AppError::Timeout(limit))?,
        None => task.await,
    };
    let outcome = joined
        .map_err(|e| AppError::InternalServerError(format!("inference task failed: {e}")))?;
    Ok(outcome?)
}
