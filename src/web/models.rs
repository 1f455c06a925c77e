use serde::Serialize;

use crate::model::Prediction;

#[derive(Serialize, Debug)]
pub struct PredictionResponse {
    pub prediction: Prediction,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: &'static str,
    pub version: &'static str,
}
