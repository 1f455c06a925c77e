use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring the model artifact into memory at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read model artifact at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// Failure of a single inference call.
///
/// Variants other than [`InferenceError::Internal`] and
/// [`InferenceError::ModelUnavailable`] mean the caller sent a record the model
/// cannot consume.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Missing feature: '{0}'")]
    MissingFeature(String),
    #[error("Unexpected feature: '{0}'")]
    UnexpectedFeature(String),
    #[error("Feature '{feature}' must be {expected}")]
    TypeMismatch {
        feature: String,
        expected: &'static str,
    },
    #[error("Feature '{feature}' has an invalid value: {reason}")]
    InvalidValue { feature: String, reason: String },
    #[error("Feature '{feature}' has unknown category '{value}'")]
    UnknownCategory { feature: String, value: String },
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("Model failure: {0}")]
    Internal(String),
}

impl InferenceError {
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            InferenceError::Internal(_) | InferenceError::ModelUnavailable
        )
    }
}
