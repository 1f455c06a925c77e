//! The loaded model and everything needed to feed it a request.

pub mod error;
pub mod estimator;
pub mod pipeline;
pub mod record;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub use error::{InferenceError, LoadError};
pub use estimator::Prediction;
pub use pipeline::Pipeline;
pub use record::{FeatureRecord, FeatureValue, MalformedRequest};

/// Inference contract of a loaded model.
///
/// Implementations are shared across request tasks without locking, so
/// `predict` must only read `self`.
pub trait Predictor: Send + Sync {
    /// Input columns in the order the model consumes them.
    fn feature_names(&self) -> &[String];

    fn predict(&self, record: &FeatureRecord) -> Result<Prediction, InferenceError>;
}

/// Reads and validates a pipeline artifact.
pub fn load_pipeline(path: &Path) -> Result<Pipeline, LoadError> {
    let contents = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pipeline: Pipeline =
        serde_json::from_slice(&contents).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    pipeline.validated()
}

/// Process-wide handle to the model, built once at startup.
///
/// A handle that failed to load stays unavailable for the life of the process.
#[derive(Clone)]
pub enum ModelHandle {
    Ready(Arc<dyn Predictor>),
    Unavailable { reason: String },
}

impl ModelHandle {
    /// Attempts to load the artifact exactly once. Failure is logged and
    /// produces an unavailable handle rather than an error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match load_pipeline(path) {
            Ok(pipeline) => {
                info!(
                    path = %path.display(),
                    features = ?pipeline.feature_names(),
                    "Model loaded."
                );
                Self::Ready(Arc::new(pipeline))
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load model. Predictions are disabled until restart.");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn from_predictor(predictor: impl Predictor + 'static) -> Self {
        Self::Ready(Arc::new(predictor))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    pub fn predictor(&self) -> Option<Arc<dyn Predictor>> {
        match self {
            Self::Ready(p) => Some(Arc::clone(p)),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn predict(&self, record: &FeatureRecord) -> Result<Prediction, InferenceError> {
        match self {
            Self::Ready(p) => p.predict(record),
            Self::Unavailable { .. } => Err(InferenceError::ModelUnavailable),
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(p) => f
                .debug_struct("Ready")
                .field("features", &p.feature_names())
                .finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}
