use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("model not trained yet")]
    UntrainedModel,

    #[error("malformed record: {field} ({reason})")]
    MalformedRecord { field: String, reason: String },

    #[error("data generation failed: {0}")]
    Generation(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("model store lock poisoned")]
    LockPoisoned,
}

impl PredictorError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictorError::MalformedRecord {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PredictorError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        PredictorError::LockPoisoned
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
