//! Domain error types.

/// Top-level error type for pipsentry.
#[derive(Debug, thiserror::Error)]
pub enum PipsentryError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("data contract violation: {reason}")]
    DataContract { reason: String },

    #[error("insufficient data for {pair} {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        pair: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid action {value}: expected 0 (hold), 1 (buy) or 2 (sell)")]
    InvalidAction { value: i64 },

    #[error("step called before reset")]
    EpisodeNotStarted,

    #[error("step called after episode terminated at step {step}")]
    EpisodeFinished { step: usize },

    #[error("model not found: {path}")]
    ModelNotFound { path: String },

    #[error("invalid model file {path}: {reason}")]
    ModelFormat { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipsentryError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PipsentryError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&PipsentryError> for std::process::ExitCode {
    fn from(err: &PipsentryError) -> Self {
        let code: u8 = match err {
            PipsentryError::Io(_) => 1,
            PipsentryError::ConfigParse { .. }
            | PipsentryError::ConfigMissing { .. }
            | PipsentryError::ConfigInvalid { .. } => 2,
            PipsentryError::DataSource { .. }
            | PipsentryError::DataContract { .. }
            | PipsentryError::InsufficientData { .. } => 3,
            PipsentryError::InvalidAction { .. }
            | PipsentryError::EpisodeNotStarted
            | PipsentryError::EpisodeFinished { .. } => 4,
            PipsentryError::ModelNotFound { .. } | PipsentryError::ModelFormat { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
