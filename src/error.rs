use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid date {value:?}: expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("invalid granularity {value:?}: expected \"week\" or \"month\"")]
    InvalidGranularity { value: String },

    #[error("invalid registration status {value:?}")]
    InvalidStatus { value: String },

    #[error("malformed roster payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
