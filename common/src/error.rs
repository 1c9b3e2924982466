//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Rectangle too small: {width:.1}x{height:.1} (minimum {min}x{min})")]
    InvalidManualRect { width: f32, height: f32, min: f32 },

    #[error("A reason is required to delete AI anomaly {0}")]
    DeletionReasonRequired(String),

    #[error("Unknown anomaly: {0}")]
    UnknownAnomaly(String),

    #[error("Classification of AI anomaly {0} is read-only")]
    ClassificationLocked(String),

    #[error("Threshold must be within [0, 1]: {0}")]
    InvalidThreshold(f32),

    #[error("Analysis already running for inspection {0}")]
    AnalysisInFlight(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Thermal image must be uploaded first")]
    UploadRequired,

    #[error("Review cannot be completed before AI analysis has completed")]
    ReviewNotReady,
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
