//! Analysis Errors
//!
//! Every failure the engine can detect is reported through [`AnalysisError`].
//! The host maps [`ErrorKind`] to its own status codes and user messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 分析失败类型（供宿主映射状态码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    InsufficientData,
    SingularMatrix,
    DegenerateTarget,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::InsufficientData => "INSUFFICIENT_DATA",
            ErrorKind::SingularMatrix => "SINGULAR_MATRIX",
            ErrorKind::DegenerateTarget => "DEGENERATE_TARGET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data for {context}: need at least {required} rows, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("singular matrix: pivot {pivot} is numerically zero")]
    SingularMatrix { pivot: usize },

    #[error("degenerate target: {context} has zero variance")]
    DegenerateTarget { context: String },

    #[error("{constraint}: only {remaining} rows remain, need at least {required}")]
    TransformDomain {
        constraint: String,
        remaining: usize,
        required: usize,
    },
}

impl AnalysisError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AnalysisError::InvalidInput(message.into())
    }

    pub fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        AnalysisError::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }

    /// 错误类别；变换域不足按数据不足上报
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::InsufficientData { .. } | AnalysisError::TransformDomain { .. } => {
                ErrorKind::InsufficientData
            }
            AnalysisError::SingularMatrix { .. } => ErrorKind::SingularMatrix,
            AnalysisError::DegenerateTarget { .. } => ErrorKind::DegenerateTarget,
        }
    }

    /// 针对错误类别的修正建议
    pub fn suggestion(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => {
                "check the selected fields and analysis parameters"
            }
            AnalysisError::InsufficientData { .. } => {
                "widen the date range or choose a coarser filter"
            }
            AnalysisError::TransformDomain { .. } => {
                "select fields with positive values or use a linear or polynomial model"
            }
            AnalysisError::SingularMatrix { .. } => {
                "lower the polynomial degree or remove collinear fields"
            }
            AnalysisError::DegenerateTarget { .. } => {
                "choose a target field that varies over the selected range"
            }
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
