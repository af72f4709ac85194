use aquastat_algo::{AnalysisError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL: u16 = 500;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// 请求处理错误（状态码 + 错误码 + 描述）
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    status: u16,
    code: String,
    message: String,
    suggestion: Option<&'static str>,
    is_operational: bool,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(STATUS_BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(STATUS_BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_INTERNAL,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            suggestion: None,
            is_operational: false,
        }
    }

    fn operational(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            suggestion: None,
            is_operational: true,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_response(self) -> ErrorResponse {
        let error = if self.is_operational {
            self.message
        } else {
            "internal error".to_string()
        };
        ErrorResponse {
            success: false,
            error,
            code: self.code,
            status: self.status,
            suggestion: self.suggestion.map(str::to_string),
        }
    }
}

/// 输入与数据问题 400，数值退化 422
pub fn status_for_kind(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::InsufficientData => STATUS_BAD_REQUEST,
        ErrorKind::SingularMatrix | ErrorKind::DegenerateTarget => STATUS_UNPROCESSABLE,
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for_kind(kind),
            code: kind.as_str().to_string(),
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
            is_operational: true,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::operational(STATUS_BAD_REQUEST, "INVALID_JSON", err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!(error = %err, "failed to read request");
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_mapping() {
        let response = AppError::from(AnalysisError::SingularMatrix { pivot: 1 }).into_response();
        assert_eq!(response.status, 422);
        assert_eq!(response.code, "SINGULAR_MATRIX");
        assert!(response.suggestion.is_some());
        assert!(!response.success);

        let response = AppError::from(AnalysisError::insufficient("fit", 10, 3)).into_response();
        assert_eq!(response.status, 400);
        assert_eq!(response.code, "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_transform_domain_reports_insufficient_data() {
        let err = AnalysisError::TransformDomain {
            constraint: "exponential fit requires target > 0".to_string(),
            remaining: 2,
            required: 3,
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.code, "INSUFFICIENT_DATA");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_internal_error_hides_message() {
        let response = AppError::internal("disk on fire").into_response();
        assert_eq!(response.status, 500);
        assert_eq!(response.error, "internal error");
    }

    #[test]
    fn test_error_response_omits_missing_suggestion() {
        let json = serde_json::to_value(AppError::validation("bad").into_response()).unwrap();
        assert!(json.get("suggestion").is_none());
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}
