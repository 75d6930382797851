use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{service} returned {status}: {body}")]
    UpstreamError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Authentication error: {message}")]
    AuthError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Upstream,
    System,
}

impl ServerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServerError::ConfigError { .. }
            | ServerError::InvalidConfigValueError { .. }
            | ServerError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ServerError::ValidationError { .. } | ServerError::DecodeError(_) => {
                ErrorCategory::Input
            }
            ServerError::HttpError(_)
            | ServerError::UpstreamError { .. }
            | ServerError::AuthError { .. } => ErrorCategory::Upstream,
            ServerError::IoError(_) | ServerError::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// 進程結束碼：設定錯誤 2，其餘 1
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            _ => 1,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServerError::ValidationError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = ServerError::ConfigError {
            message: "project_id is required".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.exit_code(), 2);

        let err = ServerError::UpstreamError {
            service: "documentai".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert_eq!(err.to_string(), "documentai returned 503: unavailable");
        assert_eq!(err.exit_code(), 1);
    }
}
