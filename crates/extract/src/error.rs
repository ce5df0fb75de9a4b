use thiserror::Error;

/// Failures of a single analysis call. None of them is retried.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("không thể kết nối tới máy chủ phân tích: {0}")]
    Network(#[source] reqwest::Error),

    #[error("máy chủ phân tích không phản hồi sau {secs} giây")]
    Timeout { secs: u64 },

    /// Non-2xx response. Displays the server's message and nothing else.
    #[error("{message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid JSON: {body}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("yêu cầu đã bị hủy")]
    Cancelled,

    #[error("cấu hình không hợp lệ: {0}")]
    InvalidConfig(String),
}

impl AnalyzeError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzeError::Network(_) => "network",
            AnalyzeError::Timeout { .. } => "timeout",
            AnalyzeError::HttpStatus { .. } => "status",
            AnalyzeError::Decode { .. } => "decode",
            AnalyzeError::Cancelled => "cancelled",
            AnalyzeError::InvalidConfig(_) => "config",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AnalyzeError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_displays_message_only() {
        let err = AnalyzeError::HttpStatus {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.kind(), "status");
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let err = AnalyzeError::Decode {
            body: "<html>".to_string(),
            source,
        };
        assert_eq!(err.to_string(), "Invalid JSON: <html>");
        assert!(std::error::Error::source(&err).is_some());
    }
}
