use thiserror::Error;

/// 调用方可以为某个状态码指定的错误类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Protocol,
}

#[derive(Error, Debug)]
pub enum Error {
    /// 凭据缺失或被拒绝，包括 scope 不一致与用户拒绝授权。
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 非预期的状态码、非法请求或无法解析的响应。
    #[error("{message}")]
    Protocol { message: String, code: Option<u16> },

    #[error("no object named {name:?} in folder {parent}")]
    NotFound { name: String, parent: String },

    #[error("config storage failed: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn protocol(message: impl Into<String>, code: Option<u16>) -> Self {
        Error::Protocol {
            message: message.into(),
            code,
        }
    }

    /// 按状态码映射选出的类别构建错误。
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>, code: Option<u16>) -> Self {
        match kind {
            ErrorKind::Authentication => Error::Authentication(message.into()),
            ErrorKind::Protocol => Error::protocol(message, code),
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }

    /// 协议错误附带的 HTTP 状态码（服务端有响应时）。
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Protocol { code, .. } => *code,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kind_selects_variant() {
        let err = Error::from_kind(ErrorKind::Authentication, "denied", Some(401));
        assert!(err.is_authentication());
        assert_eq!(err.status_code(), None);

        let err = Error::from_kind(ErrorKind::Protocol, "boom", Some(500));
        assert!(!err.is_authentication());
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound {
            name: "docs".to_string(),
            parent: "me/skydrive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no object named \"docs\" in folder me/skydrive"
        );
    }
}
