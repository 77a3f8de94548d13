use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RedomineError>;

/// Error taxonomy of the engine.
///
/// `Data` covers dictionary invariant violations and parse errors, `Runtime`
/// covers resource failures, `Network` covers transport disconnects. Network
/// errors are retriable by the writer session loop; everything else escalates
/// to a hard shutdown.
#[derive(Debug, Error)]
pub enum RedomineError {
    #[error("data error {code}: {message}")]
    Data { code: u32, message: String },
    #[error("runtime error {code}: {message}")]
    Runtime { code: u32, message: String },
    #[error("network error {code}: {message}")]
    Network { code: u32, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RedomineError {
    pub fn data(code: u32, message: impl Into<String>) -> Self {
        RedomineError::Data {
            code,
            message: message.into(),
        }
    }

    pub fn runtime(code: u32, message: impl Into<String>) -> Self {
        RedomineError::Runtime {
            code,
            message: message.into(),
        }
    }

    pub fn network(code: u32, message: impl Into<String>) -> Self {
        RedomineError::Network {
            code,
            message: message.into(),
        }
    }

    /// Numeric diagnostic code, where the variant carries one.
    pub fn code(&self) -> u32 {
        match self {
            RedomineError::Data { code, .. }
            | RedomineError::Runtime { code, .. }
            | RedomineError::Network { code, .. } => *code,
            RedomineError::Io(_) | RedomineError::Encode(_) | RedomineError::Decode(_) => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RedomineError::Data { message, .. }
            | RedomineError::Runtime { message, .. }
            | RedomineError::Network { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Network errors are retried by the writer after a reconnect; every
    /// other variant is fatal.
    pub fn is_network(&self) -> bool {
        matches!(self, RedomineError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::RedomineError;

    #[test]
    fn codes_survive_construction() {
        let err = RedomineError::data(50023, "duplicate SYS.CCOL$ value");
        assert_eq!(err.code(), 50023);
        assert!(!err.is_network());
        assert_eq!(
            format!("{err}"),
            "data error 50023: duplicate SYS.CCOL$ value"
        );
    }

    #[test]
    fn network_errors_are_retriable() {
        let err = RedomineError::network(10061, "connection reset by peer");
        assert!(err.is_network());
        assert_eq!(err.code(), 10061);
    }
}
