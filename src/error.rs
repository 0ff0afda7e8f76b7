//! Error types for the event socket engine

use thiserror::Error;

/// Result alias used across the crate.
pub type EslResult<T> = Result<T, EslError>;

/// Every failure the engine reports to callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EslError {
    /// Transport read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or handshake did not finish in time.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The connection ended before a reply arrived, or was already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// No session has been established yet.
    #[error("not connected")]
    NotConnected,

    /// Malformed framing or an unexpected frame.
    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    /// A header line that has no `:` separator.
    #[error("invalid header line: {header:?}")]
    InvalidHeader { header: String },

    /// A header required by the operation is absent.
    #[error("missing header: {header}")]
    MissingHeader { header: String },

    /// A header is present but its value does not parse.
    #[error("invalid value {value:?} for header {header}")]
    InvalidHeaderValue { header: String, value: String },

    /// Content type the engine does not decode.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// Event subscription format other than plain.
    #[error("unsupported event format: {format}")]
    UnsupportedEventFormat { format: String },

    /// The switch rejected the credentials. Carries the reply text verbatim.
    #[error("authentication failed: {reply_text}")]
    AuthFailed { reply_text: String },

    /// Handshake broke off for a reason other than rejected credentials.
    #[error("handshake failed: {message}")]
    HandshakeFailed { message: String },

    /// Reply-Text started with `-ERR`.
    #[error("command failed: {reply_text}")]
    CommandFailed { reply_text: String },

    /// Reply-Text was neither `+OK` nor `-ERR`.
    #[error("unexpected reply: {reply_text}")]
    UnexpectedReply { reply_text: String },

    /// Command arguments that cannot be put on the wire.
    #[error("invalid command: {message}")]
    InvalidCommand { message: String },
}

impl EslError {
    pub fn protocol_error(message: impl Into<String>) -> Self {
        EslError::ProtocolError {
            message: message.into(),
        }
    }

    pub fn auth_failed(reply_text: impl Into<String>) -> Self {
        EslError::AuthFailed {
            reply_text: reply_text.into(),
        }
    }

    pub fn handshake_failed(message: impl Into<String>) -> Self {
        EslError::HandshakeFailed {
            message: message.into(),
        }
    }

    pub fn missing_header(header: impl Into<String>) -> Self {
        EslError::MissingHeader {
            header: header.into(),
        }
    }

    pub fn invalid_header_value(header: impl Into<String>, value: impl Into<String>) -> Self {
        EslError::InvalidHeaderValue {
            header: header.into(),
            value: value.into(),
        }
    }

    pub fn invalid_command(message: impl Into<String>) -> Self {
        EslError::InvalidCommand {
            message: message.into(),
        }
    }

    /// True when the underlying connection is gone and retrying on it is pointless.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            EslError::Io(_) | EslError::ConnectionClosed | EslError::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_keeps_reply_text() {
        let err = EslError::auth_failed("-ERR invalid");
        assert_eq!(err.to_string(), "authentication failed: -ERR invalid");
        assert!(!err.is_connection_error());
    }

    #[test]
    fn io_converts_and_counts_as_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: EslError = io.into();
        assert!(err.is_connection_error());
        assert!(EslError::ConnectionClosed.is_connection_error());
    }

    #[test]
    fn header_errors_name_the_header() {
        let err = EslError::invalid_header_value("DTMF-Duration", "abc");
        assert_eq!(
            err.to_string(),
            "invalid value \"abc\" for header DTMF-Duration"
        );
        assert_eq!(
            EslError::missing_header("Job-UUID").to_string(),
            "missing header: Job-UUID"
        );
    }
}
