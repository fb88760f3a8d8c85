//! Error types for the IMAP client.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
///
/// The type is `Clone` so a single connection-fatal cause can be delivered
/// to every command that was outstanding when the connection died.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Socket read or write failure.
    #[error("transport error: {0}")]
    Transport(Arc<std::io::Error>),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// The inbound byte stream could not be split into response units.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A response unit did not match the IMAP grammar.
    #[error("malformed response at position {position}: {message}")]
    MalformedResponse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A tagged completion did not belong to the active command.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The command is not legal in the current connection phase.
    #[error("{command} is not allowed in state {state}")]
    IllegalInState {
        /// Verb of the rejected command.
        command: String,
        /// Connection state at the time the command became active.
        state: String,
    },

    /// The server completed the command with `NO`.
    #[error("server returned NO: {text}")]
    ServerNo {
        /// Human-readable text from the server.
        text: String,
        /// Response code, if the server sent one.
        code: Option<ResponseCode>,
    },

    /// The server completed the command with `BAD`.
    #[error("server returned BAD: {text}")]
    ServerBad {
        /// Human-readable text from the server.
        text: String,
        /// Response code, if the server sent one.
        code: Option<ResponseCode>,
    },

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The server sent `BYE` or the connection is shutting down.
    #[error("connection closing: {0}")]
    ConnectionClosing(String),

    /// A message field was read that was not part of the fetch.
    #[error("field `{0}` was not fetched")]
    UnfetchedField(&'static str),

    /// A fetch item cannot be expressed on the wire.
    #[error("unknown fetch item type: {0}")]
    UnknownFetchItemType(String),

    /// The caller stopped waiting for a response.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Keep-alive NOOPs failed too many times in a row.
    #[error("keep-alive failed {0} times in a row")]
    KeepAliveFailed(u32),
}

impl Error {
    /// Returns true if this error ends the connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::MalformedFrame(_)
                | Self::MalformedResponse { .. }
                | Self::ProtocolMismatch(_)
                | Self::ConnectionClosing(_)
                | Self::KeepAliveFailed(_)
        )
    }

    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            position,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

impl From<rustls::pki_types::InvalidDnsNameError> for Error {
    fn from(err: rustls::pki_types::InvalidDnsNameError) -> Self {
        Self::InvalidDnsName(err.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
