/// Failures raised by a `ChatTransport` while opening or reading the reply body.
///
/// These never escape the session as `Err`: they are rendered as a single
/// failure unit and the exchange resolves with `ExchangeEnd::TransportFailed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Endpoint answered with a non-success HTTP status.
    #[error("chat endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Request could not be sent (DNS, TLS, refused connection, timeout).
    #[error("chat request failed: {0}")]
    Connect(String),
    /// Reading the streamed body failed after the response started.
    #[error("chat stream read failed: {0}")]
    Read(String),
    /// The transport could not be built from its configuration.
    #[error("transport config error: {0}")]
    Config(String),
}

impl TransportError {
    /// Creates a status error from a code and (possibly empty) body text.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Creates a connect-level error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    /// Creates a read-level error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }
}

/// A frame body that could not be turned into a `Payload`.
///
/// Callers swallow this: one bad frame must never abort the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Frame body is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(String),
    /// JSON decoded, but a known payload type carried fields of the wrong type.
    #[error("invalid `{payload_type}` payload: {message}")]
    InvalidShape {
        payload_type: String,
        message: String,
    },
}

/// Top-level error type for the public session API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Invalid client or session configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (for example an empty query).
    #[error("validation error: {0}")]
    Validation(String),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
