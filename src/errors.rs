use std::fmt;

/// Client-specific error types.
///
/// The reserved "no records" fault never shows up here: lookups resolve it to
/// `Ok(None)` before it reaches the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Fault reported by the remote API (validation, authorization, server error).
    RemoteFault {
        /// Machine-readable fault code, when the remote side supplied one.
        code: Option<String>,
        /// Human-readable fault message.
        message: String,
    },
    /// Connectivity, timeout or envelope failure surfaced by the transport.
    Transport(String),
    /// Reply did not have the expected shape.
    MalformedReply(String),
    /// Caller-supplied argument was rejected before any remote call.
    InvalidArgument(String),
    /// Invalid client configuration.
    Config(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<ClientError>,
        /// Additional context message.
        context: String,
    },
}

impl ClientError {
    /// Returns the remote fault code, looking through any context layers.
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            ClientError::RemoteFault { code, .. } => code.as_deref(),
            ClientError::WithContext { source, .. } => source.fault_code(),
            _ => None,
        }
    }

    /// Returns the innermost error, stripping context layers.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::RemoteFault {
                code: Some(code),
                message,
            } => write!(f, "Remote fault {}: {}", code, message),
            ClientError::RemoteFault {
                code: None,
                message,
            } => write!(f, "Remote fault: {}", message),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::MalformedReply(msg) => write!(f, "Malformed reply: {}", msg),
            ClientError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ClientError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ClientError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    /// Converts a `reqwest::Error` into a `ClientError`.
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::MalformedReply(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `ClientError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, ClientError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, ClientError> {
    fn context(self, context: impl Into<String>) -> Result<T, ClientError> {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ClientError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}
