//! Error types for the ONVIF device server.
//!
//! Every pipeline error is recovered inside the dispatcher and rendered as a
//! SOAP Fault. [`FaultKind`] is the wire-facing projection: it carries the
//! fixed code and reason that leave the process, while the detailed error
//! variant only ever reaches the logs.

use thiserror::Error;

/// Envelope and header scanning errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed SOAP envelope")]
    MalformedEnvelope,

    #[error("UsernameToken is missing Username or Password")]
    MissingCredentials,
}

/// WS-UsernameToken authentication failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown or disabled user")]
    UnknownUser,

    #[error("password or digest mismatch")]
    BadPassword,

    #[error("Created timestamp is malformed or outside the tolerance window")]
    ExpiredTimestamp,

    #[error("nonce has already been used")]
    ReplayedNonce,
}

/// Operation routing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unsupported operation '{0}'")]
    UnsupportedOperation(String),
}

/// Response rendering errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("response of {needed} bytes exceeds the {limit} byte limit")]
    BufferTooSmall { needed: usize, limit: usize },
}

/// Errors returned by service handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Server setup errors (configuration, I/O).
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// SOAP Fault categories emitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Envelope could not be parsed
    MalformedRequest,
    /// Any authentication failure
    NotAuthorized,
    /// No handler registered for the operation
    UnsupportedAction,
    /// Handler rejected an argument
    InvalidArgument,
    /// Handler cannot serve the request with the current configuration
    NotSupported,
    /// Server-side failure while producing the response
    Internal,
}

impl FaultKind {
    /// SOAP 1.2 fault code value.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequest
            | Self::NotAuthorized
            | Self::UnsupportedAction
            | Self::InvalidArgument => "s:Sender",
            Self::NotSupported | Self::Internal => "s:Receiver",
        }
    }

    /// Human-readable fault reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "Malformed SOAP request",
            Self::NotAuthorized => "Sender not authorized",
            Self::UnsupportedAction => "Unsupported action",
            Self::InvalidArgument => "Invalid argument",
            Self::NotSupported => "Action not supported by device configuration",
            Self::Internal => "Internal server error",
        }
    }

    /// HTTP status the transport should answer with.
    pub fn http_status(&self) -> u16 {
        match self.code() {
            "s:Sender" => 400,
            _ => 500,
        }
    }

    /// Short identifier used in logs and counters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::UnsupportedAction => "UNSUPPORTED_ACTION",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl From<&ParseError> for FaultKind {
    fn from(_: &ParseError) -> Self {
        Self::MalformedRequest
    }
}

impl From<&AuthError> for FaultKind {
    fn from(_: &AuthError) -> Self {
        Self::NotAuthorized
    }
}

impl From<&DispatchError> for FaultKind {
    fn from(_: &DispatchError) -> Self {
        Self::UnsupportedAction
    }
}

impl From<&HandlerError> for FaultKind {
    fn from(err: &HandlerError) -> Self {
        match err {
            HandlerError::InvalidArgument(_) => Self::InvalidArgument,
            HandlerError::NotSupported(_) => Self::NotSupported,
            HandlerError::Build(_) => Self::Internal,
        }
    }
}
