use std::fmt;

use thiserror::Error;

/// Coarse failure category reported to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Resource,
    Io,
    Codec,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Resource => write!(f, "resource"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Codec => write!(f, "codec"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Every failure the encode pipeline and its collaborators can raise.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Invalid resolution, bit rate, frame count, or muxer track misuse.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Encoder, muxer, or output location could not be allocated.
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// Container or file write failed.
    #[error("write failed: {0}")]
    Io(String),

    /// Encoder or muxer driven outside its valid state, or inconsistent output.
    #[error("codec failure: {0}")]
    Codec(String),

    #[error("encode cancelled")]
    Cancelled,
}

impl EncodeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::Configuration(_) => ErrorKind::Configuration,
            EncodeError::Resource(_) => ErrorKind::Resource,
            EncodeError::Io(_) => ErrorKind::Io,
            EncodeError::Codec(_) => ErrorKind::Codec,
            EncodeError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
