// Error types for qsprobe
//
// Structured error types using thiserror. Each variant maps to one failure
// category of the probe taxonomy so aggregated messages can tell a network
// failure apart from a protocol rejection or a parse problem.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for qsprobe operations
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The external TLS client binary could not be started
    #[error("failed to launch TLS client '{program}': {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The captured trace did not decode to a usable ServerHello
    #[error("malformed handshake trace: {details}")]
    HandshakeParse { details: String },

    /// Connection-level failure reported by the client (connect:errno)
    #[error("network unreachable: {details}")]
    NetworkUnreachable { details: String },

    /// The server actively rejected the offered parameters
    #[error("TLS alert received: {details}")]
    TlsAlert { details: String },

    /// The whole run exceeded its caller-supplied budget
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// External cancellation fired before the probe finished
    #[error("probe cancelled")]
    Cancelled,

    /// Handshake completed but no catalog algorithm was negotiated
    #[error("algorithm not negotiated: {details}")]
    NotNegotiated { details: String },

    /// Certificate material could not be extracted or decoded
    #[error("certificate parsing failed: {details}")]
    CertificateParse { details: String },

    /// Invalid configuration or parameters
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Invalid input from user or caller
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Algorithm catalog import errors
    #[error("catalog import error: {0}")]
    Csv(#[from] csv::Error),

    /// PEM decoding errors
    #[error("PEM parsing error: {0}")]
    Pem(#[from] pem::PemError),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Integer parsing errors
    #[error("integer parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<tokio::time::error::Elapsed> for ProbeError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        ProbeError::Timeout {
            duration: Duration::from_secs(0), // actual budget unknown here
        }
    }
}

impl From<tokio::task::JoinError> for ProbeError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProbeError::Other(format!("task join error: {}", err))
    }
}

impl From<hex::FromHexError> for ProbeError {
    fn from(err: hex::FromHexError) -> Self {
        ProbeError::HandshakeParse {
            details: format!("invalid hex in trace: {}", err),
        }
    }
}

/// Helper macro for creating context-specific errors
#[macro_export]
macro_rules! probe_bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::ProbeError::Other($msg.to_string()).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::ProbeError::Other(format!($fmt, $($arg)*)).into())
    };
}
