// qsprobe - Quantum-safe TLS capability probe
// Licensed under GPL-3.0

//! qsprobe determines whether a remote TLS endpoint negotiates a
//! post-quantum-safe key-exchange group, and/or presents a post-quantum
//! certificate, by driving an external `openssl s_client` binary and decoding
//! the raw `ServerHello` handshake bytes out of its `-msg` trace. The host's
//! installed TLS stack does not expose negotiated group identifiers for
//! draft/experimental post-quantum algorithms, so the wire trace is the only
//! source of truth.

pub mod catalog;
pub mod certificates;
pub mod cli;
pub mod constants;
pub mod error;
pub mod external;
pub mod handshake;
pub mod probe;
pub mod scanner;

// Re-export commonly used types
pub use crate::catalog::{AlgorithmCatalog, AlgorithmEntry};
pub use crate::cli::Args;
pub use crate::probe::{ProbeOrchestrator, ProbeOutcome, ProbeTarget};

/// Result type for qsprobe operations
pub type Result<T> = anyhow::Result<T>;

/// Error type for qsprobe operations
pub use anyhow::Error;
