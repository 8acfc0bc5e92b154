// External tooling integration - the quantum-capable TLS client binary

pub mod tls_client;

pub use tls_client::{ClientCapture, ClientInvocation, TlsClientConfig, TlsClientRunner};
