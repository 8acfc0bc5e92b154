// Certificates module - Quantum-safe classification of presented chains

pub mod analyzer;
pub mod probe;

pub use analyzer::{CertificateAnalyzer, CertificateSummary};
pub use probe::{CertificateProbe, CertificateProbeResult};
