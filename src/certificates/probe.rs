// Certificate probe - Drives the external client with -showcerts and feeds
// the captured chain to the analyzer.

use super::analyzer::{CertificateAnalyzer, CertificateSummary};
use crate::Result;
use crate::catalog::AlgorithmCatalog;
use crate::external::{ClientInvocation, TlsClientRunner};
use crate::probe::divide_budget;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Caller-facing result: a free-text message plus the structured summary for
/// programmatic consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateProbeResult {
    pub succeeded: bool,
    pub message: String,
    pub summary: Option<CertificateSummary>,
}

/// Thin orchestrator: one client invocation (with -showcerts) per
/// algorithm-group attempt, output fed to the analyzer.
pub struct CertificateProbe {
    runner: Arc<TlsClientRunner>,
    analyzer: CertificateAnalyzer,
}

impl CertificateProbe {
    pub fn new(runner: Arc<TlsClientRunner>, analyzer: CertificateAnalyzer) -> Self {
        Self { runner, analyzer }
    }

    /// Run one certificate capture attempt offering `curves`
    pub async fn run_attempt(
        &self,
        host: &str,
        port: u16,
        curves: &str,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<CertificateProbeResult> {
        let invocation = ClientInvocation::certificate_test(host, port, curves);
        let capture = self.runner.run(&invocation, budget, cancel).await?;

        match self.analyzer.analyze(&capture.transcript) {
            Ok(summary) => Ok(CertificateProbeResult {
                succeeded: summary.is_quantum_safe(),
                message: describe(&summary),
                summary: Some(summary),
            }),
            Err(err) => Ok(CertificateProbeResult {
                succeeded: false,
                message: format!("offering {}: {}", curves, err),
                summary: None,
            }),
        }
    }

    /// Analyze a target: batched modern groups first, then each enabled
    /// algorithm individually until a chain is captured. Attempts share the
    /// caller budget by division.
    pub async fn analyze_target(
        &self,
        catalog: &AlgorithmCatalog,
        host: &str,
        port: u16,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<CertificateProbeResult> {
        let modern = catalog.modern_enabled();
        let singles = catalog.enabled();

        let mut attempts: Vec<String> = Vec::new();
        if !modern.is_empty() {
            attempts.push(
                modern
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(":"),
            );
        }
        attempts.extend(singles.iter().map(|e| e.name.clone()));

        if attempts.is_empty() {
            return Ok(CertificateProbeResult {
                succeeded: false,
                message: "no enabled algorithms in catalog".to_string(),
                summary: None,
            });
        }

        let per_attempt = divide_budget(budget, attempts.len());
        let mut failures = Vec::new();

        for curves in &attempts {
            if cancel.is_cancelled() {
                break;
            }
            debug!(host, port, curves = %curves, "certificate capture attempt");
            let result = self.run_attempt(host, port, curves, per_attempt, cancel).await?;
            if result.summary.is_some() {
                return Ok(result);
            }
            failures.push(result.message);
        }

        Ok(CertificateProbeResult {
            succeeded: false,
            message: failures.join("; "),
            summary: None,
        })
    }
}

fn describe(summary: &CertificateSummary) -> String {
    format!(
        "{} (chain of {}): signature {} ({}) {}, public key {} ({}) {}",
        summary.subject,
        summary.chain_length,
        summary.signature_algorithm_name,
        summary.signature_algorithm_oid,
        verdict(summary.signature_is_quantum_safe),
        summary.public_key_algorithm_name,
        summary.public_key_algorithm_oid,
        verdict(summary.public_key_is_quantum_safe),
    )
}

fn verdict(quantum_safe: bool) -> &'static str {
    if quantum_safe {
        "is quantum-safe"
    } else {
        "is NOT quantum-safe"
    }
}
