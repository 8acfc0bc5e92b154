// Port-scan probe - Fans out quantum-safe probes across the open ports of a
// host under a shared time budget.

use crate::Result;
use crate::constants::{
    DEFAULT_SWEEP_CONNECT_TIMEOUT, DEFAULT_TLS_PORTS, MAX_CONCURRENT_PORT_PROBES,
    PORT_SWEEP_CONCURRENCY,
};
use crate::probe::{ProbeOrchestrator, ProbeOutcome, divide_budget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// External collaborator that discovers candidate open ports
#[async_trait]
pub trait PortScanner: Send + Sync {
    async fn discover_open_ports(&self, host: &str, candidates: &[u16]) -> Result<Vec<u16>>;
}

/// Plain TCP connect sweep
pub struct TcpConnectScanner {
    connect_timeout: Duration,
}

impl TcpConnectScanner {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnectScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl PortScanner for TcpConnectScanner {
    async fn discover_open_ports(&self, host: &str, candidates: &[u16]) -> Result<Vec<u16>> {
        let semaphore = Arc::new(Semaphore::new(PORT_SWEEP_CONCURRENCY));
        let mut tasks = Vec::new();

        for &port in candidates {
            let host = host.to_string();
            let semaphore = Arc::clone(&semaphore);
            let connect_timeout = self.connect_timeout;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let open = timeout(connect_timeout, TcpStream::connect((host.as_str(), port)))
                    .await
                    .map(|r| r.is_ok())
                    .unwrap_or(false);
                (port, open)
            }));
        }

        let mut open_ports: Vec<u16> = futures::future::try_join_all(tasks)
            .await?
            .into_iter()
            .filter_map(|(port, open)| open.then_some(port))
            .collect();
        open_ports.sort_unstable();

        debug!(?open_ports, "port sweep finished");
        Ok(open_ports)
    }
}

/// Verdict for one scanned port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortResult {
    pub port: u16,
    pub outcome: ProbeOutcome,
}

/// Aggregated scan report for one host.
///
/// Cross-port result order carries no guarantee; only the port → outcome
/// association is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanReport {
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<PortResult>,
}

impl PortScanReport {
    pub fn quantum_safe_ports(&self) -> Vec<&PortResult> {
        self.results.iter().filter(|r| r.outcome.succeeded).collect()
    }

    pub fn non_quantum_safe_ports(&self) -> Vec<&PortResult> {
        self.results.iter().filter(|r| !r.outcome.succeeded).collect()
    }

    /// Human-readable report, partitioned into quantum-safe and
    /// non-quantum-safe sections. The empty case is reported explicitly,
    /// never silently omitted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\n{} {} ({})\n",
            "Quantum-safe port scan of".cyan().bold(),
            self.host.green().bold(),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        if self.results.is_empty() {
            out.push_str(&format!("  {} no ports scanned\n", "!".yellow().bold()));
            return out;
        }

        let safe = self.quantum_safe_ports();
        out.push_str(&format!("\n{}\n", "Quantum-safe ports:".green().bold()));
        if safe.is_empty() {
            out.push_str("  (none)\n");
        }
        for result in safe {
            out.push_str(&format!(
                "  {} port {}: {}\n",
                "+".green(),
                result.port,
                result.outcome.summary
            ));
        }

        let unsafe_ports = self.non_quantum_safe_ports();
        out.push_str(&format!("\n{}\n", "Non-quantum-safe ports:".red().bold()));
        if unsafe_ports.is_empty() {
            out.push_str("  (none)\n");
        }
        for result in unsafe_ports {
            out.push_str(&format!(
                "  {} port {}: {}\n",
                "-".red(),
                result.port,
                result.outcome.summary
            ));
        }

        out
    }
}

/// Composition root for scanning workflows: discovers ports, then fans out
/// one orchestrator invocation per port.
pub struct PortScanProbe {
    orchestrator: ProbeOrchestrator,
    scanner: Arc<dyn PortScanner>,
}

impl PortScanProbe {
    pub fn new(orchestrator: ProbeOrchestrator, scanner: Arc<dyn PortScanner>) -> Self {
        Self { orchestrator, scanner }
    }

    /// Probe a host across `ports` (or discovered ports when `None`) under a
    /// single overall budget.
    ///
    /// The budget is divided evenly across the ports; per-port probes run
    /// under their own concurrency ceiling, independent of and additional to
    /// the per-algorithm ceiling inside each probe.
    pub async fn run(
        &self,
        host: &str,
        ports: Option<Vec<u16>>,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<PortScanReport> {
        let started_at = Utc::now();
        let ports = match ports {
            Some(list) if !list.is_empty() => list,
            _ => {
                info!(host, "discovering open TLS ports");
                self.scanner
                    .discover_open_ports(host, &DEFAULT_TLS_PORTS)
                    .await?
            }
        };

        if ports.is_empty() {
            return Ok(PortScanReport {
                host: host.to_string(),
                started_at,
                results: Vec::new(),
            });
        }

        let per_port = divide_budget(budget, ports.len());
        info!(host, ports = ports.len(), ?per_port, "probing ports");

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PORT_PROBES));
        let mut tasks = Vec::new();

        for port in ports {
            let semaphore = Arc::clone(&semaphore);
            let orchestrator = self.orchestrator.clone();
            let host = host.to_string();
            let cancel = cancel.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let outcome = orchestrator
                    .is_quantum_safe(&host, port, per_port, &cancel)
                    .await
                    .unwrap_or_else(|e| ProbeOutcome {
                        succeeded: false,
                        summary: e.to_string(),
                        matched_algorithm: None,
                    });
                PortResult { port, outcome }
            }));
        }

        let results = futures::future::try_join_all(tasks).await?;

        Ok(PortScanReport {
            host: host.to_string(),
            started_at,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(succeeded: bool, summary: &str) -> ProbeOutcome {
        ProbeOutcome {
            succeeded,
            summary: summary.to_string(),
            matched_algorithm: None,
        }
    }

    #[test]
    fn test_report_partitions_ports() {
        let report = PortScanReport {
            host: "example.com".to_string(),
            started_at: Utc::now(),
            results: vec![
                PortResult { port: 443, outcome: outcome(true, "negotiated X25519MLKEM768") },
                PortResult { port: 8443, outcome: outcome(false, "handshake did not complete") },
            ],
        };
        assert_eq!(report.quantum_safe_ports().len(), 1);
        assert_eq!(report.non_quantum_safe_ports().len(), 1);
        let text = report.render();
        assert!(text.contains("443"));
        assert!(text.contains("8443"));
    }

    #[test]
    fn test_empty_report_is_explicit() {
        let report = PortScanReport {
            host: "example.com".to_string(),
            started_at: Utc::now(),
            results: Vec::new(),
        };
        assert!(report.render().contains("no ports scanned"));
    }

    #[tokio::test]
    async fn test_sweep_detects_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = TcpConnectScanner::default();
        let open = scanner
            .discover_open_ports("127.0.0.1", &[port])
            .await
            .unwrap();
        assert_eq!(open, vec![port]);
        drop(listener);
    }
}
