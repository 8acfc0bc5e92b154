// Probe orchestrator - Decides which algorithms to test, in what grouping,
// runs them with bounded parallelism and folds the attempts into one verdict.

use super::classify::evaluate_attempt;
use super::{AlgorithmResult, ProbeOutcome, ProbeTarget};
use crate::Result;
use crate::catalog::{AlgorithmCatalog, AlgorithmEntry};
use crate::constants::MAX_CONCURRENT_ALGORITHM_TESTS;
use crate::external::{ClientInvocation, TlsClientRunner};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs multi-algorithm capability tests against one (host, port) pair.
///
/// Cheap to clone: the catalog and runner are shared read-only state, safe
/// across all concurrent attempts. No mutable state is shared between
/// attempts; each spawns its own process and owns its own trace buffer.
#[derive(Clone)]
pub struct ProbeOrchestrator {
    catalog: Arc<AlgorithmCatalog>,
    runner: Arc<TlsClientRunner>,
}

impl ProbeOrchestrator {
    pub fn new(catalog: Arc<AlgorithmCatalog>, runner: Arc<TlsClientRunner>) -> Self {
        Self { catalog, runner }
    }

    pub fn catalog(&self) -> &AlgorithmCatalog {
        &self.catalog
    }

    /// Quick yes/no check: is the endpoint quantum-safe at all?
    ///
    /// Offers all modern enabled algorithms in one batched invocation first
    /// (the server picks its preferred mutually-supported group, so one
    /// round-trip suffices). On a miss, iterates the legacy enabled entries
    /// one-by-one, stopping at the first confirmed success.
    pub async fn is_quantum_safe(
        &self,
        host: &str,
        port: u16,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome> {
        let modern = self.catalog.modern_enabled();
        let legacy = self.catalog.legacy_enabled();

        let attempts = (if modern.is_empty() { 0 } else { 1 }) + legacy.len();
        if attempts == 0 {
            return Ok(ProbeOutcome {
                succeeded: false,
                summary: "no enabled algorithms in catalog".to_string(),
                matched_algorithm: None,
            });
        }
        let per_attempt = divide_budget(budget, attempts);

        let mut results = Vec::new();

        if !modern.is_empty() {
            let result = self.run_batch(&modern, host, port, per_attempt, cancel).await;
            if result.succeeded {
                info!(host, port, algorithm = %result.algorithm_name, "quantum-safe (batch)");
                return Ok(process_test_results(vec![result]));
            }
            results.push(result);
        }

        for entry in legacy {
            if cancel.is_cancelled() {
                break;
            }
            let result = self.run_single(entry, host, port, per_attempt, cancel).await;
            if result.succeeded {
                info!(host, port, algorithm = %result.algorithm_name, "quantum-safe (legacy)");
                results.push(result);
                return Ok(process_test_results(results));
            }
            results.push(result);
        }

        Ok(process_test_results(results))
    }

    /// Full diagnostic report: test every requested algorithm in its own
    /// invocation under bounded parallelism, collect ALL results, no
    /// short-circuit. Waits for every dispatched attempt before aggregating.
    pub async fn test_algorithms(
        &self,
        target: &ProbeTarget,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome> {
        let entries: Vec<AlgorithmEntry> = if target.algorithms.is_empty() {
            self.catalog.enabled().into_iter().cloned().collect()
        } else {
            self.catalog
                .subset(&target.algorithms)?
                .into_iter()
                .cloned()
                .collect()
        };

        if entries.is_empty() {
            return Ok(ProbeOutcome {
                succeeded: false,
                summary: "no algorithms to test".to_string(),
                matched_algorithm: None,
            });
        }

        let per_attempt = divide_budget(target.timeout, entries.len());
        debug!(
            host = %target.host,
            port = target.port,
            algorithms = entries.len(),
            ?per_attempt,
            "dispatching one-by-one attempts"
        );

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_ALGORITHM_TESTS));
        let mut tasks = Vec::new();

        for entry in entries {
            let semaphore = Arc::clone(&semaphore);
            let orchestrator = self.clone();
            let host = target.host.clone();
            let port = target.port;
            let cancel = cancel.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                orchestrator
                    .run_single(&entry, &host, port, per_attempt, &cancel)
                    .await
            }));
        }

        // Completion order is not guaranteed; the aggregate waits for every
        // dispatched attempt regardless.
        let results = futures::future::try_join_all(tasks).await?;

        Ok(process_test_results(results))
    }

    /// One invocation offering a single algorithm, with its legacy codepoint
    /// env var when the catalog demands it.
    async fn run_single(
        &self,
        entry: &AlgorithmEntry,
        host: &str,
        port: u16,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> AlgorithmResult {
        let mut invocation = ClientInvocation::kem_test(host, port, &entry.name);
        if entry.requires_legacy_env {
            if let Some(var) = &entry.legacy_env_var {
                invocation = invocation.with_env(var, &entry.default_group_id.to_string());
            }
        }
        self.run_attempt(&entry.name, invocation, budget, cancel).await
    }

    /// One invocation offering a colon-separated group list. Never sets
    /// legacy env vars; batched lists and codepoint overrides do not mix.
    async fn run_batch(
        &self,
        entries: &[&AlgorithmEntry],
        host: &str,
        port: u16,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> AlgorithmResult {
        let curves: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        let invocation = ClientInvocation::kem_test(host, port, &curves.join(":"));
        self.run_attempt("modern batch", invocation, budget, cancel).await
    }

    async fn run_attempt(
        &self,
        label: &str,
        invocation: ClientInvocation,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> AlgorithmResult {
        match self.runner.run(&invocation, budget, cancel).await {
            // Launch and validation failures are fatal to this attempt only
            Err(err) => AlgorithmResult::failure(label, err.to_string()),
            Ok(capture) => {
                // A partial trace may already contain a usable ServerHello;
                // classify whatever was captured before reporting a timeout.
                let mut result = evaluate_attempt(label, &capture.transcript, &self.catalog);
                if !result.succeeded && capture.timed_out {
                    result.error_detail =
                        format!("{} (attempt deadline exceeded)", result.error_detail);
                } else if !result.succeeded && capture.cancelled {
                    result.error_detail = format!("{} (cancelled)", result.error_detail);
                }
                result
            }
        }
    }
}

/// Carve a per-part sub-timeout out of a shared budget.
///
/// Division, not independent full timeouts: the sum over all parts never
/// exceeds the parent budget.
pub fn divide_budget(total: Duration, parts: usize) -> Duration {
    if parts == 0 { total } else { total / parts as u32 }
}

/// Reduce all attempts to one outcome.
///
/// Success iff any attempt succeeded; the success summary concatenates every
/// successful detail (not just the first). The failure summary carries every
/// algorithm's error detail so the caller sees the full negative evidence.
pub fn process_test_results(results: Vec<AlgorithmResult>) -> ProbeOutcome {
    let successes: Vec<&AlgorithmResult> = results.iter().filter(|r| r.succeeded).collect();

    if !successes.is_empty() {
        let summary = successes
            .iter()
            .map(|r| r.detail.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return ProbeOutcome {
            succeeded: true,
            summary,
            matched_algorithm: Some(successes[0].algorithm_name.clone()),
        };
    }

    let summary = results
        .iter()
        .map(|r| format!("{}: {}", r.algorithm_name, r.error_detail))
        .collect::<Vec<_>>()
        .join("; ");

    ProbeOutcome {
        succeeded: false,
        summary,
        matched_algorithm: None,
    }
}
