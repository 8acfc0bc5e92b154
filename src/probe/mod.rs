// Probe module - Multi-algorithm quantum-safe capability testing

pub mod classify;
pub mod orchestrator;

pub use classify::{TraceAssessment, assess_trace, evaluate_attempt};
pub use orchestrator::{ProbeOrchestrator, divide_budget, process_test_results};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit of work submitted to the orchestrator. Immutable per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    /// Overall budget for this target; per-algorithm sub-timeouts are carved
    /// out of it by division
    pub timeout: Duration,
    /// Explicit algorithm names to test; empty means "use the full enabled
    /// catalog"
    pub algorithms: Vec<String>,
}

impl ProbeTarget {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout,
            algorithms: Vec::new(),
        }
    }

    pub fn with_algorithms(mut self, algorithms: Vec<String>) -> Self {
        self.algorithms = algorithms;
        self
    }
}

/// Verdict for one algorithm attempt. Created per algorithm per test
/// invocation, immutable, reduced into a single `ProbeOutcome`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub algorithm_name: String,
    pub succeeded: bool,
    pub detail: String,
    pub error_detail: String,
}

impl AlgorithmResult {
    pub fn success(algorithm_name: &str, detail: String) -> Self {
        Self {
            algorithm_name: algorithm_name.to_string(),
            succeeded: true,
            detail,
            error_detail: String::new(),
        }
    }

    pub fn failure(algorithm_name: &str, error_detail: String) -> Self {
        Self {
            algorithm_name: algorithm_name.to_string(),
            succeeded: false,
            detail: String::new(),
            error_detail,
        }
    }
}

/// Externally visible verdict for one (address, port) pair.
/// Exactly one is produced per `ProbeTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub summary: String,
    pub matched_algorithm: Option<String>,
}
