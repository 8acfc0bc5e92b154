// Trace classification - Pure functions mapping a captured client trace to
// an algorithm verdict. No processes are spawned here; everything is
// testable against canned transcripts.

use super::AlgorithmResult;
use crate::catalog::AlgorithmCatalog;
use crate::constants::{MARKER_ALERT, MARKER_CERTIFICATE, MARKER_CONNECT_ERRNO, MARKER_SERVER_HELLO};
use crate::handshake;
use tracing::warn;

/// What the raw client output says before any byte-level parsing
#[derive(Debug, Clone, Default)]
pub struct TraceAssessment {
    /// First connect:errno line, verbatim. Connection-level failure that
    /// short-circuits classification independent of handshake content.
    pub network_failure: Option<String>,
    /// Every line containing "Alert", verbatim (the server actively rejected
    /// the offered parameters)
    pub alert_lines: Vec<String>,
    /// Conjunctive presence of the markers a complete-enough handshake must
    /// show before extension parsing is attempted
    pub handshake_complete: bool,
}

pub fn assess_trace(transcript: &str) -> TraceAssessment {
    let network_failure = transcript
        .lines()
        .find(|line| line.contains(MARKER_CONNECT_ERRNO))
        .map(str::to_string);

    let alert_lines: Vec<String> = transcript
        .lines()
        .filter(|line| line.contains(MARKER_ALERT))
        .map(str::to_string)
        .collect();

    let handshake_complete =
        transcript.contains(MARKER_SERVER_HELLO) && transcript.contains(MARKER_CERTIFICATE);

    TraceAssessment {
        network_failure,
        alert_lines,
        handshake_complete,
    }
}

/// Classify one attempt's transcript against the catalog.
///
/// `label` names the attempt in logs and failure details (an algorithm name,
/// or "modern batch"). On success the result carries the *matched* catalog
/// entry's name, which is what bubbles up as `matched_algorithm`.
pub fn evaluate_attempt(
    label: &str,
    transcript: &str,
    catalog: &AlgorithmCatalog,
) -> AlgorithmResult {
    let assessment = assess_trace(transcript);

    if let Some(line) = assessment.network_failure {
        return AlgorithmResult::failure(label, format!("network failure: {}", line.trim()));
    }

    if !assessment.handshake_complete {
        return AlgorithmResult::failure(
            label,
            with_alerts("handshake did not complete".to_string(), &assessment.alert_lines),
        );
    }

    let hello = match handshake::parse_trace(transcript) {
        Ok(hello) => hello,
        Err(err) => {
            return AlgorithmResult::failure(
                label,
                with_alerts(err.to_string(), &assessment.alert_lines),
            );
        }
    };

    let share = hello.key_share();

    if share.server_hello_overlong && !share.is_present {
        // Ambiguous: a long hello usually carries a key_share, so its absence
        // here is worth its own log line.
        warn!(
            attempt = label,
            body_len = hello.body_len,
            "unusually long ServerHello without a key_share extension"
        );
    }

    if !share.is_present {
        let mut detail = "no key_share extension in ServerHello".to_string();
        if let Some(note) = &share.diagnostic {
            detail = format!("{} ({})", detail, note);
        }
        return AlgorithmResult::failure(label, with_alerts(detail, &assessment.alert_lines));
    }

    match catalog.match_group(share.group_id) {
        Some(entry) => AlgorithmResult::success(
            &entry.name,
            format!(
                "negotiated {} (group {}, {}-byte key share)",
                entry.name,
                entry.group_id_hex(),
                share.key_material.len()
            ),
        ),
        None => AlgorithmResult::failure(
            label,
            with_alerts(
                format!(
                    "algorithm not negotiated: server selected group {}",
                    share.group_id_hex
                ),
                &assessment.alert_lines,
            ),
        ),
    }
}

fn with_alerts(detail: String, alert_lines: &[String]) -> String {
    if alert_lines.is_empty() {
        detail
    } else {
        format!("{}; alerts: {}", detail, alert_lines.join(" | "))
    }
}
