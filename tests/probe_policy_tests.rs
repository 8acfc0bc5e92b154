// Integration tests for probe classification and aggregation policy,
// exercised against canned client transcripts.

use qsprobe::catalog::AlgorithmCatalog;
use qsprobe::constants::EXTENSION_TYPE_KEY_SHARE;
use qsprobe::probe::{AlgorithmResult, divide_budget, evaluate_attempt, process_test_results};
use std::time::Duration;

fn build_server_hello(extensions: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut ext_block = Vec::new();
    for (ext_type, data) in extensions {
        ext_block.extend_from_slice(&ext_type.to_be_bytes());
        ext_block.extend_from_slice(&(data.len() as u16).to_be_bytes());
        ext_block.extend_from_slice(data);
    }

    let mut body = Vec::new();
    body.extend_from_slice(&0x0303u16.to_be_bytes());
    body.extend_from_slice(&[0x5A; 32]);
    body.push(0);
    body.extend_from_slice(&0x1301u16.to_be_bytes());
    body.push(1);
    body.push(0);
    body.extend_from_slice(&(ext_block.len() as u16).to_be_bytes());
    body.extend_from_slice(&ext_block);

    let mut msg = vec![0x02];
    msg.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    msg.extend_from_slice(&body);
    msg
}

fn trace_with_group(group: u16) -> String {
    let mut ks = group.to_be_bytes().to_vec();
    ks.extend_from_slice(&4u16.to_be_bytes());
    ks.extend_from_slice(&[7, 7, 7, 7]);
    let payload = build_server_hello(&[(EXTENSION_TYPE_KEY_SHARE, ks)]);

    let hex_lines: Vec<String> = payload
        .chunks(16)
        .map(|chunk| {
            chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    format!(
        "<<< TLS 1.3, Handshake [length {:04x}], ServerHello\n    {}\n\
         <<< TLS 1.3, Handshake [length 0010], Certificate\n",
        payload.len(),
        hex_lines.join("\n    ")
    )
}

// Server negotiates X25519MLKEM768: the attempt succeeds and names the
// matched catalog entry.
#[test]
fn test_negotiated_hybrid_group_classifies_quantum_safe() {
    let catalog = AlgorithmCatalog::builtin();
    let trace = trace_with_group(0x11EC);

    let result = evaluate_attempt("modern batch", &trace, &catalog);
    assert!(result.succeeded);
    assert_eq!(result.algorithm_name, "X25519MLKEM768");
    assert!(result.detail.contains("group 0x11EC"));
}

// Endpoint down: the connect:errno line is reported verbatim and nothing
// else is attempted on the transcript.
#[test]
fn test_connection_refused_reports_errno_line() {
    let catalog = AlgorithmCatalog::builtin();
    let trace = "connect:errno=111\nconnect:errno=111\n";

    let result = evaluate_attempt("mlkem768", trace, &catalog);
    assert!(!result.succeeded);
    assert!(result.error_detail.contains("network failure"));
    assert!(result.error_detail.contains("connect:errno=111"));
}

// Server rejects the offered groups with a fatal alert: the alert line is
// carried verbatim in the failure detail.
#[test]
fn test_fatal_alert_carried_verbatim() {
    let catalog = AlgorithmCatalog::builtin();
    let trace = "<<< TLS 1.3, Alert [length 0002], fatal handshake_failure\n    02 28\n";

    let result = evaluate_attempt("frodo640aes", trace, &catalog);
    assert!(!result.succeeded);
    assert!(result
        .error_detail
        .contains("fatal handshake_failure"));
}

// Classical curve negotiated: present key_share, but not in the catalog
#[test]
fn test_classical_group_fails_with_group_id() {
    let catalog = AlgorithmCatalog::builtin();
    let trace = trace_with_group(0x0017);

    let result = evaluate_attempt("mlkem768", &trace, &catalog);
    assert!(!result.succeeded);
    assert!(result.error_detail.contains("0x0017"));
}

// Two ports sharing a 6000ms budget get 3000ms each
#[test]
fn test_budget_division_across_ports() {
    let per_port = divide_budget(Duration::from_millis(6000), 2);
    assert_eq!(per_port, Duration::from_millis(3000));
}

#[test]
fn test_budget_division_never_exceeds_parent() {
    for parts in 1..=10usize {
        let per = divide_budget(Duration::from_millis(10_000), parts);
        assert!(per * parts as u32 <= Duration::from_millis(10_000));
    }
}

// Aggregation completeness: N failed attempts produce a summary naming
// every one of them.
#[test]
fn test_failure_summary_names_every_algorithm() {
    let names = ["mlkem512", "mlkem768", "mlkem1024", "frodo640aes", "bikel1"];
    let results: Vec<AlgorithmResult> = names
        .iter()
        .map(|name| AlgorithmResult::failure(name, "handshake did not complete".to_string()))
        .collect();

    let outcome = process_test_results(results);
    assert!(!outcome.succeeded);
    assert!(outcome.matched_algorithm.is_none());
    for name in names {
        assert!(outcome.summary.contains(name), "missing {}", name);
    }
}

#[test]
fn test_single_success_dominates_many_failures() {
    let mut results: Vec<AlgorithmResult> = (0..5)
        .map(|i| AlgorithmResult::failure(&format!("alg{}", i), "no key_share".to_string()))
        .collect();
    results.push(AlgorithmResult::success(
        "mlkem768",
        "negotiated mlkem768 (group 0x0201, 1184-byte key share)".to_string(),
    ));

    let outcome = process_test_results(results);
    assert!(outcome.succeeded);
    assert_eq!(outcome.matched_algorithm.as_deref(), Some("mlkem768"));
    assert!(outcome.summary.contains("negotiated mlkem768"));
}
