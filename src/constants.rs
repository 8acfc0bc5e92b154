// qsprobe - Quantum-safe TLS capability probe
// Licensed under GPL-3.0

//! Protocol constants, trace markers and concurrency ceilings.
//!
//! Centralizes the magic numbers of the probe: TLS wire-format values used by
//! the handshake decoder, the textual markers expected in `openssl s_client`
//! output, and the bounded-parallelism limits of the orchestration layers.

use std::time::Duration;

// =============================================================================
// TLS wire format (RFC 8446)
// =============================================================================

/// Handshake Type: ServerHello (0x02)
///
/// The only handshake message the probe decodes. Reference: RFC 8446
/// Section 4.1.3.
pub const HANDSHAKE_TYPE_SERVER_HELLO: u8 = 0x02;

/// Extension Type: key_share (51 / 0x0033)
///
/// Carries the group the server selected for key exchange. Reference:
/// RFC 8446 Section 4.2.8.
pub const EXTENSION_TYPE_KEY_SHARE: u16 = 0x0033;

/// Length of the ServerHello random field in bytes
pub const SERVER_HELLO_RANDOM_LEN: usize = 32;

/// ServerHello bodies longer than this without a key_share are flagged as
/// unusually long. Heuristic for ambiguous failures worth separate logging.
pub const SERVER_HELLO_OVERLONG_THRESHOLD: usize = 100;

// =============================================================================
// Trace markers emitted by openssl s_client
// =============================================================================

/// Handshake message marker announcing the ServerHello hex dump
pub const MARKER_SERVER_HELLO: &str = "ServerHello";

/// Handshake message marker for the certificate message
pub const MARKER_CERTIFICATE: &str = "Certificate";

/// Handshake completion marker
pub const MARKER_FINISHED: &str = "Finished";

/// Connection-level failure marker (errno from connect(2))
pub const MARKER_CONNECT_ERRNO: &str = "connect:errno";

/// Protocol-level rejection marker (TLS alert record)
pub const MARKER_ALERT: &str = "Alert";

/// Start of a PEM certificate block
pub const PEM_BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";

/// End of a PEM certificate block
pub const PEM_END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// End-of-connection-setup marker used for certificate captures, which run
/// without `-msg` and therefore never print "Finished"
pub const MARKER_VERIFY_RETURN: &str = "Verify return code";

/// Inbound/outbound record prefixes of the `-msg` trace. Hex capture stops at
/// the first line starting with either of these.
pub const TRACE_ARROW_PREFIXES: [&str; 2] = ["<<<", ">>>"];

// =============================================================================
// Concurrency and budgets
// =============================================================================

/// Ceiling on concurrent per-algorithm client invocations within one probe.
/// Independent from the per-port pool; the two must never be merged.
pub const MAX_CONCURRENT_ALGORITHM_TESTS: usize = 3;

/// Ceiling on concurrent per-port probes inside a port-scan workflow
pub const MAX_CONCURRENT_PORT_PROBES: usize = 3;

/// Concurrency of the TCP connect sweep used for port discovery
pub const PORT_SWEEP_CONCURRENCY: usize = 16;

/// Default budget for a single (host, port) probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Connect timeout of the port discovery sweep
pub const DEFAULT_SWEEP_CONNECT_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Grace added on top of the caller budget before the whole run is escalated
/// as a fatal timeout (covers process spawn/teardown overhead).
pub const RUN_BUDGET_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// External client environment
// =============================================================================

/// Library search path variable pointed at the provider directory so the
/// client binary can load the quantum-capable provider module.
pub const LIBRARY_PATH_ENV: &str = "LD_LIBRARY_PATH";

/// Candidate TLS ports offered to the discovery sweep when the caller does
/// not supply an explicit port list
pub const DEFAULT_TLS_PORTS: [u16; 8] = [443, 465, 587, 636, 853, 993, 995, 8443];
