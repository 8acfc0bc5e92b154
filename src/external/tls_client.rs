// openssl s_client integration
// Spawns the external, quantum-capable TLS client and captures its combined
// stdout/stderr trace under a deadline with cooperative cancellation.

use crate::constants::{
    LIBRARY_PATH_ENV, MARKER_FINISHED, MARKER_SERVER_HELLO, MARKER_VERIFY_RETURN,
    PEM_END_CERTIFICATE,
};
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Location of the client binary and its provider module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsClientConfig {
    /// Path or name of the openssl binary
    pub command: String,
    /// Directory holding the quantum-capable provider module; also exported
    /// as the library search path for every invocation
    pub provider_path: String,
    /// Provider name passed to `-provider`
    pub provider_name: String,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        Self {
            command: "openssl".to_string(),
            provider_path: "/usr/local/lib/ossl-modules".to_string(),
            provider_name: "oqsprovider".to_string(),
        }
    }
}

/// One planned client invocation.
///
/// `curves` is either a single group name or a colon-separated list (batch
/// mode). Extra environment entries carry the legacy codepoint variables for
/// single-algorithm attempts; batched lists never set them.
#[derive(Debug, Clone)]
pub struct ClientInvocation {
    pub host: String,
    pub port: u16,
    pub curves: String,
    pub showcerts: bool,
    pub env: Vec<(String, String)>,
}

impl ClientInvocation {
    /// KEM/group test: handshake trace via `-msg`
    pub fn kem_test(host: &str, port: u16, curves: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            curves: curves.to_string(),
            showcerts: false,
            env: Vec::new(),
        }
    }

    /// Certificate test: `-showcerts`, no `-msg`
    pub fn certificate_test(host: &str, port: u16, curves: &str) -> Self {
        Self {
            showcerts: true,
            ..Self::kem_test(host, port, curves)
        }
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.push((name.to_string(), value.to_string()));
        self
    }

    /// Markers whose joint presence means the trace is complete enough to
    /// stop reading early. Certificate captures run without `-msg`, so the
    /// end of the chain dump plus the verify summary stand in for "Finished".
    fn completion_markers(&self) -> &'static [&'static str] {
        if self.showcerts {
            &[PEM_END_CERTIFICATE, MARKER_VERIFY_RETURN]
        } else {
            &[MARKER_SERVER_HELLO, MARKER_FINISHED]
        }
    }
}

/// Captured output of one client invocation.
///
/// A timed-out or cancelled capture still carries whatever trace was read; a
/// partial trace may already contain a usable ServerHello and is never
/// discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapture {
    pub transcript: String,
    pub timed_out: bool,
    pub cancelled: bool,
    /// True when reading stopped because all completion markers were seen
    pub early_exit: bool,
    pub exit_code: Option<i32>,
}

/// Wrapper around the external TLS client binary
#[derive(Debug, Clone)]
pub struct TlsClientRunner {
    config: TlsClientConfig,
}

impl TlsClientRunner {
    pub fn new(config: TlsClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TlsClientConfig {
        &self.config
    }

    /// Assemble the argument vector for an invocation.
    ///
    /// Deterministic template; malformed arguments silently degrade results
    /// rather than erroring, so the layout here is bit-relevant:
    /// `s_client -curves L -connect H:P -provider-path D -provider N
    /// -provider default [-msg | -showcerts [-servername H]]`.
    pub fn build_args(&self, invocation: &ClientInvocation) -> Vec<String> {
        let mut args = vec![
            "s_client".to_string(),
            "-curves".to_string(),
            invocation.curves.clone(),
            "-connect".to_string(),
            format!("{}:{}", invocation.host, invocation.port),
            "-provider-path".to_string(),
            self.config.provider_path.clone(),
            "-provider".to_string(),
            self.config.provider_name.clone(),
            "-provider".to_string(),
            "default".to_string(),
        ];

        if invocation.showcerts {
            args.push("-showcerts".to_string());
            // SNI for name-based virtual hosts; meaningless for IP literals
            if invocation.host.parse::<IpAddr>().is_err() {
                args.push("-servername".to_string());
                args.push(invocation.host.clone());
            }
        } else {
            args.push("-msg".to_string());
        }

        args
    }

    /// Run one invocation and capture its combined output as text.
    pub async fn run(
        &self,
        invocation: &ClientInvocation,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<ClientCapture, ProbeError> {
        validate_invocation(invocation)?;

        let args = self.build_args(invocation);
        debug!(command = %self.config.command, ?args, curves = %invocation.curves, "spawning TLS client");

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&args)
            .env(LIBRARY_PATH_ENV, &self.config.provider_path)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        capture_command(
            &self.config.command,
            cmd,
            invocation.completion_markers(),
            budget,
            cancel,
        )
        .await
    }
}

/// Spawn a command and capture its combined stdout/stderr as text.
///
/// Both streams are consumed line-by-line concurrently (a full pipe buffer
/// on either side must never deadlock the other). The child is killed, not
/// abandoned, on deadline, on cancellation, and on early exit once the
/// completion markers are all present in the transcript.
pub(crate) async fn capture_command(
    program: &str,
    mut cmd: Command,
    markers: &[&str],
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<ClientCapture, ProbeError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ProbeError::ProcessLaunch {
        program: program.to_string(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ProbeError::Other("child stdout pipe unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ProbeError::Other("child stderr pipe unavailable".to_string()))?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;

    let mut capture = ClientCapture::default();

    let deadline = tokio::time::sleep(budget);
    tokio::pin!(deadline);

    loop {
        if stdout_done && stderr_done {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                capture.cancelled = true;
                break;
            }
            _ = &mut deadline => {
                capture.timed_out = true;
                break;
            }
            line = stdout_lines.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(l)) => push_line(&mut capture.transcript, &l),
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        warn!(error = %e, "stdout read error");
                        stdout_done = true;
                    }
                }
            }
            line = stderr_lines.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(l)) => push_line(&mut capture.transcript, &l),
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        warn!(error = %e, "stderr read error");
                        stderr_done = true;
                    }
                }
            }
        }

        if !capture.transcript.is_empty() && markers.iter().all(|m| capture.transcript.contains(m)) {
            capture.early_exit = true;
            break;
        }
    }

    if stdout_done && stderr_done && !capture.cancelled && !capture.timed_out {
        // Natural EOF: reap and keep the exit code
        if let Ok(status) = child.wait().await {
            capture.exit_code = status.code();
        }
    } else {
        // Termination must happen before the caller observes the result;
        // Child::kill also reaps the process.
        if let Err(e) = child.kill().await {
            warn!(error = %e, "failed to kill TLS client");
        }
    }

    debug!(
        timed_out = capture.timed_out,
        cancelled = capture.cancelled,
        early_exit = capture.early_exit,
        bytes = capture.transcript.len(),
        "TLS client capture finished"
    );

    Ok(capture)
}

fn push_line(transcript: &mut String, line: &str) {
    transcript.push_str(line);
    transcript.push('\n');
}

/// Reject hostnames/ports that could smuggle arguments into the spawned
/// process (CWE-78). The external client sees these verbatim.
fn validate_invocation(invocation: &ClientInvocation) -> Result<(), ProbeError> {
    if invocation.port == 0 {
        return Err(ProbeError::InvalidInput {
            message: "port must be non-zero".to_string(),
        });
    }
    if invocation.host.is_empty() || invocation.host.len() > 253 {
        return Err(ProbeError::InvalidInput {
            message: format!("invalid hostname '{}'", invocation.host),
        });
    }
    let host_ok = invocation
        .host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
    if !host_ok {
        return Err(ProbeError::InvalidInput {
            message: format!("invalid hostname '{}'", invocation.host),
        });
    }
    let curves_ok = !invocation.curves.is_empty()
        && invocation
            .curves
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'));
    if !curves_ok {
        return Err(ProbeError::InvalidInput {
            message: format!("invalid curve list '{}'", invocation.curves),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> TlsClientRunner {
        TlsClientRunner::new(TlsClientConfig {
            command: "openssl".to_string(),
            provider_path: "/opt/oqs/lib".to_string(),
            provider_name: "oqsprovider".to_string(),
        })
    }

    #[test]
    fn test_kem_args_template() {
        let inv = ClientInvocation::kem_test("example.com", 443, "X25519MLKEM768:mlkem768");
        let args = runner().build_args(&inv);
        assert_eq!(
            args,
            vec![
                "s_client",
                "-curves",
                "X25519MLKEM768:mlkem768",
                "-connect",
                "example.com:443",
                "-provider-path",
                "/opt/oqs/lib",
                "-provider",
                "oqsprovider",
                "-provider",
                "default",
                "-msg",
            ]
        );
    }

    #[test]
    fn test_certificate_args_add_showcerts_and_sni() {
        let inv = ClientInvocation::certificate_test("example.com", 8443, "mlkem768");
        let args = runner().build_args(&inv);
        assert!(args.contains(&"-showcerts".to_string()));
        assert!(!args.contains(&"-msg".to_string()));
        let pos = args.iter().position(|a| a == "-servername").unwrap();
        assert_eq!(args[pos + 1], "example.com");
    }

    #[test]
    fn test_certificate_args_skip_sni_for_ip_literal() {
        let inv = ClientInvocation::certificate_test("192.0.2.10", 443, "mlkem768");
        let args = runner().build_args(&inv);
        assert!(!args.contains(&"-servername".to_string()));
    }

    #[test]
    fn test_legacy_env_attached_per_invocation() {
        let inv = ClientInvocation::kem_test("example.com", 443, "frodo640aes")
            .with_env("OQS_CODEPOINT_FRODO640AES", "560");
        assert_eq!(
            inv.env,
            vec![("OQS_CODEPOINT_FRODO640AES".to_string(), "560".to_string())]
        );
    }

    #[test]
    fn test_validation_rejects_hostile_input() {
        let inv = ClientInvocation::kem_test("example.com; rm -rf /", 443, "mlkem768");
        assert!(validate_invocation(&inv).is_err());
        let inv = ClientInvocation::kem_test("example.com", 0, "mlkem768");
        assert!(validate_invocation(&inv).is_err());
        let inv = ClientInvocation::kem_test("example.com", 443, "mlkem768 -evil");
        assert!(validate_invocation(&inv).is_err());
    }

    #[test]
    fn test_completion_markers_per_mode() {
        let inv = ClientInvocation::kem_test("example.com", 443, "mlkem768");
        assert_eq!(
            inv.completion_markers(),
            &[MARKER_SERVER_HELLO, MARKER_FINISHED]
        );
        let cert_inv = ClientInvocation::certificate_test("example.com", 443, "mlkem768");
        assert_eq!(
            cert_inv.completion_markers(),
            &[PEM_END_CERTIFICATE, MARKER_VERIFY_RETURN]
        );
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_capture_merges_both_streams() {
        let cancel = CancellationToken::new();
        let capture = capture_command(
            "/bin/sh",
            sh("echo out-line; echo err-line 1>&2"),
            &["never-seen"],
            Duration::from_secs(5),
            &cancel,
        )
        .await
        .unwrap();

        assert!(capture.transcript.contains("out-line"));
        assert!(capture.transcript.contains("err-line"));
        assert!(!capture.timed_out);
        assert_eq!(capture.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_capture_exits_early_on_markers() {
        // Prints the markers and then hangs; early exit must kill it well
        // before the 30s sleep.
        let cancel = CancellationToken::new();
        let start = std::time::Instant::now();
        let capture = capture_command(
            "/bin/sh",
            sh("echo ServerHello; echo Finished 1>&2; sleep 30"),
            &["ServerHello", "Finished"],
            Duration::from_secs(10),
            &cancel,
        )
        .await
        .unwrap();

        assert!(capture.early_exit);
        assert!(start.elapsed() < Duration::from_secs(9));
        assert!(capture.transcript.contains("ServerHello"));
    }

    #[tokio::test]
    async fn test_capture_deadline_keeps_partial_transcript() {
        let cancel = CancellationToken::new();
        let capture = capture_command(
            "/bin/sh",
            sh("echo partial; sleep 30"),
            &["never-seen"],
            Duration::from_millis(300),
            &cancel,
        )
        .await
        .unwrap();

        assert!(capture.timed_out);
        assert!(capture.transcript.contains("partial"));
    }

    #[tokio::test]
    async fn test_capture_honors_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let capture = capture_command(
            "/bin/sh",
            sh("sleep 30"),
            &["never-seen"],
            Duration::from_secs(10),
            &cancel,
        )
        .await
        .unwrap();

        assert!(capture.cancelled);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_launch_failure() {
        let cancel = CancellationToken::new();
        let err = capture_command(
            "/nonexistent/qsprobe-client",
            Command::new("/nonexistent/qsprobe-client"),
            &[],
            Duration::from_secs(1),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProbeError::ProcessLaunch { .. }));
    }
}
