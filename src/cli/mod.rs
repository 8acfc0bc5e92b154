// CLI module - Command line interface and argument parsing
// Licensed under GPL-3.0

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// qsprobe - Quantum-safe TLS capability probe
///
/// Default mode tests a single host:port for post-quantum key exchange;
/// `--scan` fans the probe out across open ports; `--certs` classifies the
/// presented certificate chain instead.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "qsprobe", author, version)]
#[command(about = "Quantum-safe TLS capability probe", long_about = None)]
pub struct Args {
    /// Target host (host or host:port)
    #[arg(value_name = "HOST")]
    pub target: Option<String>,

    /// Port to test (default 443 unless part of HOST)
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Explicit port list for --scan mode (skips discovery)
    #[arg(long = "ports", value_name = "PORTS", value_delimiter = ',')]
    pub ports: Vec<u16>,

    /// Port-scan mode: probe every open TLS port of the host
    #[arg(long = "scan")]
    pub scan: bool,

    /// Certificate mode: classify the presented chain instead of the
    /// negotiated group
    #[arg(long = "certs")]
    pub certs: bool,

    /// Explicit algorithm names to test one-by-one (collect-all policy)
    #[arg(long = "algorithms", value_name = "NAMES", value_delimiter = ',')]
    pub algorithms: Vec<String>,

    /// Overall time budget in milliseconds
    #[arg(long = "timeout", value_name = "MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Algorithm catalog CSV (name,group_id,enabled,legacy_env_var,requires_legacy_env)
    #[arg(long = "catalog", value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Path to the quantum-capable openssl binary
    #[arg(long = "openssl-path", value_name = "PATH", default_value = "openssl")]
    pub openssl_path: String,

    /// Directory holding the provider module (also used as library path)
    #[arg(
        long = "provider-path",
        value_name = "DIR",
        default_value = "/usr/local/lib/ossl-modules"
    )]
    pub provider_path: String,

    /// Provider name passed to the client
    #[arg(long = "provider", value_name = "NAME", default_value = "oqsprovider")]
    pub provider_name: String,

    /// Emit results as JSON instead of the human report
    #[arg(long = "json")]
    pub json: bool,

    /// Suppress informational output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Args {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Split the target into (host, port), honoring an explicit --port and a
    /// host:port spelling, defaulting to 443.
    pub fn host_and_port(&self) -> Option<(String, u16)> {
        let raw = self.target.as_deref()?;
        let (host, parsed_port) = match raw.rsplit_once(':') {
            Some((host, port_str)) if !host.is_empty() => match port_str.parse::<u16>() {
                Ok(port) => (host.to_string(), Some(port)),
                Err(_) => (raw.to_string(), None),
            },
            _ => (raw.to_string(), None),
        };
        let port = self.port.or(parsed_port).unwrap_or(443);
        Some((host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_and_port_spellings() {
        let mut args = Args::default();
        args.target = Some("example.com:8443".to_string());
        assert_eq!(args.host_and_port(), Some(("example.com".to_string(), 8443)));

        args.target = Some("example.com".to_string());
        assert_eq!(args.host_and_port(), Some(("example.com".to_string(), 443)));

        args.port = Some(993);
        assert_eq!(args.host_and_port(), Some(("example.com".to_string(), 993)));
    }

    #[test]
    fn test_no_target() {
        let args = Args::default();
        assert!(args.host_and_port().is_none());
    }
}
