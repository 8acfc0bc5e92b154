// qsprobe - Quantum-safe TLS capability probe
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use qsprobe::catalog::AlgorithmCatalog;
use qsprobe::certificates::{CertificateAnalyzer, CertificateProbe};
use qsprobe::cli::Args;
use qsprobe::constants::RUN_BUDGET_GRACE;
use qsprobe::error::ProbeError;
use qsprobe::external::{TlsClientConfig, TlsClientRunner};
use qsprobe::probe::{ProbeOrchestrator, ProbeTarget};
use qsprobe::scanner::{PortScanProbe, TcpConnectScanner};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let args = Args::parse();

    let Some((host, port)) = args.host_and_port() else {
        anyhow::bail!("no target given; pass HOST or HOST:PORT");
    };

    // Algorithm catalog: caller-supplied CSV wins over the builtin set
    let catalog = match &args.catalog {
        Some(path) => AlgorithmCatalog::from_csv_file(path)?,
        None => AlgorithmCatalog::builtin(),
    };
    info!(algorithms = catalog.enabled().len(), "catalog loaded");

    let runner = Arc::new(TlsClientRunner::new(TlsClientConfig {
        command: args.openssl_path.clone(),
        provider_path: args.provider_path.clone(),
        provider_name: args.provider_name.clone(),
    }));
    let orchestrator = ProbeOrchestrator::new(Arc::new(catalog), Arc::clone(&runner));

    // Ctrl-C flips the shared token; in-flight attempts stop cooperatively
    // and report whatever they captured.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling in-flight probes");
                cancel.cancel();
            }
        });
    }

    let budget = args.budget();
    // The per-attempt deadlines already fit inside the budget; the outer
    // timeout only catches a wedged run and escalates it as fatal.
    let run = run_mode(&args, &orchestrator, runner, &host, port, &cancel);
    match timeout(budget + RUN_BUDGET_GRACE, run).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout {
            duration: budget + RUN_BUDGET_GRACE,
        }
        .into()),
    }
}

async fn run_mode(
    args: &Args,
    orchestrator: &ProbeOrchestrator,
    runner: Arc<TlsClientRunner>,
    host: &str,
    port: u16,
    cancel: &CancellationToken,
) -> Result<()> {
    if args.scan {
        let scanner = Arc::new(TcpConnectScanner::default());
        let probe = PortScanProbe::new(orchestrator.clone(), scanner);
        let ports = if args.ports.is_empty() {
            None
        } else {
            Some(args.ports.clone())
        };
        let report = probe.run(host, ports, args.budget(), cancel).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", report.render());
        }
        return Ok(());
    }

    if args.certs {
        let probe = CertificateProbe::new(runner, CertificateAnalyzer::new());
        let result = probe
            .analyze_target(orchestrator.catalog(), host, port, args.budget(), cancel)
            .await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if result.succeeded {
            println!(
                "{} {}:{} {}",
                "+".green().bold(),
                host,
                port,
                result.message
            );
        } else {
            println!("{} {}:{} {}", "-".red().bold(), host, port, result.message);
        }
        return Ok(());
    }

    // Default single-target mode. An explicit --algorithms list switches to
    // the collect-all policy; otherwise the quick yes/no check runs.
    let outcome = if args.algorithms.is_empty() {
        orchestrator
            .is_quantum_safe(host, port, args.budget(), cancel)
            .await?
    } else {
        let target = ProbeTarget::new(host, port, args.budget())
            .with_algorithms(args.algorithms.clone());
        orchestrator.test_algorithms(&target, cancel).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if !args.quiet {
        println!(
            "\n{} {}",
            "Quantum-safe probe of".cyan().bold(),
            format!("{}:{}", host, port).green().bold()
        );
    }
    if outcome.succeeded {
        println!(
            "{} quantum-safe: {}",
            "+".green().bold(),
            outcome.summary.green()
        );
    } else {
        println!(
            "{} not quantum-safe: {}",
            "-".red().bold(),
            outcome.summary
        );
    }

    Ok(())
}
