use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;

use nmos_port_explorer::config::{PortMode, ScanSettings};
use nmos_port_explorer::probe::{FailurePolicy, HttpProber, ProberConfig};
use nmos_port_explorer::scanner::{self, ScanEvent};
use nmos_port_explorer::types::{Protocol, ScanOutcome, ScanResults};
use nmos_port_explorer::{logging, ports, report, server, target};

/// nmos-port-explorer: find NMOS node and registry APIs across the ports of one host.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nmos-port-explorer",
    version,
    about = "Find NMOS node and registry HTTP APIs across the ports of one host.",
    long_about = None,
    after_help = "Only scan hosts you are authorized to test."
)]
struct Cli {
    /// Target IP address or hostname.
    #[arg(required_unless_present = "serve")]
    target: Option<String>,

    /// Comma separated port list (e.g. 80,443,8080). Defaults to common NMOS ports.
    #[arg(long, conflicts_with_all = ["range_start", "range_end"])]
    ports: Option<String>,

    /// First port of an inclusive range (at most 10000 ports).
    #[arg(long = "range-start", requires = "range_end")]
    range_start: Option<String>,

    /// Last port of an inclusive range.
    #[arg(long = "range-end", requires = "range_start")]
    range_end: Option<String>,

    #[arg(long, value_enum, default_value_t = Protocol::Http)]
    protocol: Protocol,

    /// API root prefix placed after the base path.
    #[arg(long, default_value = "/x-nmos")]
    endpoint: String,

    /// Comma separated base path prefixes tried in order (empty = none).
    #[arg(long = "base-path", default_value = "")]
    base_path: String,

    /// Per-request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 100)]
    timeout_ms: u64,

    /// Delay between requests of one worker in milliseconds.
    #[arg(long = "interval-ms", default_value_t = 0)]
    interval_ms: u64,

    /// Number of ports explored concurrently.
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// How non-timeout network failures are classified.
    #[arg(long = "failure-policy", value_enum, default_value_t = FailurePolicy::Strict)]
    failure_policy: FailurePolicy,

    /// Send this Origin and treat responses that do not allow it as CORS blocked.
    #[arg(long = "cors-origin")]
    cors_origin: Option<String>,

    /// Accept invalid TLS certificates (self-signed nodes over https).
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Confirm authorization to scan a target outside local address ranges.
    #[arg(long = "allow-public", default_value_t = false)]
    allow_public: bool,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Serve the JSON control API on this address instead of scanning once.
    #[arg(long)]
    serve: Option<String>,

    /// Debug level logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> ScanSettings {
        let mut settings = ScanSettings {
            protocol: self.protocol,
            endpoint: self.endpoint.clone(),
            base_path: self.base_path.clone(),
            timeout_ms: self.timeout_ms,
            interval_ms: self.interval_ms,
            concurrency: self.concurrency,
            ..ScanSettings::default()
        };
        if let (Some(start), Some(end)) = (&self.range_start, &self.range_end) {
            settings.port_mode = PortMode::Range;
            settings.port_range_start = start.clone();
            settings.port_range_end = end.clone();
        } else if let Some(list) = &self.ports {
            settings.port_list = list.clone();
        }
        settings
    }

    fn prober_config(&self) -> ProberConfig {
        ProberConfig {
            failure_policy: self.failure_policy,
            cors_origin: self.cors_origin.clone(),
            accept_invalid_certs: self.insecure,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let prober = HttpProber::new(cli.prober_config())?;

    if let Some(bind) = cli.serve.as_deref() {
        println!("Serving control API on http://{bind}/api (Ctrl+C to stop)");
        tokio::select! {
            res = server::spawn_server(bind, prober) => res?,
            _ = tokio::signal::ctrl_c() => {}
        }
        return Ok(());
    }

    let Some(raw_target) = cli.target.as_deref() else {
        bail!("a target is required unless --serve is given");
    };
    let settings = cli.settings();
    let request = settings.to_request(raw_target)?;
    target::ensure_scan_allowed(&request.target, cli.allow_public)?;

    println!("nmos-port-explorer configuration:");
    println!("  target       : {}", request.target);
    println!("  protocol     : {}", request.protocol);
    println!("  ports        : {} port(s)", request.ports.len());
    println!("  base paths   : {:?}", request.base_paths);
    println!("  endpoint     : {}", request.endpoint);
    println!("  timeout_ms   : {}", settings.timeout_ms);
    println!("  interval_ms  : {}", settings.interval_ms);
    println!("  concurrency  : {}", request.concurrency);

    let requested_list = ports::merge_port_list("", &request.ports);
    let (handle, mut events) = scanner::start_scan(Arc::new(prober), request);

    let stopper = handle.state().cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested; waiting for in-flight probes");
            stopper.cancel();
        }
    });

    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::PortFinished { port, results } => {
                for r in &results {
                    println!(
                        "  found {:>5}  {:<28}  {}",
                        port,
                        r.api_type.as_deref().unwrap_or("-"),
                        r.status
                    );
                }
            }
            ScanEvent::Finished { .. } => break,
            ScanEvent::Started { .. } | ScanEvent::Progress { .. } => {}
        }
    }

    let results = handle.join().await?;
    print_results_table(&results);

    let discovered = report::discovered_ports(&results.entries);
    if !discovered.is_empty() {
        println!(
            "\nPort list with discovered ports: {}",
            ports::merge_port_list(&requested_list, &discovered)
        );
    }

    if let Some(path) = cli.output.as_deref() {
        write_results_json(path, &results)?;
        println!("Wrote JSON results to {}", path.display());
    }

    Ok(())
}

fn print_results_table(results: &ScanResults) {
    match results.outcome {
        ScanOutcome::Completed => println!("\nExploration completed"),
        ScanOutcome::Stopped => println!("\nExploration stopped by user"),
    }
    println!(
        "Completed {} / {} checks ({}%)",
        results.completed,
        results.total,
        results.percent()
    );

    let groups = report::group_results(&results.entries);
    if groups.is_empty() {
        println!("No NMOS endpoints discovered.");
        return;
    }
    println!("{} port(s) discovered\n", groups.len());

    let mut api_w = "api type".len();
    let mut ver_w = "version".len();
    for r in &results.entries {
        api_w = api_w.max(r.api_type.as_deref().unwrap_or("-").len());
        ver_w = ver_w.max(r.versions.join(", ").chars().count().min(40));
    }
    let status_w = "REACHABLE_CORS_BLOCKED".len();

    println!(
        "{:>5}  {:<5}  {:<api_w$}  {:<ver_w$}  {:<status_w$}  {:<11}  url",
        "port", "proto", "api type", "version", "status", "probability",
    );
    println!(
        "{:->5}  {:-<5}  {:-<api_w$}  {:-<ver_w$}  {:-<status_w$}  {:-<11}  {:-<3}",
        "", "", "", "", "", "", "",
    );
    for group in &groups {
        for (idx, r) in group.results.iter().enumerate() {
            let (port, proto, prob) = if idx == 0 {
                (
                    group.port.to_string(),
                    group.protocol.as_str().to_uppercase(),
                    group.probability.to_string(),
                )
            } else {
                (String::new(), String::new(), String::new())
            };
            let versions: String = r.versions.join(", ").chars().take(40).collect();
            println!(
                "{:>5}  {:<5}  {:<api_w$}  {:<ver_w$}  {:<status_w$}  {:<11}  {}",
                port,
                proto,
                r.api_type.as_deref().unwrap_or("-"),
                versions,
                r.status.as_str(),
                prob,
                r.url,
            );
        }
    }
}

fn write_results_json(path: &std::path::Path, results: &ScanResults) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
