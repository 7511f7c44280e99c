use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use proxy_vet::{
    logging,
    proxy::{
        config::{DEFAULT_MAX_CONCURRENT, DEFAULT_PROBE_URL, DEFAULT_TIMEOUT_SECS},
        load_addresses, save_addresses, HttpProbe, ProxyRecord, RunConfig,
        RunController, RunReport, SortColumn,
    },
    tui::ProxyCheckerApp,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// A bounded-concurrency proxy list validator
#[derive(Parser)]
#[command(name = "proxy-vet")]
#[command(about = "A bounded-concurrency proxy list validator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Proxy scheme (http, socks4, socks5)
    #[arg(short = 't', long, default_value = "http")]
    scheme: String,
    /// Number of concurrent probes; empty uses the default
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_CONCURRENT.to_string())]
    threads: String,
    /// Timeout in seconds for each probe
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS.to_string())]
    timeout: String,
    /// URL requested through each proxy
    #[arg(long, default_value = DEFAULT_PROBE_URL)]
    probe_url: String,
    /// Output file for good proxies
    #[arg(short, long)]
    good: Option<PathBuf>,
    /// Output file for bad proxies
    #[arg(short, long)]
    bad: Option<PathBuf>,
}

impl RunArgs {
    fn config(&self) -> Result<RunConfig> {
        let config = RunConfig::from_inputs(&self.scheme, &self.timeout, &self.threads)?
            .with_probe_url(self.probe_url.clone());
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check every proxy in a file and print the results
    Check {
        /// Input file with one proxy address per line
        input: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        /// Column to sort the printed results by (scheme, address, latency, status)
        #[arg(long, default_value = "latency")]
        sort: String,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Write a JSON report of the run and all records
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Start the interactive result table
    Tui {
        /// Input file with one proxy address per line
        input: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        /// Write logs to this file while the TUI is open
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run: &'a RunReport,
    records: &'a [ProxyRecord],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            input,
            run,
            sort,
            desc,
            report,
        } => {
            logging::init_stderr(cli.verbose);
            let config = run.config()?;
            let column: SortColumn = sort.parse().map_err(|e: String| anyhow!(e))?;

            let addresses = load_addresses(&input)?;
            let controller = RunController::new(HttpProbe);
            controller.load(addresses, config.scheme).await?;

            println!(
                "Loaded {} proxies from {:?}",
                controller.aggregator().tally().await.total,
                input
            );
            println!(
                "Checking with {} threads, timeout: {}s",
                config.max_concurrent,
                config.timeout.as_secs()
            );
            println!("Probe URL: {}", config.probe_url);
            println!();

            let handle = controller.start(config).await?;

            // Ctrl-C stops admitting new probes; admitted ones still finish
            let cancel = handle.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after in-flight probes");
                    cancel.cancel();
                }
            });

            let summary = handle.wait().await?;
            controller.aggregator().sort_by(column, !desc).await;
            let records = controller.aggregator().rows().await;

            for record in &records {
                println!(
                    "{:<8} {:<32} {:>10} {}",
                    record.scheme.label(),
                    record.address,
                    record.latency_display(),
                    record.status
                );
            }
            println!();
            println!(
                "{}: {} good, {} bad, {} pending ({}ms)",
                summary.state,
                summary.reachable,
                summary.unreachable,
                summary.pending,
                summary.elapsed_ms
            );

            let exports = controller.exports().await?;
            if let Some(good_path) = run.good {
                let good = exports.reachable_addresses();
                save_addresses(&good, &good_path)?;
                println!("Saved {} good proxies to {:?}", good.len(), good_path);
            }
            if let Some(bad_path) = run.bad {
                let bad = exports.unreachable_addresses();
                save_addresses(&bad, &bad_path)?;
                println!("Saved {} bad proxies to {:?}", bad.len(), bad_path);
            }

            if let Some(report_path) = report {
                let json = serde_json::to_string_pretty(&JsonReport {
                    run: &summary,
                    records: &records,
                })?;
                std::fs::write(&report_path, json)
                    .with_context(|| format!("failed to write report {:?}", report_path))?;
                info!(path = ?report_path, "report written");
                println!("Saved report to {:?}", report_path);
            }
        }
        Commands::Tui {
            input,
            run,
            log_file,
        } => {
            logging::init_file(cli.verbose, log_file.as_deref())?;
            let config = run.config()?;

            let addresses = load_addresses(&input)?;
            let controller = RunController::new(HttpProbe);
            controller.load(addresses, config.scheme).await?;

            let mut app = ProxyCheckerApp::new(controller, config, run.good, run.bad);
            app.run().await?;
        }
    }

    Ok(())
}
