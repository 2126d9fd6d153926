use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use rusty_invoice::Config;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rusty-invoice", version, about = "Extract and reconcile invoice tables from an xlsx workbook")]
struct Cli {
    /// Workbook to process (path or file:// URL).
    file: String,

    /// TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Glob pattern of the worksheet to read, overriding the configuration.
    #[arg(long)]
    sheet: Option<String>,

    /// Write the JSON report to this path.
    #[arg(long = "json-out")]
    json_out: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(sheet) = cli.sheet {
        config.sheet = Some(sheet);
    }

    let report = match rusty_invoice::run(&cli.file, &config) {
        Ok(report) => report,
        Err(error) => {
            tracing::error!(%error, "run halted");
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(path) = &cli.json_out {
        let json = report.to_json_pretty().context("failed to serialize report")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote report");
    } else {
        println!("{}", report.fob.combined_po);
        println!("{}", report.fob.combined_item);
        println!("total sqft: {}", report.fob.total_sqft);
        println!("total amount: {}", report.fob.total_amount);
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
