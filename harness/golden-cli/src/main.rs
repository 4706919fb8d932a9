use std::io::Write;

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use http_golden::{GoldenRecord, GoldenStore, RunConfig, serializer::indent_json};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "golden",
    version,
    about = "Inspect and validate golden HTTP response files"
)]
struct Cli {
    /// Testdata root (defaults to the configured `testdata_dir`)
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every record with its status, size and digest
    List,
    /// Print one record
    Show(ShowArgs),
    /// Parse every record and flag malformed or non-canonical ones
    Check,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Record name relative to the root, without the `.golden` extension
    name: String,
    #[arg(long)]
    headers_only: bool,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let root = match cli.dir {
        Some(dir) => dir,
        None => RunConfig::load()?.testdata_dir,
    };
    let store = GoldenStore::new(root);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::List => list(&store, &mut stdout)?,
        Command::Show(args) => show(&store, &args, &mut stdout)?,
        Command::Check => {
            let report = check(&store)?;
            writeln!(
                stdout,
                "golden: {} record(s) checked, {} invalid, {} warning(s)",
                report.checked,
                report.invalid.len(),
                report.warnings
            )?;
            if !report.invalid.is_empty() {
                bail!("invalid golden records: {}", report.invalid.join(", "));
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list(store: &GoldenStore, out: &mut impl Write) -> Result<()> {
    for name in store.list()? {
        let data = store.read(&name)?;
        let status = match GoldenRecord::parse(&data) {
            Ok(record) => record.status.as_u16().to_string(),
            Err(_) => "???".to_string(),
        };
        writeln!(
            out,
            "{name}\t{status}\t{}\t{}",
            data.len(),
            short_digest(&data)
        )?;
    }
    Ok(())
}

fn short_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..6])
}

fn show(store: &GoldenStore, args: &ShowArgs, out: &mut impl Write) -> Result<()> {
    let record = store
        .load(&args.name)
        .with_context(|| format!("failed to load golden record '{}'", args.name))?;
    out.write_all(&record.to_bytes(!args.headers_only))?;
    if !args.headers_only && !record.body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CheckReport {
    checked: usize,
    invalid: Vec<String>,
    warnings: usize,
}

fn check(store: &GoldenStore) -> Result<CheckReport> {
    let mut report = CheckReport::default();
    for name in store.list()? {
        report.checked += 1;
        let record = match store.load(&name) {
            Ok(record) => record,
            Err(err) => {
                warn!(%name, error = %err, "invalid golden record");
                report.invalid.push(name);
                continue;
            }
        };
        if !record.is_json() || record.body.is_empty() {
            continue;
        }
        match indent_json(&record.body) {
            Ok(indented) if indented == record.body.as_ref() => {}
            Ok(_) => {
                warn!(%name, "JSON body is not in indented form");
                report.warnings += 1;
            }
            Err(err) => {
                warn!(%name, error = %err, "JSON body does not decode");
                report.invalid.push(name);
            }
        }
    }
    info!(root = %store.root(), checked = report.checked, "golden check finished");
    Ok(report)
}
