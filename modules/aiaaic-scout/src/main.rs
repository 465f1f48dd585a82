use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aiaaic_client::{ClientOptions, PageClient};
use aiaaic_common::typos::{annotate, correction_for};
use aiaaic_common::Config;
use aiaaic_ledger::{
    check, deduplicate, incomplete, without_detail_url, QualityMetrics, RecordStore,
};
use aiaaic_scout::{CancelFlag, ScrapeMode, Scraper, SheetSource};

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "aiaaic-scout", about = "Scrape AIAAIC incident pages into a JSONL ledger")]
struct Cli {
    /// Directory holding the ledger and error log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Concurrent page fetches
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape detail pages for incidents from the sheet
    Scrape(ScrapeArgs),
    /// Re-scrape one incident
    Single { id: String },
    /// Report duplicates and unreadable lines
    Check,
    /// Keep one record per incident id
    Dedupe {
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarise the error log
    Errors,
    /// List scraped records missing description or sources
    Incomplete,
    /// List records without a detail page URL
    NoUrl,
    /// Data-quality figures for the ledger
    Metrics,
    /// Write the ledger as a JSON array
    ExportJson {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("mode")
        .multiple(false)
        .args(["force", "retry_errors", "update", "ids", "rescrape_incomplete"])
))]
struct ScrapeArgs {
    /// Scrape every incident, including ones already in the ledger
    #[arg(long)]
    force: bool,

    /// Retry incidents in the error log
    #[arg(long)]
    retry_errors: bool,

    /// Re-scrape every incident already in the ledger
    #[arg(long)]
    update: bool,

    /// Re-scrape only these ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,

    /// Re-scrape records missing description or sources
    #[arg(long)]
    rescrape_incomplete: bool,

    /// Stop after this many incidents
    #[arg(long)]
    sample: Option<usize>,
}

impl ScrapeArgs {
    fn mode(&self) -> ScrapeMode {
        if self.force {
            ScrapeMode::Force
        } else if self.retry_errors {
            ScrapeMode::RetryErrors
        } else if self.update {
            ScrapeMode::Update
        } else if !self.ids.is_empty() {
            ScrapeMode::Targeted(targets(&self.ids))
        } else if self.rescrape_incomplete {
            ScrapeMode::RescrapeIncomplete
        } else {
            ScrapeMode::Resume
        }
    }
}

fn targets(ids: &[String]) -> HashSet<String> {
    ids.iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "aiaaic=debug" } else { "aiaaic=info" };
    let filter = EnvFilter::from_default_env().add_directive(level.parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(n) = cli.concurrency {
        config.concurrency = n.max(1);
    }
    let store = Arc::new(RecordStore::from_config(&config));

    match cli.command {
        Command::Scrape(args) => scrape(&config, store, args.mode(), args.sample).await,
        Command::Single { id } => {
            scrape(&config, store, ScrapeMode::Targeted(targets(&[id])), None).await
        }
        Command::Check => {
            let report = check(&store)?;
            println!("{report}");
            for group in &report.duplicate_groups {
                println!(
                    "  {} x{}  keep line {} (score {})  {}",
                    group.aiaaic_id, group.count, group.best_line, group.best_score, group.headline
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Dedupe { dry_run } => {
            let outcome = deduplicate(&store, dry_run)?;
            let verb = if dry_run { "Would remove" } else { "Removed" };
            println!("{verb} {} duplicate records; {} ids kept", outcome.removed, outcome.kept);
            Ok(ExitCode::SUCCESS)
        }
        Command::Errors => {
            let errors = store.errors()?;
            let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
            for e in &errors {
                *by_type.entry(e.error_type.as_str()).or_default() += 1;
            }
            println!("{} logged errors", errors.len());
            for (error_type, count) in by_type {
                println!("  {error_type:<12} {count}");
            }
            for e in &errors {
                println!("{}  {}  {}", e.aiaaic_id, e.error_type, e.error_message);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Incomplete => {
            let records = incomplete(&store.incidents()?);
            println!("{} incomplete records", records.len());
            for r in &records {
                println!("{}  missing {}  {}", r.aiaaic_id, r.missing.join(", "), r.headline);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::NoUrl => {
            let incidents = store.incidents()?;
            let missing = without_detail_url(&incidents);
            println!("{} records without a detail page URL", missing.len());
            for i in missing {
                println!("{}  {}", i.aiaaic_id, i.headline);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Metrics => {
            let incidents = store.incidents()?;
            let metrics = QualityMetrics::compute(&incidents);
            println!("{metrics}");
            for i in incidents.iter().filter(|i| metrics.typo_ids.contains(&i.aiaaic_id)) {
                for issue in i.issues.iter().filter(|v| correction_for(v).is_some()) {
                    println!("  {}  {}", i.aiaaic_id, annotate(issue));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::ExportJson { out } => {
            let out = out.unwrap_or_else(|| config.data_dir.join("aiaaic_incidents.json"));
            let count = store.export_json(&out)?;
            println!("Exported {count} incidents to {}", out.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn scrape(
    config: &Config,
    store: Arc<RecordStore>,
    mode: ScrapeMode,
    sample: Option<usize>,
) -> Result<ExitCode> {
    config.log_summary();

    let client = PageClient::new(&ClientOptions {
        concurrency: config.concurrency,
        timeout: config.request_timeout,
        user_agent: config.user_agent.clone(),
    })?;
    let source = SheetSource::new(client.clone(), config.sheet_url.as_str());

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight incidents");
            on_interrupt.cancel();
        }
    });

    let scraper = Scraper::new(Arc::new(client), store)
        .with_concurrency(config.concurrency)
        .with_cancel_flag(cancel);

    info!(%mode, "Scrape requested");
    let report = scraper.run_from_source(&source, &mode, sample).await?;
    println!("{}", report.stats);

    if report.cancelled {
        println!("Interrupted. Run again to resume.");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if report.is_degraded() {
        println!(
            "{} incidents failed; see {} or rerun with --retry-errors",
            report.stats.failed,
            scraper.store().errors_path().display()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
