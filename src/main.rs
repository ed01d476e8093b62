use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use rugby_ingest::config::Config;
use rugby_ingest::logging;
use rugby_ingest::observability::{self, metrics};
use rugby_ingest::pipeline::ingestion::classify_path;
use rugby_ingest::pipeline::processing::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use rugby_ingest::{AcceptancePolicy, Dataset, DatasetLoader, ResourceKind, SourcePayload};

#[derive(Parser)]
#[command(name = "rugby_ingest")]
#[command(about = "Load rugby competitions, teams and fixtures JSON into one canonical dataset")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $RUGBY_INGEST_CONFIG, then rugby_ingest.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a batch of payloads and report the snapshot and its diagnostics
    Load {
        /// Data directory laid out as competitions.json, teams.json, matches/...
        #[arg(long, conflicts_with_all = ["competitions", "teams", "matches"])]
        data_dir: Option<PathBuf>,
        /// competitions.json file
        #[arg(long)]
        competitions: Option<PathBuf>,
        /// teams.json file
        #[arg(long)]
        teams: Option<PathBuf>,
        /// Match files (repeatable); the competition is taken from the path
        #[arg(long)]
        matches: Vec<PathBuf>,
        /// Print the snapshot and diagnostics as JSON on stdout
        #[arg(long)]
        json: bool,
        /// Reject the snapshot if any diagnostic of this kind exists (repeatable)
        #[arg(long)]
        fail_on: Vec<DiagnosticKind>,
        /// Reject the snapshot if any diagnostic is an error
        #[arg(long)]
        fail_on_error: bool,
        /// Print Prometheus metrics after the load
        #[arg(long)]
        metrics: bool,
    },
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    dataset: &'a Dataset,
    diagnostics: &'a [Diagnostic],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Load {
            data_dir,
            competitions,
            teams,
            matches,
            json,
            fail_on,
            fail_on_error,
            metrics: print_metrics,
        } => {
            let handle = if print_metrics {
                Some(observability::install_prometheus()?)
            } else {
                None
            };

            let files = match data_dir {
                Some(dir) => discover(&dir).await?,
                None => explicit_files(competitions, teams, matches),
            };
            if files.is_empty() {
                bail!("Nothing to load: pass --data-dir or at least one of --competitions/--teams/--matches");
            }

            let payloads = read_payloads(&files).await?;
            let loader = DatasetLoader::new(config.loader.clone());
            let report = loader.load(&payloads);

            if json {
                let output = JsonOutput {
                    dataset: &report.dataset,
                    diagnostics: &report.diagnostics,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_summary(&report.dataset, &report.diagnostics);
            }

            let mut policy = AcceptancePolicy::reject_on(fail_on);
            if fail_on_error {
                policy = policy.with_severity_threshold(Severity::Error);
            }
            match report.accept(&policy) {
                Ok(dataset) => {
                    metrics::snapshot::published();
                    info!(
                        "Snapshot accepted: {} competitions, {} teams, {} matches",
                        dataset.competitions().count(),
                        dataset.teams().count(),
                        dataset.matches().len()
                    );
                }
                Err(e) => {
                    if let Some(handle) = &handle {
                        println!("{}", handle.render());
                    }
                    return Err(e).context("Snapshot rejected by acceptance policy");
                }
            }

            if let Some(handle) = handle {
                println!("{}", handle.render());
            }
        }
    }

    Ok(())
}

/// A file to load with its resource kind and competition hint
struct InputFile {
    path: PathBuf,
    resource: ResourceKind,
    competition_hint: Option<String>,
}

fn explicit_files(competitions: Option<PathBuf>, teams: Option<PathBuf>, matches: Vec<PathBuf>) -> Vec<InputFile> {
    let mut files = Vec::new();
    if let Some(path) = competitions {
        files.push(InputFile {
            path,
            resource: ResourceKind::Competitions,
            competition_hint: None,
        });
    }
    if let Some(path) = teams {
        files.push(InputFile {
            path,
            resource: ResourceKind::Teams,
            competition_hint: None,
        });
    }
    for path in matches {
        let competition_hint = match classify_path(&path) {
            Some((ResourceKind::Matches, hint)) => hint,
            _ => path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
        };
        files.push(InputFile {
            path,
            resource: ResourceKind::Matches,
            competition_hint,
        });
    }
    files
}

/// Walk a data directory and pick up every file the upstream layout defines.
async fn discover(dir: &Path) -> anyhow::Result<Vec<InputFile>> {
    let mut pending = vec![dir.to_path_buf()];
    let mut found = Vec::new();

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("Failed to read directory {}", current.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            match classify_path(&path) {
                Some((resource, competition_hint)) => found.push(InputFile {
                    path,
                    resource,
                    competition_hint,
                }),
                None => debug!("Skipping {}", path.display()),
            }
        }
    }

    // Competitions, then teams, then matches; paths sorted for a stable batch order
    found.sort_by(|a, b| (a.resource, &a.path).cmp(&(b.resource, &b.path)));
    info!("Discovered {} file(s) under {}", found.len(), dir.display());
    Ok(found)
}

async fn read_payloads(files: &[InputFile]) -> anyhow::Result<Vec<SourcePayload>> {
    let mut payloads = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let origin = file.path.display().to_string();
        let mut payload = SourcePayload::from_slice(origin, file.resource, &bytes)?;
        if let Some(hint) = &file.competition_hint {
            payload = payload.with_competition_hint(hint.clone());
        }
        payloads.push(payload);
    }
    Ok(payloads)
}

fn print_summary(dataset: &Dataset, diagnostics: &[Diagnostic]) {
    let stats = dataset.stats();
    println!("\n📊 Load results:");
    println!("   Payloads: {}", stats.payloads);
    println!("   Records seen: {}", stats.records_seen);
    for (key, count) in &stats.records_by_version {
        println!("     {}: {}", key, count);
    }
    println!("   Competitions: {}", dataset.competitions().count());
    println!("   Teams: {}", dataset.teams().count());
    println!("   Matches: {}", dataset.matches().len());
    println!("   Synthesized match ids: {}", stats.synthesized_match_ids);
    println!("   Excluded records: {}", stats.excluded_records);

    if !stats.unknown_statuses.is_empty() {
        println!("\n❓ Unknown match statuses:");
        for (status, count) in &stats.unknown_statuses {
            println!("   - {}: {}", status, count);
        }
    }

    if diagnostics.is_empty() {
        println!("\n✅ No diagnostics");
        return;
    }

    println!("\n⚠️  Diagnostics ({}):", diagnostics.len());
    for diagnostic in diagnostics {
        if diagnostic.severity == Severity::Error {
            warn!("{}", diagnostic);
        }
        println!("   - {}", diagnostic);
    }
}
