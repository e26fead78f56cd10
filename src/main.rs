mod browser;
mod completion;
mod error;
mod parser;
mod pipeline;
mod record;
mod settings;
mod store;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use browser::{Browser, HttpBrowser, PacedInput, ReplayBrowser};
use completion::{OpenAiCompletion, TextCompletion};
use parser::profile::{FieldHints, ProfileFieldResolver};
use parser::scan::ContainerScanner;
use parser::truncate_chars;
use pipeline::{Orchestrator, PipelineOptions};
use record::ProfileRecord;
use settings::Settings;
use store::{RecordSink, RecordStore};

#[derive(Parser)]
#[command(name = "profile_scout", about = "People listing and profile extractor")]
struct Cli {
    /// Settings file (TOML); SCOUT__* environment variables override it
    #[arg(short, long, global = true, default_value = settings::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan listing pages and visit every profile found
    Run {
        /// Listing URLs (default: target_urls from settings)
        urls: Vec<String>,
        /// Max profile visits per listing
        #[arg(short = 'n', long)]
        max_visits: Option<usize>,
        /// Heuristics only, even when an API key is configured
        #[arg(long)]
        no_ai: bool,
    },
    /// Scan a saved listing page
    Listing {
        file: PathBuf,
        /// Append the records to the configured output files
        #[arg(long)]
        save: bool,
        /// One JSON object per line instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Resolve title and employer of a saved profile page
    Profile {
        file: PathBuf,
        #[arg(long)]
        title_hint: Option<String>,
        #[arg(long)]
        employer_hint: Option<String>,
        #[arg(long)]
        no_ai: bool,
    },
    /// Convert a JSON output file to CSV
    Convert {
        json_file: PathBuf,
        /// Output CSV (default: <name>_converted.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Columns to include (default: all fields of the first record)
        #[arg(short, long, num_args = 1..)]
        fields: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;

    let result = match cli.command {
        Commands::Run {
            urls,
            max_visits,
            no_ai,
        } => run(&settings, urls, max_visits, no_ai).await,
        Commands::Listing { file, save, json } => listing(&settings, &file, save, json).await,
        Commands::Profile {
            file,
            title_hint,
            employer_hint,
            no_ai,
        } => {
            let hints = FieldHints {
                title: title_hint,
                employer: employer_hint,
            };
            profile(&settings, &file, &hints, no_ai).await
        }
        Commands::Convert {
            json_file,
            output,
            fields,
        } => {
            let fields = (!fields.is_empty()).then_some(fields.as_slice());
            match store::json_to_csv(&json_file, output.as_deref(), fields)
                .with_context(|| format!("Failed to convert {}", json_file.display()))?
            {
                Some(summary) => {
                    println!(
                        "Converted {} to {}",
                        json_file.display(),
                        summary.output.display()
                    );
                    println!(
                        "Processed {} records with fields: {}",
                        summary.rows,
                        summary.fields.join(", ")
                    );
                }
                None => println!("No data found in {}", json_file.display()),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn completion_service(
    settings: &Settings,
    no_ai: bool,
) -> anyhow::Result<Option<Box<dyn TextCompletion>>> {
    if no_ai {
        return Ok(None);
    }
    let client = OpenAiCompletion::from_settings(&settings.ai, settings.request_timeout())
        .context("Failed to build completion client")?;
    Ok(client.map(|c| Box::new(c) as Box<dyn TextCompletion>))
}

async fn run(
    settings: &Settings,
    urls: Vec<String>,
    max_visits: Option<usize>,
    no_ai: bool,
) -> anyhow::Result<()> {
    let urls = if urls.is_empty() {
        settings.target_urls.clone()
    } else {
        urls
    };
    if urls.is_empty() {
        bail!("No listing URLs given and none configured in target_urls");
    }

    let browser = HttpBrowser::new(
        &settings.user_agent,
        settings.request_timeout(),
        settings.navigation_retries,
    )
    .context("Failed to start browser session")?;
    let store = RecordStore::new(&settings.output_csv, &settings.output_json);
    let mut options = PipelineOptions::from(settings);
    if let Some(n) = max_visits {
        options.max_profile_visits = n;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current profile");
            on_signal.cancel();
        }
    });

    let mut job = Orchestrator::new(
        browser,
        PacedInput::new(),
        store,
        settings.selectors.clone(),
        settings.urls(),
        options,
    )
    .with_completion(completion_service(settings, no_ai)?)
    .with_cancellation(cancel.clone());

    println!("Processing {} listing pages...", urls.len());
    let mut produced = 0usize;
    for url in &urls {
        if cancel.is_cancelled() {
            break;
        }
        match job.run(url).await {
            Ok(report) => {
                produced += report.records;
                println!(
                    "{}: {} records, {}/{} profiles enriched, {} failed{}",
                    report.listing_url,
                    report.records,
                    report.enriched,
                    report.attempted,
                    report.failed,
                    if report.cancelled { " (stopped)" } else { "" }
                );
                if report.write_failures > 0 {
                    warn!(
                        "{} record writes failed for {}",
                        report.write_failures, report.listing_url
                    );
                }
            }
            Err(e) => warn!("Skipping listing {}: {}", url, e),
        }
    }

    if produced == 0 {
        bail!("No records were produced");
    }
    println!(
        "Saved {} records to {} and {}",
        produced,
        settings.output_csv.display(),
        settings.output_json.display()
    );
    Ok(())
}

async fn listing(settings: &Settings, file: &Path, save: bool, json: bool) -> anyhow::Result<()> {
    let key = file.display().to_string();
    let mut browser = ReplayBrowser::new()
        .with_file(&key, file)
        .with_context(|| format!("Failed to read {}", key))?;
    browser.navigate(&key).await?;
    let markup = browser.content().await?;

    let urls = settings.urls();
    let scanner = ContainerScanner::new(&settings.selectors, &urls);
    let records = scanner.scan(&markup, &mut browser).await;
    if records.is_empty() {
        println!("No profiles recognized in {}", key);
        return Ok(());
    }

    if json {
        for r in &records {
            println!("{}", serde_json::to_string(r)?);
        }
    } else {
        print_table(&records);
    }

    if save {
        let mut store = RecordStore::new(&settings.output_csv, &settings.output_json);
        for r in &records {
            store.append(r)?;
        }
        info!("Appended {} records", records.len());
    }
    Ok(())
}

async fn profile(
    settings: &Settings,
    file: &Path,
    hints: &FieldHints,
    no_ai: bool,
) -> anyhow::Result<()> {
    let markup = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let completion = completion_service(settings, no_ai)?;
    let resolver = ProfileFieldResolver::new(
        &settings.selectors,
        completion.as_deref(),
        settings.ai.excerpt_limits(),
    );
    let fields = resolver.resolve(&markup, hints).await;
    println!("Title:    {} ({:?})", or_dash(&fields.title.value), fields.title.source);
    println!("Employer: {} ({:?})", or_dash(&fields.employer.value), fields.employer.source);
    Ok(())
}

fn print_table(records: &[ProfileRecord]) {
    println!(
        "{:>3} | {:<24} | {:<30} | {:<20} | {:<40}",
        "#", "Name", "Description", "Employer", "Profile"
    );
    println!("{}", "-".repeat(130));
    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>3} | {:<24} | {:<30} | {:<20} | {:<40}",
            i + 1,
            truncate(&r.full_name(), 24),
            truncate(&r.description, 30),
            truncate(&r.employer, 20),
            or_dash(&r.linkedin_url)
        );
    }
    println!("\n{} profiles", records.len());
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn truncate(s: &str, max: usize) -> String {
    let cut = truncate_chars(s, max);
    if cut.len() < s.len() {
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, _) => format!("{}m {}s", minutes, seconds),
        _ => format!("{}h {}m {}s", hours, minutes, seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_cells_are_cut_on_chars() {
        assert_eq!(truncate("Ødegård Consulting", 7), "Ødegård...");
        assert_eq!(truncate("Acme", 7), "Acme");
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
