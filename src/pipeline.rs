use std::path::PathBuf;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{Browser, InputSimulator};
use crate::completion::TextCompletion;
use crate::error::Result;
use crate::parser::excerpt::ExcerptLimits;
use crate::parser::profile::{FieldHints, ProfileFieldResolver};
use crate::parser::scan::ContainerScanner;
use crate::parser::selectors::SelectorRegistry;
use crate::parser::urls::UrlNormalizer;
use crate::record::ProfileRecord;
use crate::settings::Settings;
use crate::store::RecordSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    PerProfile,
    Done,
}

/// Pacing and limits for one listing job.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_profile_visits: usize,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub settle_secs: f64,
    pub scroll_probability: f64,
    pub scroll_passes: u32,
    pub snapshot_dir: Option<PathBuf>,
    pub show_progress: bool,
    pub excerpt: ExcerptLimits,
}

impl From<&Settings> for PipelineOptions {
    fn from(s: &Settings) -> Self {
        PipelineOptions {
            max_profile_visits: s.max_profile_visits,
            min_delay_secs: s.min_delay_secs,
            max_delay_secs: s.max_delay_secs,
            settle_secs: s.settle_secs,
            scroll_probability: s.scroll_probability,
            scroll_passes: s.scroll_passes,
            snapshot_dir: s.snapshot_dir.clone(),
            show_progress: s.show_progress,
            excerpt: s.ai.excerpt_limits(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub listing_url: String,
    /// Records found on the listing page.
    pub records: usize,
    /// Profile visits started.
    pub attempted: usize,
    /// Visits that changed title or employer.
    pub enriched: usize,
    pub failed: usize,
    /// Record appends the sink rejected; the job kept going.
    pub write_failures: usize,
    pub cancelled: bool,
}

/// Scans one listing page, then visits each discovered profile in order.
///
/// Owns its browser for the whole job. Every record is persisted after the
/// scan and again after its visit, so partial data survives a failed visit.
pub struct Orchestrator<B, I, S> {
    browser: B,
    input: I,
    sink: S,
    registry: SelectorRegistry,
    urls: UrlNormalizer,
    completion: Option<Box<dyn TextCompletion>>,
    options: PipelineOptions,
    cancel: CancellationToken,
    phase: Phase,
    rng: fastrand::Rng,
}

impl<B, I, S> Orchestrator<B, I, S>
where
    B: Browser,
    I: InputSimulator,
    S: RecordSink,
{
    pub fn new(
        browser: B,
        input: I,
        sink: S,
        registry: SelectorRegistry,
        urls: UrlNormalizer,
        options: PipelineOptions,
    ) -> Self {
        Orchestrator {
            browser,
            input,
            sink,
            registry,
            urls,
            completion: None,
            options,
            cancel: CancellationToken::new(),
            phase: Phase::Idle,
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_completion(mut self, completion: Option<Box<dyn TextCompletion>>) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    /// Navigate to the listing, then harvest it.
    pub async fn run(&mut self, listing_url: &str) -> Result<RunReport> {
        info!("Opening listing {}", listing_url);
        self.browser.navigate(listing_url).await?;
        self.settle().await;
        self.harvest_current(listing_url).await
    }

    /// Harvest the listing the browser already shows.
    pub async fn harvest_current(&mut self, listing_url: &str) -> Result<RunReport> {
        let mut report = RunReport {
            listing_url: listing_url.to_string(),
            ..RunReport::default()
        };

        self.enter(Phase::Scanning);
        self.browse_like_a_person().await;
        self.snapshot("listing").await;

        let markup = self.browser.content().await?;
        let scanner = ContainerScanner::new(&self.registry, &self.urls);
        let mut records = scanner.scan(&markup, &mut self.browser).await;
        report.records = records.len();
        if records.is_empty() {
            warn!("No profiles recognized on {}", listing_url);
        } else {
            info!("Found {} profiles on {}", records.len(), listing_url);
        }
        for record in &records {
            self.persist(record, &mut report);
        }

        let to_visit = records
            .iter()
            .filter(|r| r.has_url())
            .count()
            .min(self.options.max_profile_visits);
        let pb = self.progress_bar(to_visit as u64);

        for (index, record) in records
            .iter_mut()
            .filter(|r| r.has_url())
            .take(to_visit)
            .enumerate()
        {
            if self.cancel.is_cancelled() {
                info!("Stop requested, leaving {} profiles unvisited", to_visit - index);
                report.cancelled = true;
                break;
            }
            self.enter(Phase::PerProfile);
            report.attempted += 1;

            match self.visit(record).await {
                Ok(true) => {
                    report.enriched += 1;
                    info!(
                        "Enriched {}: {:?} at {:?}",
                        record.full_name(),
                        record.title,
                        record.employer
                    );
                }
                Ok(false) => info!("Nothing new for {}", record.full_name()),
                Err(e) => {
                    report.failed += 1;
                    warn!("Visit to {} failed, keeping listing data: {}", record.linkedin_url, e);
                }
            }
            self.persist(record, &mut report);
            pb.inc(1);

            if let Err(e) = self.browser.navigate(listing_url).await {
                warn!("Could not return to listing {}: {}", listing_url, e);
            }
            self.input
                .delay(self.options.min_delay_secs, self.options.max_delay_secs)
                .await;
        }
        pb.finish_and_clear();

        self.enter(Phase::Done);
        info!(
            "Listing {} done: {} records, {} visits attempted, {} enriched, {} failed, {} not saved",
            listing_url,
            report.records,
            report.attempted,
            report.enriched,
            report.failed,
            report.write_failures
        );
        Ok(report)
    }

    fn persist(&mut self, record: &ProfileRecord, report: &mut RunReport) {
        if let Err(e) = self.sink.append(record) {
            report.write_failures += 1;
            warn!("Could not save {}: {}", record.full_name(), e);
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// One profile visit. `Ok(true)` when title or employer changed.
    async fn visit(&mut self, record: &mut ProfileRecord) -> Result<bool> {
        debug!("Visiting {}", record.linkedin_url);
        self.browser.navigate(&record.linkedin_url).await?;
        self.settle().await;
        self.browse_like_a_person().await;
        self.snapshot("profile").await;

        let markup = self.browser.content().await?;
        let hints = FieldHints {
            title: Some(record.description.clone()).filter(|d| !d.is_empty()),
            employer: Some(record.employer.clone()).filter(|e| !e.is_empty()),
        };
        let resolver = ProfileFieldResolver::new(
            &self.registry,
            self.completion.as_deref(),
            self.options.excerpt,
        );
        let fields = resolver.resolve(&markup, &hints).await;
        debug!(
            "{}: title via {:?}, employer via {:?}",
            record.full_name(),
            fields.title.source,
            fields.employer.source
        );
        Ok(record.upgrade(&fields.title.value, &fields.employer.value))
    }

    async fn settle(&mut self) {
        let settle = self.options.settle_secs;
        self.input.delay(settle, settle * 1.5).await;
    }

    async fn browse_like_a_person(&mut self) {
        for _ in 0..self.options.scroll_passes {
            if self.rng.f64() < self.options.scroll_probability {
                self.input.scroll().await;
                self.input
                    .delay(self.options.min_delay_secs, self.options.max_delay_secs)
                    .await;
            }
        }
    }

    async fn snapshot(&mut self, label: &str) {
        let Some(dir) = self.options.snapshot_dir.clone() else {
            return;
        };
        let name = format!("{}_{}", label, Local::now().format("%Y%m%d_%H%M%S%3f"));
        match self.browser.screenshot(&dir.join(name)).await {
            Ok(path) => debug!("Snapshot {}", path.display()),
            Err(e) => warn!("Snapshot failed: {}", e),
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} profiles (eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}
