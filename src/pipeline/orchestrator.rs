use chrono::Utc;
use tracing::{debug, error, info, warn};
use crate::config::{SnapshotConfig, SourcesConfig};
use crate::data::fetcher::{FetchError, TextSource};
use crate::data::parser::{parse_kalshi, parse_polymarket, ParseRules};
use crate::data::types::{ForecastItem, Snapshot, Source};
use crate::monitoring::logger::CsvLogger;
use crate::pipeline::dedup::dedupe_and_cap;
use crate::pipeline::fallback::fallback_financial;
use crate::storage::SnapshotStore;

/// Today's date in UTC, `YYYY-MM-DD`.
pub fn utc_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// How one upstream branch settled.
#[derive(Debug)]
pub enum SourceOutcome {
    Fulfilled(Vec<ForecastItem>),
    Rejected(FetchError),
}

impl SourceOutcome {
    fn item_count(&self) -> Option<usize> {
        match self {
            SourceOutcome::Fulfilled(items) => Some(items.len()),
            SourceOutcome::Rejected(_) => None,
        }
    }

    fn into_items(self) -> Vec<ForecastItem> {
        match self {
            SourceOutcome::Fulfilled(items) => items,
            SourceOutcome::Rejected(e) => {
                debug!("Contributing no items: {}", e);
                Vec::new()
            }
        }
    }
}

/// Summary of one generation run. `None` counts mean the fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub date: String,
    pub polymarket_items: Option<usize>,
    pub kalshi_items: Option<usize>,
    pub final_items: usize,
    pub used_fallback: bool,
    pub persisted: bool,
}

type Parser = fn(&str, &ParseRules) -> Vec<ForecastItem>;

pub struct SnapshotOrchestrator<F, S> {
    fetcher: F,
    store: S,
    sources: SourcesConfig,
    snapshot: SnapshotConfig,
    run_log: Option<CsvLogger>,
}

impl<F: TextSource, S: SnapshotStore> SnapshotOrchestrator<F, S> {
    pub fn new(fetcher: F, store: S, sources: SourcesConfig, snapshot: SnapshotConfig) -> Self {
        Self {
            fetcher,
            store,
            sources,
            snapshot,
            run_log: None,
        }
    }

    pub fn with_run_log(mut self, run_log: CsvLogger) -> Self {
        self.run_log = Some(run_log);
        self
    }

    async fn run_source(&self, source: Source, url: &str, parse: Parser) -> SourceOutcome {
        match self.fetcher.fetch_text(url).await {
            Ok(text) => {
                let items = parse(&text, &self.snapshot.parse_rules());
                if items.is_empty() {
                    warn!("{}: page fetched but no financial items matched", source);
                } else {
                    info!("{}: {} financial items", source, items.len());
                }
                SourceOutcome::Fulfilled(items)
            }
            Err(e) => {
                warn!("{}: giving up, {}", source, e);
                SourceOutcome::Rejected(e)
            }
        }
    }

    /// Scrape both sources, fall back if nothing survived, and persist the
    /// result under `date`. Always yields items.
    pub async fn generate_with_report(&self, date: &str) -> (Vec<ForecastItem>, GenerationReport) {
        info!("Generating snapshot for {}", date);

        // Both branches run to completion; neither failure cancels the other.
        let (poly, kalshi) = futures::future::join(
            self.run_source(Source::Polymarket, &self.sources.polymarket_url, parse_polymarket),
            self.run_source(Source::Kalshi, &self.sources.kalshi_url, parse_kalshi),
        )
        .await;

        let polymarket_items = poly.item_count();
        let kalshi_items = kalshi.item_count();

        let mut merged = poly.into_items();
        merged.extend(kalshi.into_items());

        let mut items = dedupe_and_cap(merged, self.snapshot.max_items);
        let used_fallback = items.is_empty();
        if used_fallback {
            warn!("No usable items for {}, using deterministic fallback", date);
            // templates cycle past their count, so the same cap and dedup apply
            items = dedupe_and_cap(
                fallback_financial(date, self.snapshot.fallback_items),
                self.snapshot.max_items,
            );
        }

        let persisted = match self.store.put(date, &items, self.snapshot.ttl()).await {
            Ok(()) => {
                info!("Stored {} items for {}", items.len(), date);
                true
            }
            Err(e) => {
                error!("Failed to store snapshot for {}: {}", date, e);
                false
            }
        };

        let report = GenerationReport {
            date: date.to_string(),
            polymarket_items,
            kalshi_items,
            final_items: items.len(),
            used_fallback,
            persisted,
        };

        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log.log_generation(&report) {
                warn!("Failed to write run log: {}", e);
            }
        }

        (items, report)
    }

    pub async fn generate_for_day(&self, date: &str) -> Vec<ForecastItem> {
        self.generate_with_report(date).await.0
    }

    /// Serve the snapshot for `date`: stored copy unless `force`, otherwise
    /// (or on a miss) regenerate.
    pub async fn get_snapshot(&self, date: &str, force: bool) -> Snapshot {
        if !force {
            match self.store.get(date).await {
                Ok(Some(items)) => {
                    info!("Serving stored snapshot for {}", date);
                    return Snapshot { date: date.to_string(), items };
                }
                Ok(None) => {}
                Err(e) => warn!("Snapshot read for {} failed, regenerating: {}", date, e),
            }
        }

        let items = self.generate_for_day(date).await;
        Snapshot { date: date.to_string(), items }
    }

    /// Scheduled entry point: regenerate today's snapshot.
    pub async fn run_scheduled(&self) -> GenerationReport {
        let date = utc_date();
        let (_, report) = self.generate_with_report(&date).await;

        info!(
            "Scheduled run for {} done: {} items (fallback: {}, persisted: {})",
            report.date, report.final_items, report.used_fallback, report.persisted
        );
        report
    }
}
