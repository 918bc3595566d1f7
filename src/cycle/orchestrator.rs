//! The per-source crawl cycle

use crate::adapter::SourceAdapter;
use crate::config::{DuplicatePolicy, SourceConfig};
use crate::cycle::{CancelFlag, CycleReport, PlannedRange};
use crate::dedup::{CandidateRecord, DedupGate, DedupOutcome};
use crate::fetcher::{FetchResult, ResilientFetcher};
use crate::state::CycleState;
use crate::storage::{lock_storage, RunStatus, Storage};
use crate::watermark::{
    chunk_weekly, next_range, retro_ranges, Advance, DateRange, DateWatermark, RangeSplitter,
    RunningWatermark, SplitStep,
};
use crate::IngestError;
use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

/// Whether a cycle should keep going after a range
enum Flow {
    Continue,
    Cancelled,
}

/// Mutable bookkeeping of one running cycle
struct CycleContext<'a> {
    source: &'a SourceConfig,
    gate: DedupGate,
    state: CycleState,
    running: RunningWatermark,
    report: CycleReport,
}

impl CycleContext<'_> {
    fn transition(&mut self, next: CycleState) -> Result<(), IngestError> {
        if !self.state.can_transition_to(next) {
            return Err(IngestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Source {}: {} -> {}", self.source.id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Drives crawl cycles against a shared document store and fetcher
pub struct CrawlCycle<S: Storage> {
    storage: Arc<Mutex<S>>,
    fetcher: Arc<ResilientFetcher>,
    config_hash: String,
    cancel: CancelFlag,
}

impl<S: Storage> CrawlCycle<S> {
    pub fn new(
        storage: Arc<Mutex<S>>,
        fetcher: Arc<ResilientFetcher>,
        config_hash: impl Into<String>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            storage,
            fetcher,
            config_hash: config_hash.into(),
            cancel,
        }
    }

    pub fn storage(&self) -> &Arc<Mutex<S>> {
        &self.storage
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Runs one full cycle for a source
    ///
    /// Per-record fetch failures are counted, not returned. Structural errors
    /// (unreachable source, malformed watermark) are returned and leave the
    /// persisted watermark untouched.
    pub async fn run_source(
        &self,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
        today: NaiveDate,
    ) -> Result<CycleReport, IngestError> {
        let crawled_through = self.load_watermark(source)?;
        let run_id = {
            let mut store = lock_storage(&self.storage)?;
            store.create_run(&source.id, &self.config_hash)?
        };

        tracing::info!("Starting cycle for source {} (run {})", source.id, run_id);

        let mut report = CycleReport::new(&source.id);
        report.watermark_before = crawled_through.clone();
        let mut ctx = CycleContext {
            source,
            gate: DedupGate::new(source.duplicate_policy),
            state: CycleState::Idle,
            running: RunningWatermark::new(today),
            report,
        };

        let result = self.drive(&mut ctx, adapter, &crawled_through, today).await;
        if result.is_err() {
            tracing::debug!("Source {}: aborting from {}", source.id, ctx.state);
        }

        let status = match &result {
            Ok(()) => ctx.report.status,
            Err(_) => RunStatus::Failed,
        };
        ctx.report.status = status;

        {
            let mut store = lock_storage(&self.storage)?;
            store.finish_run(run_id, status, &ctx.report.counters)?;
        }

        match result {
            Ok(()) => {
                let counters = &ctx.report.counters;
                tracing::info!(
                    "Cycle for {} {}: {} inserted, {} retried, {} skipped, {} downloaded, {} failed",
                    source.id,
                    status.to_db_string(),
                    counters.inserted,
                    counters.retried,
                    counters.skipped,
                    counters.downloaded,
                    counters.failed
                );
                Ok(ctx.report)
            }
            Err(e) => {
                tracing::error!("Cycle for {} failed: {}", source.id, e);
                Err(e)
            }
        }
    }

    /// Runs cycles for several sources, at most `max_concurrent` at a time
    ///
    /// Sources are independent: a failed cycle does not affect the others.
    pub async fn run_all(
        &self,
        jobs: Vec<(SourceConfig, Arc<dyn SourceAdapter>)>,
        today: NaiveDate,
        max_concurrent: usize,
    ) -> Vec<(String, Result<CycleReport, IngestError>)> {
        stream::iter(jobs)
            .map(|(source, adapter)| async move {
                let result = self.run_source(&source, adapter.as_ref(), today).await;
                (source.id, result)
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }

    /// Seeds the crawl config row if needed and returns the persisted watermark
    fn load_watermark(&self, source: &SourceConfig) -> Result<String, IngestError> {
        let mut store = lock_storage(&self.storage)?;
        if store.seed_crawl_config(&source.id, &source.seed_watermark)? {
            tracing::info!(
                "Seeded watermark for source {} at {}",
                source.id,
                source.seed_watermark
            );
        }
        let row = store
            .get_crawl_config(&source.id)?
            .ok_or_else(|| IngestError::UnknownSource(source.id.clone()))?;
        Ok(row.crawled_through)
    }

    async fn drive(
        &self,
        ctx: &mut CycleContext<'_>,
        adapter: &dyn SourceAdapter,
        crawled_through: &str,
        today: NaiveDate,
    ) -> Result<(), IngestError> {
        let source = ctx.source;
        let watermark = DateWatermark::new(&source.date_format);

        // Idle -> RangeComputed
        let prior = watermark.parse(crawled_through)?;
        let planned = plan_ranges(source, prior, today);
        ctx.running = RunningWatermark::new(prior);
        ctx.transition(CycleState::RangeComputed)?;

        tracing::info!(
            "Source {}: watermark {}, {} range(s) planned",
            source.id,
            crawled_through,
            planned.len()
        );

        // RangeComputed -> Fetching
        ctx.transition(CycleState::Fetching)?;
        let mut earliest_overflow: Option<NaiveDate> = None;

        for planned_range in planned {
            let flow = match source.result_limit {
                None => self.process_range(ctx, adapter, planned_range.range).await?,
                Some(limit) => {
                    let mut splitter = RangeSplitter::new(planned_range.range, limit);
                    let mut flow = Flow::Continue;
                    while let Some(next) = splitter.next_range() {
                        let count = adapter.count_for_range(next).await?;
                        match splitter.settle(next, count) {
                            SplitStep::Process(piece) => {
                                flow = self.process_range(ctx, adapter, piece).await?;
                                if matches!(flow, Flow::Cancelled) {
                                    break;
                                }
                            }
                            SplitStep::Split => {}
                            SplitStep::Overflow(err) => {
                                tracing::error!("Source {}: {}", source.id, err);
                                ctx.report.overflowed_ranges.push(next);
                                if !planned_range.retro {
                                    earliest_overflow = Some(
                                        earliest_overflow.map_or(next.start, |d| d.min(next.start)),
                                    );
                                }
                            }
                        }
                    }
                    flow
                }
            };

            if matches!(flow, Flow::Cancelled) {
                tracing::warn!(
                    "Cycle for {} cancelled; watermark stays at {}",
                    source.id,
                    crawled_through
                );
                ctx.report.status = RunStatus::Cancelled;
                return ctx.transition(CycleState::Idle);
            }
        }

        // Results of an overflowed day are incomplete, so the watermark must
        // not move past it.
        if let Some(day) = earliest_overflow {
            ctx.running.cap_before(day, prior);
        }

        // Fetching -> WatermarkAdvancing -> Idle
        ctx.transition(CycleState::WatermarkAdvancing)?;
        let advanced = watermark.format(ctx.running.current());
        {
            let mut store = lock_storage(&self.storage)?;
            store.save_crawl_config(&source.id, &advanced, Utc::now())?;
        }
        tracing::info!(
            "Source {}: watermark {} -> {}",
            source.id,
            crawled_through,
            advanced
        );
        ctx.report.watermark_after = Some(advanced);
        ctx.report.status = RunStatus::Completed;
        ctx.transition(CycleState::Idle)
    }

    async fn process_range(
        &self,
        ctx: &mut CycleContext<'_>,
        adapter: &dyn SourceAdapter,
        range: DateRange,
    ) -> Result<Flow, IngestError> {
        if self.cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        tracing::debug!("Source {}: fetching range {}", ctx.source.id, range);
        let mut records = adapter.fetch_range(range).await?;
        ctx.report.processed_ranges.push(range);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let Some(record) = records.next().await else {
                break;
            };
            match record {
                Ok(record) => self.handle_record(ctx, &record).await?,
                Err(e) if e.is_record_level() => {
                    tracing::warn!(
                        "Source {}: skipping malformed entry in {}: {}",
                        ctx.source.id,
                        range,
                        e
                    );
                    ctx.report.malformed_records += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Flow::Continue)
    }

    async fn handle_record(
        &self,
        ctx: &mut CycleContext<'_>,
        record: &CandidateRecord,
    ) -> Result<(), IngestError> {
        let source = ctx.source;
        let outcome = {
            let mut store = lock_storage(&self.storage)?;
            ctx.gate.admit(&mut *store, &source.id, record)?
        };

        let document_id = match outcome {
            DedupOutcome::AlreadyTerminal => {
                ctx.report.counters.skipped += 1;
                if ctx.gate.policy() == DuplicatePolicy::Report {
                    ctx.report.duplicates_reported += 1;
                }
                return Ok(());
            }
            DedupOutcome::Inserted(id) => {
                ctx.report.counters.inserted += 1;
                id
            }
            DedupOutcome::RetryCandidate(id) => {
                ctx.report.counters.retried += 1;
                id
            }
        };

        if ctx.running.observe(&record.filed_date) == Advance::Unparseable {
            tracing::warn!(
                "Source {}: cannot read filed date '{}', watermark unchanged",
                source.id,
                record.filed_date
            );
            ctx.report.unparseable_dates += 1;
        }

        let doc = {
            let store = lock_storage(&self.storage)?;
            store.get_document(document_id)?
        };
        let result = self
            .fetcher
            .fetch_artifact(
                &self.storage,
                &doc,
                &record.download_url,
                &source.artifact_extension,
            )
            .await?;

        match result {
            FetchResult::Success(_) => ctx.report.counters.downloaded += 1,
            FetchResult::Failure(_) => ctx.report.counters.failed += 1,
        }
        Ok(())
    }
}

/// Ranges a cycle scans: primary ranges (optionally chunked weekly), then
/// retro ranges when the source asks for them
pub fn plan_ranges(
    source: &SourceConfig,
    prior: NaiveDate,
    today: NaiveDate,
) -> Vec<PlannedRange> {
    let weekday = today.weekday();

    let mut planned: Vec<PlannedRange> = next_range(prior, today, weekday)
        .into_iter()
        .flat_map(|range| {
            if source.weekly_chunks {
                chunk_weekly(range)
            } else {
                vec![range]
            }
        })
        .map(|range| PlannedRange {
            range,
            retro: false,
        })
        .collect();

    if source.retro_lookback {
        planned.extend(
            retro_ranges(today, weekday)
                .into_iter()
                .map(|range| PlannedRange { range, retro: true }),
        );
    }

    planned
}
