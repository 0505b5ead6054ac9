//! Crawl orchestrator - producer/consumer harvest loop
//!
//! One producer walks the catalog pages and pushes every record it has not
//! seen before onto the work queue. A fixed set of workers drain the queue
//! concurrently: each one claims a record, processes it inside a session
//! slot, appends the result to the report and hands the attachments to the
//! download pipeline.
//!
//! # Termination
//!
//! 1. The producer finishes (last page, or first empty page when unbounded)
//! 2. The queue drains: every pushed record has been popped *and* handled
//! 3. Idle workers are cancelled and joined
//!
//! Cancellation only ever reaches workers that are waiting on an empty queue.

use crate::config::{ClaimPolicy, Config};
use crate::crawler::{ResourcePool, RetryOutcome, RetryPolicy, WorkItem, WorkQueue};
use crate::download::DownloadPipeline;
use crate::output::{ReportSink, RunSummary};
use crate::source::{PageLister, RecordProcessor};
use crate::state::{HarvestEvent, PagePhase, RunPhase, RunStats};
use crate::storage::{Keyspace, RunStatus, Storage};
use crate::HarvestError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Knobs of a harvest run
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub start_page: u32,
    /// `None` lists until the first confirmed empty page
    pub end_page: Option<u32>,
    pub workers: usize,
    pub max_sessions: usize,
    pub claim_policy: ClaimPolicy,
    pub discovery: RetryPolicy,
    pub processing: RetryPolicy,
    /// Look records up without claiming them, so a later real run still sees them
    pub simulate: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_page: config.crawler.start_page,
            end_page: config.crawler.end_page,
            workers: config.crawler.workers as usize,
            max_sessions: config.crawler.max_concurrent_sessions as usize,
            claim_policy: config.crawler.claim_policy,
            discovery: RetryPolicy::from(&config.retry.discovery),
            processing: RetryPolicy::from(&config.retry.processing),
            simulate: config.download.simulate,
        }
    }
}

/// Main orchestrator structure
pub struct Orchestrator {
    settings: OrchestratorSettings,
    store: Arc<dyn Storage>,
    lister: Arc<dyn PageLister>,
    processor: Arc<dyn RecordProcessor>,
    report: Arc<dyn ReportSink>,
    downloader: Option<Arc<DownloadPipeline>>,
}

/// State shared by the producer and the workers of one run
struct Shared {
    settings: OrchestratorSettings,
    store: Arc<dyn Storage>,
    lister: Arc<dyn PageLister>,
    processor: Arc<dyn RecordProcessor>,
    report: Arc<dyn ReportSink>,
    downloader: Option<Arc<DownloadPipeline>>,
    sessions: ResourcePool,
    queue: WorkQueue<WorkItem>,
    stats: RunStats,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        store: Arc<dyn Storage>,
        lister: Arc<dyn PageLister>,
        processor: Arc<dyn RecordProcessor>,
        report: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            settings,
            store,
            lister,
            processor,
            report,
            downloader: None,
        }
    }

    /// Sends the attachments of every processed record through `pipeline`
    ///
    /// A simulating pipeline puts the whole run in simulate mode.
    pub fn with_downloader(mut self, pipeline: Arc<DownloadPipeline>) -> Self {
        self.settings.simulate |= pipeline.settings().simulate;
        self.downloader = Some(pipeline);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs one complete harvest
    ///
    /// The run is recorded in the store's run ledger. Faults inside single
    /// records or files never fail the run; only setup-level problems do.
    pub async fn run(&self, config_hash: &str) -> Result<RunSummary, HarvestError> {
        let started = Instant::now();
        let run_id = self.store.create_run(config_hash)?;
        tracing::info!(
            "Starting run {}: pages {}..{}, {} workers, {} sessions",
            run_id,
            self.settings.start_page,
            self.settings
                .end_page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "end".to_string()),
            self.settings.workers,
            self.settings.max_sessions
        );

        let shared = Arc::new(Shared {
            settings: self.settings.clone(),
            store: Arc::clone(&self.store),
            lister: Arc::clone(&self.lister),
            processor: Arc::clone(&self.processor),
            report: Arc::clone(&self.report),
            downloader: self.downloader.clone(),
            sessions: ResourcePool::new(self.settings.max_sessions),
            queue: WorkQueue::new(),
            stats: RunStats::new(),
        });

        let mut phase = RunPhase::Producing;
        let cancel = CancellationToken::new();

        let workers: Vec<_> = (0..self.settings.workers.max(1))
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&shared), cancel.clone())))
            .collect();

        let producer = tokio::spawn(produce(Arc::clone(&shared))).await;

        phase.advance(RunPhase::Draining)?;
        tracing::debug!("Producer finished, draining {} records", shared.queue.pending());
        shared.queue.wait_drained().await;

        cancel.cancel();
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        phase.advance(RunPhase::Terminated)?;

        let produced = match producer {
            Ok(result) => result,
            Err(e) => Err(HarvestError::Join(e)),
        };

        let status = match &produced {
            Ok(_) => RunStatus::Completed,
            Err(e) => {
                tracing::error!("Producer failed: {}", e);
                RunStatus::Failed
            }
        };
        self.store.finish_run(run_id, status)?;
        produced?;

        let summary = RunSummary {
            run_id,
            status,
            config_hash: config_hash.to_string(),
            elapsed: started.elapsed(),
            stats: shared.stats.snapshot(),
        };
        tracing::info!("{}", summary.headline());
        Ok(summary)
    }
}

/// Lists pages and enqueues records not seen before
async fn produce(shared: Arc<Shared>) -> Result<u64, HarvestError> {
    let settings = &shared.settings;
    let mut seen = HashSet::new();
    let mut enqueued = 0;
    let mut page = settings.start_page;

    loop {
        if matches!(settings.end_page, Some(end) if page > end) {
            break;
        }

        let mut phase = PagePhase::Discovering;
        let label = format!("page {}", page);
        let outcome = settings
            .discovery
            .run_with_refresh(
                &label,
                |_| shared.lister.list(page),
                || shared.lister.refresh(),
            )
            .await;

        let locators = match outcome {
            RetryOutcome::Success { value, .. } => value,
            RetryOutcome::Exhausted { attempts } => {
                shared.stats.record(HarvestEvent::PageExhausted);
                phase.advance(PagePhase::Done)?;
                if settings.end_page.is_none() {
                    tracing::warn!(
                        "Page {} gave no result after {} attempts, stopping discovery",
                        page,
                        attempts
                    );
                    break;
                }
                tracing::warn!(
                    "Page {} gave no result after {} attempts, skipping",
                    page,
                    attempts
                );
                match page.checked_add(1) {
                    Some(next) => page = next,
                    None => break,
                }
                continue;
            }
        };
        shared.stats.record(HarvestEvent::PageListed);

        if locators.is_empty() {
            phase.advance(PagePhase::Done)?;
            if settings.end_page.is_none() {
                tracing::info!("Page {} is empty, no more pages to list", page);
                break;
            }
            tracing::info!("Page {} has no records", page);
            match page.checked_add(1) {
                Some(next) => page = next,
                None => break,
            }
            continue;
        }

        phase.advance(PagePhase::Enqueuing)?;
        let mut new_on_page = 0;
        for locator in &locators {
            shared.stats.record(HarvestEvent::RecordDiscovered);

            let Some(item) = WorkItem::from_locator(locator) else {
                tracing::warn!("No record id in {}, skipping", locator);
                continue;
            };

            if !seen.insert(item.id.clone()) {
                tracing::debug!("Record {} listed twice, enqueued once", item.id);
                continue;
            }

            match shared.store.exists(Keyspace::RecordId, &item.id) {
                Ok(true) => {
                    tracing::debug!("Record {} already harvested", item.id);
                    shared.stats.record(HarvestEvent::RecordKnown);
                    continue;
                }
                Ok(false) => {}
                // The worker's claim is authoritative, so a failed lookup is harmless
                Err(e) => tracing::warn!("Lookup of record {} failed, enqueueing: {}", item.id, e),
            }

            shared.queue.push(item);
            shared.stats.record(HarvestEvent::RecordEnqueued);
            new_on_page += 1;
        }
        phase.advance(PagePhase::Done)?;
        enqueued += new_on_page;

        tracing::info!(
            "Page {}: {} records listed, {} new",
            page,
            locators.len(),
            new_on_page
        );

        match page.checked_add(1) {
            Some(next) => page = next,
            None => break,
        }
    }

    tracing::info!("Discovery finished, {} records enqueued", enqueued);
    Ok(enqueued)
}

async fn worker_loop(id: usize, shared: Arc<Shared>, cancel: CancellationToken) {
    tracing::debug!("Worker {} started", id);
    loop {
        let ticket = tokio::select! {
            _ = cancel.cancelled() => break,
            ticket = shared.queue.pop() => match ticket {
                Some(ticket) => ticket,
                None => break,
            },
        };

        handle_record(&shared, ticket.item()).await;
    }
    tracing::debug!("Worker {} stopped", id);
}

/// Claims, processes and downloads one record
async fn handle_record(shared: &Shared, item: &WorkItem) {
    if !take_claim(shared, item) {
        return;
    }

    let outcome = match shared.sessions.acquire().await {
        Some(_session) => {
            let label = format!("record {}", item.id);
            shared
                .settings
                .processing
                .run_with_refresh(
                    &label,
                    |_| shared.processor.process(&item.locator),
                    || shared.processor.refresh(),
                )
                .await
        }
        None => RetryOutcome::Exhausted { attempts: 0 },
    };

    match outcome {
        RetryOutcome::Success { value: items, attempts } => {
            shared.stats.record(HarvestEvent::RecordProcessed);
            tracing::info!(
                "Record {}: {} documents (attempt {})",
                item.id,
                items.len(),
                attempts
            );

            if let Err(e) = shared.report.append(&item.locator, &items).await {
                tracing::warn!("Could not append record {} to report: {}", item.id, e);
            }

            if let Some(downloader) = &shared.downloader {
                downloader.download_all(&items, &shared.stats).await;
            }

            let processed = shared.stats.snapshot().records_processed;
            if processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} records processed, {} pending, {}/{} sessions free",
                    processed,
                    shared.queue.pending(),
                    shared.sessions.available(),
                    shared.sessions.capacity()
                );
            }
        }
        RetryOutcome::Exhausted { attempts } => {
            shared.stats.record(HarvestEvent::RecordExhausted);
            tracing::warn!(
                "Record {} abandoned after {} attempts: {}",
                item.id,
                attempts,
                item.locator
            );
            let keeps_claim = shared.settings.claim_policy == ClaimPolicy::BeforeProcess;
            if !keeps_claim && !shared.settings.simulate {
                release_claim(shared, item);
            }
        }
    }
}

/// Returns true if this worker may handle `item`
///
/// In simulate mode the store is only read: a record counts as taken if an
/// earlier real run claimed it.
fn take_claim(shared: &Shared, item: &WorkItem) -> bool {
    let claimed = if shared.settings.simulate {
        shared
            .store
            .exists(Keyspace::RecordId, &item.id)
            .map(|known| !known)
    } else {
        shared.store.insert_if_absent(Keyspace::RecordId, &item.id)
    };

    match claimed {
        Ok(true) => {
            shared.stats.record(HarvestEvent::RecordClaimed);
            true
        }
        Ok(false) => {
            tracing::debug!("Record {} claimed elsewhere, skipping", item.id);
            shared.stats.record(HarvestEvent::RecordAlreadyClaimed);
            false
        }
        Err(e) => {
            tracing::warn!("Could not claim record {}: {}", item.id, e);
            false
        }
    }
}

fn release_claim(shared: &Shared, item: &WorkItem) {
    match shared.store.release(Keyspace::RecordId, &item.id) {
        Ok(_) => {
            tracing::debug!("Released claim on record {}", item.id);
            shared.stats.record(HarvestEvent::ClaimReleased);
        }
        Err(e) => tracing::warn!("Could not release claim on record {}: {}", item.id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadSettings;
    use crate::output::OutputResult;
    use crate::source::{BlobFetcher, FoundItem};
    use crate::storage::{DedupStore, SqliteStorage};
    use crate::{AttemptResult, Fault};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const BASE: &str = "https://catalog.example.com/tender";

    /// Pages with fixed content; pages missing from the map are empty
    #[derive(Default)]
    struct FakeLister {
        pages: HashMap<u32, Vec<String>>,
        unready: HashSet<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl FakeLister {
        fn page(mut self, page: u32, ids: &[&str]) -> Self {
            self.pages
                .insert(page, ids.iter().map(|id| format!("{}/{}", BASE, id)).collect());
            self
        }

        fn never_ready(mut self, page: u32) -> Self {
            self.unready.insert(page);
            self
        }

        fn listed_pages(&self) -> HashSet<u32> {
            self.calls.lock().unwrap().iter().copied().collect()
        }
    }

    #[async_trait]
    impl PageLister for FakeLister {
        async fn list(&self, page: u32) -> AttemptResult<Vec<String>> {
            self.calls.lock().unwrap().push(page);
            if self.unready.contains(&page) {
                return Ok(None);
            }
            Ok(Some(self.pages.get(&page).cloned().unwrap_or_default()))
        }
    }

    /// Two documents per record; ids in `failing` never succeed
    #[derive(Default)]
    struct FakeProcessor {
        failing: HashSet<String>,
        calls: Mutex<HashMap<String, usize>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeProcessor {
        fn failing(ids: &[&str]) -> Self {
            Self {
                failing: ids.iter().map(|id| id.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls_for(&self, id: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&format!("{}/{}", BASE, id))
                .copied()
                .unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl RecordProcessor for FakeProcessor {
        async fn process(&self, locator: &str) -> AttemptResult<Vec<FoundItem>> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(locator.to_string())
                .or_default() += 1;

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let id = locator.rsplit('/').next().unwrap_or_default();
            if self.failing.contains(id) {
                return Err(Fault::transient("record page never rendered"));
            }
            Ok(Some(vec![
                FoundItem::new(format!("{}-a.pdf", id), format!("{}/files/a", locator)),
                FoundItem::new(format!("{}-b.pdf", id), format!("{}/files/b", locator)),
            ]))
        }
    }

    #[derive(Default)]
    struct MemoryReport {
        entries: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ReportSink for MemoryReport {
        async fn append(&self, source_url: &str, items: &[FoundItem]) -> OutputResult<()> {
            self.entries
                .lock()
                .unwrap()
                .push((source_url.to_string(), items.len()));
            Ok(())
        }
    }

    /// Every locator serves its own name as content
    struct EchoFetcher;

    #[async_trait]
    impl BlobFetcher for EchoFetcher {
        async fn fetch(&self, locator: &str) -> Result<Vec<u8>, Fault> {
            Ok(locator.as_bytes().to_vec())
        }
    }

    async fn downloader(
        store: Arc<SqliteStorage>,
        dir: &Path,
        simulate: bool,
    ) -> Arc<DownloadPipeline> {
        let settings = DownloadSettings {
            output_dir: dir.to_path_buf(),
            policy: RetryPolicy::fixed(1, Duration::ZERO),
            max_concurrent: 4,
            keywords: Vec::new(),
            placeholder: '_',
            fallback_name: "file".to_string(),
            sequence_start: 0,
            simulate,
        };
        Arc::new(
            DownloadPipeline::new(settings, store, Arc::new(EchoFetcher))
                .await
                .unwrap(),
        )
    }

    fn settings(start: u32, end: Option<u32>) -> OrchestratorSettings {
        OrchestratorSettings {
            start_page: start,
            end_page: end,
            workers: 4,
            max_sessions: 2,
            claim_policy: ClaimPolicy::BeforeProcess,
            discovery: RetryPolicy::fixed(3, Duration::ZERO),
            processing: RetryPolicy::fixed(3, Duration::ZERO),
            simulate: false,
        }
    }

    struct Harness {
        store: Arc<SqliteStorage>,
        lister: Arc<FakeLister>,
        processor: Arc<FakeProcessor>,
        report: Arc<MemoryReport>,
    }

    impl Harness {
        fn new(lister: FakeLister, processor: FakeProcessor) -> Self {
            Self {
                store: Arc::new(SqliteStorage::new_in_memory().unwrap()),
                lister: Arc::new(lister),
                processor: Arc::new(processor),
                report: Arc::new(MemoryReport::default()),
            }
        }

        fn orchestrator(&self, settings: OrchestratorSettings) -> Orchestrator {
            Orchestrator::new(
                settings,
                self.store.clone(),
                self.lister.clone(),
                self.processor.clone(),
                self.report.clone(),
            )
        }
    }

    fn three_pages() -> FakeLister {
        FakeLister::default()
            .page(1, &["UA-1", "UA-2", "UA-3"])
            .page(2, &["UA-4", "UA-5"])
            .page(3, &["UA-6"])
    }

    #[tokio::test]
    async fn test_every_record_processed_once() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());

        let summary = harness
            .orchestrator(settings(1, Some(3)))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.stats.pages_listed, 3);
        assert_eq!(summary.stats.records_enqueued, 6);
        assert_eq!(summary.stats.records_claimed, 6);
        assert_eq!(summary.stats.records_processed, 6);
        assert_eq!(harness.processor.total_calls(), 6);
        assert_eq!(harness.report.entries.lock().unwrap().len(), 6);
        assert_eq!(harness.store.count_keys(Keyspace::RecordId).unwrap(), 6);

        let run = harness.store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, summary.run_id);
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_rerun_processes_nothing() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());
        harness
            .orchestrator(settings(1, Some(3)))
            .run("hash")
            .await
            .unwrap();

        let second = harness
            .orchestrator(settings(1, Some(3)))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(second.stats.records_known, 6);
        assert_eq!(second.stats.records_enqueued, 0);
        assert_eq!(second.stats.records_claimed, 0);
        assert_eq!(harness.processor.total_calls(), 6);
    }

    #[tokio::test]
    async fn test_duplicate_listing_enqueued_once() {
        let lister = FakeLister::default()
            .page(1, &["UA-1", "UA-2", "UA-1"])
            .page(2, &["UA-2", "UA-3"]);
        let harness = Harness::new(lister, FakeProcessor::default());

        let summary = harness
            .orchestrator(settings(1, Some(2)))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.stats.records_discovered, 5);
        assert_eq!(summary.stats.records_enqueued, 3);
        assert_eq!(harness.processor.calls_for("UA-1"), 1);
        assert_eq!(harness.processor.calls_for("UA-2"), 1);
    }

    #[tokio::test]
    async fn test_unbounded_run_stops_at_first_empty_page() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());

        let summary = harness
            .orchestrator(settings(1, None))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.stats.records_processed, 6);
        assert_eq!(
            harness.lister.listed_pages(),
            [1, 2, 3, 4].into_iter().collect::<HashSet<u32>>()
        );
    }

    #[tokio::test]
    async fn test_bounded_run_skips_exhausted_page() {
        let lister = three_pages().never_ready(2);
        let harness = Harness::new(lister, FakeProcessor::default());

        let summary = harness
            .orchestrator(settings(1, Some(3)))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.stats.pages_exhausted, 1);
        assert_eq!(summary.stats.records_processed, 4);
        assert_eq!(harness.lister.calls.lock().unwrap().iter().filter(|p| **p == 2).count(), 3);
    }

    #[tokio::test]
    async fn test_unbounded_run_stops_on_exhausted_page() {
        let lister = three_pages().never_ready(2);
        let harness = Harness::new(lister, FakeProcessor::default());

        let summary = harness
            .orchestrator(settings(1, None))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.stats.records_processed, 3);
        assert!(!harness.lister.listed_pages().contains(&3));
    }

    #[tokio::test]
    async fn test_exhausted_record_keeps_claim_by_default() {
        let harness = Harness::new(three_pages(), FakeProcessor::failing(&["UA-2"]));

        let summary = harness
            .orchestrator(settings(1, Some(3)))
            .run("hash")
            .await
            .unwrap();

        assert_eq!(summary.stats.records_exhausted, 1);
        assert_eq!(summary.stats.records_processed, 5);
        assert_eq!(harness.processor.calls_for("UA-2"), 3);
        assert!(harness.store.exists(Keyspace::RecordId, "UA-2").unwrap());
        assert_eq!(harness.report.entries.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_claim_on_success_releases_exhausted_record() {
        let harness = Harness::new(three_pages(), FakeProcessor::failing(&["UA-2"]));
        let mut on_success = settings(1, Some(3));
        on_success.claim_policy = ClaimPolicy::OnSuccess;

        let summary = harness
            .orchestrator(on_success.clone())
            .run("hash")
            .await
            .unwrap();
        assert_eq!(summary.stats.claims_released, 1);
        assert!(!harness.store.exists(Keyspace::RecordId, "UA-2").unwrap());

        // A later run picks the released record up again
        let second = harness.orchestrator(on_success).run("hash").await.unwrap();
        assert_eq!(second.stats.records_enqueued, 1);
        assert_eq!(harness.processor.calls_for("UA-2"), 6);
    }

    #[tokio::test]
    async fn test_session_pool_bounds_processing() {
        let mut ids = Vec::new();
        for i in 0..30 {
            ids.push(format!("UA-{}", i));
        }
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let harness = Harness::new(
            FakeLister::default().page(1, &id_refs),
            FakeProcessor::default(),
        );

        let mut bounded = settings(1, Some(1));
        bounded.workers = 8;
        bounded.max_sessions = 3;
        harness.orchestrator(bounded).run("hash").await.unwrap();

        assert_eq!(harness.processor.total_calls(), 30);
        assert!(harness.processor.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_claims() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());

        let a = harness.orchestrator(settings(1, Some(3)));
        let b = harness.orchestrator(settings(1, Some(3)));
        let (ra, rb) = tokio::join!(a.run("a"), b.run("b"));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(ra.stats.records_processed + rb.stats.records_processed, 6);
        for i in 1..=6 {
            assert_eq!(harness.processor.calls_for(&format!("UA-{}", i)), 1);
        }
    }

    #[tokio::test]
    async fn test_simulate_run_leaves_records_for_real_run() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());
        let dir = TempDir::new().unwrap();

        let simulated = harness
            .orchestrator(settings(1, Some(3)))
            .with_downloader(downloader(harness.store.clone(), dir.path(), true).await)
            .run("hash")
            .await
            .unwrap();

        assert_eq!(simulated.stats.records_processed, 6);
        assert_eq!(simulated.stats.files_simulated, 12);
        assert_eq!(harness.store.count_keys(Keyspace::RecordId).unwrap(), 0);
        assert_eq!(harness.store.count_keys(Keyspace::FileHash).unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let real = harness
            .orchestrator(settings(1, Some(3)))
            .with_downloader(downloader(harness.store.clone(), dir.path(), false).await)
            .run("hash")
            .await
            .unwrap();

        assert_eq!(real.stats.records_enqueued, 6);
        assert_eq!(real.stats.records_processed, 6);
        assert_eq!(real.stats.files_saved, 12);
        assert_eq!(harness.store.count_keys(Keyspace::RecordId).unwrap(), 6);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 12);
    }

    #[tokio::test]
    async fn test_simulate_skips_records_claimed_by_real_run() {
        let harness = Harness::new(three_pages(), FakeProcessor::default());
        harness
            .orchestrator(settings(1, Some(2)))
            .run("hash")
            .await
            .unwrap();

        let mut simulate = settings(1, Some(3));
        simulate.simulate = true;
        let summary = harness.orchestrator(simulate).run("hash").await.unwrap();

        assert_eq!(summary.stats.records_known, 5);
        assert_eq!(summary.stats.records_processed, 1);
        assert_eq!(harness.store.count_keys(Keyspace::RecordId).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_bounded_run_ending_at_last_page_index_terminates() {
        let last = settings(u32::MAX, Some(u32::MAX));

        let exhausted = Harness::new(
            FakeLister::default().never_ready(u32::MAX),
            FakeProcessor::default(),
        );
        let summary = exhausted.orchestrator(last.clone()).run("hash").await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.stats.pages_exhausted, 1);

        let empty = Harness::new(FakeLister::default(), FakeProcessor::default());
        let summary = empty.orchestrator(last).run("hash").await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.stats.pages_listed, 1);
    }
}
