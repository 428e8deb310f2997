//! Extraction pipeline
//!
//! Drives one run: rows come out of a [`RowSource`] a page at a time, each is
//! transformed on its own, and the resulting activities are handed to an
//! [`ActivitySink`] in chunks. A row that fails to transform is logged and
//! counted, never fatal to the run.
//!
//! Dedupe keys reach the [`RecordStore`] only after the sink has accepted the
//! chunk holding them, so a failed write leaves those rows eligible for the next
//! run.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{Activity, Dedupable, ExtractionRange};
use crate::source::RowSource;
use crate::store::RecordStore;
use crate::transformer::MessageTransformer;

/// Rows read from the source per query
pub const DEFAULT_PAGE_SIZE: usize = 1_000;

/// Activities handed to the sink per write
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Destination for emitted activities
pub trait ActivitySink {
    /// Persist one chunk. The pipeline commits the chunk's dedupe keys only when
    /// this returns `Ok`.
    fn write_chunk(&mut self, activities: &[Activity]) -> Result<()>;
}

impl ActivitySink for Vec<Activity> {
    fn write_chunk(&mut self, activities: &[Activity]) -> Result<()> {
        self.extend_from_slice(activities);
        Ok(())
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Activities accepted by the sink
    pub emitted: usize,
    /// Rows transformed successfully, duplicates included
    pub transformed: usize,
    /// Rows skipped because of a transform error
    pub skipped: usize,
    /// Activities dropped as already stored or already emitted this run
    pub duplicates: usize,
    /// Chunks handed to the sink
    pub chunks: usize,
}

/// Row source, transformer and optional store wired together
pub struct TransformPipeline {
    source: Box<dyn RowSource>,
    transformer: MessageTransformer,
    store: Option<RecordStore>,
    metrics: MetricsCollector,
    page_size: usize,
    chunk_size: usize,
}

impl TransformPipeline {
    /// Create a pipeline without a dedupe store
    #[must_use]
    pub fn new(source: Box<dyn RowSource>, transformer: MessageTransformer) -> Self {
        Self {
            source,
            transformer,
            store: None,
            metrics: MetricsCollector::default(),
            page_size: DEFAULT_PAGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Filter emitted activities through `store`
    #[must_use]
    pub fn with_store(mut self, store: RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Rows fetched per source query (at least one)
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Activities per sink write (at least one)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Tallies accumulated over every run so far
    #[must_use]
    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// The dedupe store, if one is attached
    #[must_use]
    pub const fn store(&self) -> Option<&RecordStore> {
        self.store.as_ref()
    }

    /// Number of rows `range` selects
    pub async fn count(&self, range: &ExtractionRange) -> Result<usize> {
        self.source.results_count(range).await
    }

    /// Extract, transform and dedupe every row `range` selects, writing the
    /// survivors to `sink`.
    ///
    /// # Errors
    ///
    /// Source, sink and store failures abort the run. Chunks written before the
    /// failure stay committed.
    pub async fn run(&mut self, range: &ExtractionRange, sink: &mut dyn ActivitySink) -> Result<PipelineReport> {
        let timer = OperationTimer::new("pipeline_run");
        let mut report = PipelineReport::default();
        let mut pending: Vec<Activity> = Vec::with_capacity(self.chunk_size.min(DEFAULT_PAGE_SIZE));
        // Keys of `pending`, which the store has not seen yet
        let mut seen: HashSet<String> = HashSet::new();
        let mut offset = 0;

        loop {
            let page = self.source.extract_page(range, offset, self.page_size).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            debug!(rows = page.len(), offset, "Transforming page");

            for extraction in &page {
                let started = Instant::now();
                let activity = match self.transformer.transform(extraction) {
                    Ok(activity) => activity,
                    Err(error) => {
                        warn!(
                            provider_id = %extraction.row.stanza_id,
                            error = %error,
                            kind = error.kind(),
                            "Skipping row"
                        );
                        self.metrics.record_skipped(&error);
                        report.skipped += 1;
                        continue;
                    },
                };
                self.metrics.record_transformed(&activity, started.elapsed());
                report.transformed += 1;

                if self.is_duplicate(&activity, &seen)? {
                    debug!(provider_id = %activity.provider_id, "Dropping duplicate activity");
                    self.metrics.record_duplicate();
                    report.duplicates += 1;
                    continue;
                }

                if self.store.is_some() {
                    seen.extend(activity.dedupe_keys());
                }
                pending.push(activity);

                if pending.len() >= self.chunk_size {
                    self.flush_chunk(&mut pending, sink, &mut report)?;
                    seen.clear();
                }
            }

            if page.len() < self.page_size {
                break;
            }
        }

        self.flush_chunk(&mut pending, sink, &mut report)?;

        info!(
            transformed = report.transformed,
            skipped = report.skipped,
            duplicates = report.duplicates,
            emitted = report.emitted,
            chunks = report.chunks,
            "Pipeline run complete"
        );
        timer.finish();

        Ok(report)
    }

    fn is_duplicate(&self, activity: &Activity, seen: &HashSet<String>) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        if activity.dedupe_keys().iter().any(|key| seen.contains(key)) {
            return Ok(true);
        }
        store.contains(activity)
    }

    /// Write `pending` to the sink, then commit its keys
    fn flush_chunk(
        &self,
        pending: &mut Vec<Activity>,
        sink: &mut dyn ActivitySink,
        report: &mut PipelineReport,
    ) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        sink.write_chunk(pending.as_slice())?;
        report.emitted += pending.len();
        report.chunks += 1;

        if let Some(store) = &self.store {
            for activity in pending.iter() {
                store.upsert(activity)?;
            }
            store.flush()?;
        }

        pending.clear();
        Ok(())
    }
}
