use std::collections::BTreeMap;
use std::time::Duration;

use metrics::{counter, histogram};

use crate::error::TransformError;
use crate::models::Activity;

/// Rows turned into record graphs
pub const ROWS_TRANSFORMED_TOTAL: &str = "whatsapp_history_rows_transformed_total";
/// Rows skipped because of a row-scoped failure
pub const ROWS_SKIPPED_TOTAL: &str = "whatsapp_history_rows_skipped_total";
/// Per-row transform latency
pub const ROW_TRANSFORM_DURATION: &str = "whatsapp_history_row_transform_duration_seconds";
/// Attachments emitted, labelled by type
pub const ATTACHMENTS_EMITTED_TOTAL: &str = "whatsapp_history_attachments_emitted_total";
/// Image attachments that came back with OCR text
pub const OCR_TEXT_TOTAL: &str = "whatsapp_history_ocr_text_total";
/// Activities dropped as already stored
pub const DUPLICATES_TOTAL: &str = "whatsapp_history_duplicates_total";
/// Records written to output files
pub const RECORDS_EXPORTED_TOTAL: &str = "whatsapp_history_records_exported_total";

/// Tallies of one run, mirrored to the `metrics` facade as they are recorded
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    /// Rows transformed successfully
    pub rows_transformed: u64,
    /// Rows skipped
    pub rows_skipped: u64,
    /// Skipped rows by error kind
    pub skipped_by_kind: BTreeMap<&'static str, u64>,
    /// Attachments emitted
    pub attachments_emitted: u64,
    /// Attachments carrying OCR text
    pub ocr_hits: u64,
    /// Activities filtered out as duplicates
    pub duplicates: u64,
    /// Records written to output
    pub records_exported: u64,
}

impl MetricsCollector {
    /// Record a successfully transformed row
    pub fn record_transformed(&mut self, activity: &Activity, duration: Duration) {
        self.rows_transformed += 1;
        counter!(ROWS_TRANSFORMED_TOTAL).increment(1);
        histogram!(ROW_TRANSFORM_DURATION).record(duration.as_secs_f64());

        if let Some(attachment) = &activity.involved.contains {
            self.attachments_emitted += 1;
            counter!(ATTACHMENTS_EMITTED_TOTAL, "type" => attachment.represents.as_str()).increment(1);

            if attachment.metadata.ocr_text.is_some() {
                self.ocr_hits += 1;
                counter!(OCR_TEXT_TOTAL).increment(1);
            }
        }
    }

    /// Record a skipped row
    pub fn record_skipped(&mut self, error: &TransformError) {
        self.rows_skipped += 1;
        *self.skipped_by_kind.entry(error.kind()).or_default() += 1;
        counter!(ROWS_SKIPPED_TOTAL, "kind" => error.kind()).increment(1);
    }

    /// Record an activity dropped as already stored
    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
        counter!(DUPLICATES_TOTAL).increment(1);
    }

    /// Record records written in `format`
    pub fn record_export(&mut self, count: usize, format: &'static str) {
        self.records_exported += count as u64;
        counter!(RECORDS_EXPORTED_TOTAL, "format" => format).increment(count as u64);
    }
}
