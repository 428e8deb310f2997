//! Comprehensive unit tests for metrics.rs module

use std::time::Duration;
use whatsapp_history_rust::metrics::MetricsCollector;
use whatsapp_history_rust::models::{
    Activity, Attachment, AttachmentKind, AttachmentMetadata, AttachmentPayload, Extraction, ExtractionMeta,
    RawMessageRow,
};
use whatsapp_history_rust::{MessageTransformer, TransformError};

fn activity() -> Activity {
    let extraction = Extraction {
        row: RawMessageRow {
            stanza_id: "ABC".to_string(),
            container: "555@s.whatsapp.net".to_string(),
            time: "2021-06-01 10:00:00".to_string(),
            is_from_me: Some(1),
            ..RawMessageRow::default()
        },
        meta: ExtractionMeta::default(),
    };
    MessageTransformer::default().transform(&extraction).unwrap()
}

fn with_image(mut activity: Activity, ocr_text: Option<&str>) -> Activity {
    activity.involved.contains = Some(Attachment {
        represents: AttachmentKind::Image,
        provider: "whatsapp".to_string(),
        provider_id: activity.provider_id.clone(),
        title: None,
        metadata: AttachmentMetadata {
            ocr_text: ocr_text.map(ToString::to_string),
        },
        payload: AttachmentPayload {
            mimetype: "image/png".to_string(),
            data: "data:image/png;base64,AA==".to_string(),
        },
        dedupe_on: Vec::new(),
    });
    activity
}

#[test]
fn test_metrics_collector_default() {
    let collector = MetricsCollector::default();
    assert_eq!(collector.rows_transformed, 0);
    assert_eq!(collector.rows_skipped, 0);
    assert_eq!(collector.attachments_emitted, 0);
    assert_eq!(collector.ocr_hits, 0);
    assert_eq!(collector.duplicates, 0);
    assert_eq!(collector.records_exported, 0);
}

#[test]
fn test_record_transformed_plain_message() {
    let mut collector = MetricsCollector::default();
    collector.record_transformed(&activity(), Duration::from_millis(3));
    assert_eq!(collector.rows_transformed, 1);
    assert_eq!(collector.attachments_emitted, 0);
}

#[test]
fn test_record_transformed_counts_attachments_and_ocr() {
    let mut collector = MetricsCollector::default();
    collector.record_transformed(&with_image(activity(), Some("receipt total 12.00")), Duration::from_millis(3));
    collector.record_transformed(&with_image(activity(), None), Duration::from_millis(3));

    assert_eq!(collector.rows_transformed, 2);
    assert_eq!(collector.attachments_emitted, 2);
    assert_eq!(collector.ocr_hits, 1);
}

#[test]
fn test_record_skipped_by_kind() {
    let mut collector = MetricsCollector::default();
    collector.record_skipped(&TransformError::UnresolvableContact("x".to_string()));
    collector.record_skipped(&TransformError::AttachmentEncoding {
        path: "a.jpg".to_string(),
        reason: "too big".to_string(),
    });

    assert_eq!(collector.rows_skipped, 2);
    assert_eq!(collector.skipped_by_kind.get("unresolvable_contact"), Some(&1));
    assert_eq!(collector.skipped_by_kind.get("attachment_encoding"), Some(&1));
}

#[test]
fn test_record_duplicate() {
    let mut collector = MetricsCollector::default();
    collector.record_duplicate();
    collector.record_duplicate();
    assert_eq!(collector.duplicates, 2);
}
