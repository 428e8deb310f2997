//! WhatsApp History - Message Graph Extraction
//!
//! A Rust library that turns the message rows of a local WhatsApp iOS backup into
//! a graph of provider-namespaced records: identities, messages, threads and
//! attachments, linked by one "messaged" activity per row.
//!
//! # Features
//!
//! - Read messages and group rosters from `ChatStorage.sqlite`
//! - Resolve sender and recipients for outgoing, incoming and group messages
//! - Classify and encode image, audio and video attachments, with optional OCR
//! - Dedupe keys on every record, backed by a local store for incremental runs
//! - Export to JSON, JSON lines or CSV

/// Attachment classification and its collaborators
pub mod attachment;
/// Record graph construction
pub mod builder;
/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Output file writers
pub mod file_writer;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Extraction pipeline
pub mod pipeline;
/// Participant resolution
pub mod resolver;
/// Database schema definitions
pub mod schema;
/// Row source over the WhatsApp database
pub mod source;
/// Local dedupe store
pub mod store;
/// Row transformation
pub mod transformer;
/// Shared helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use attachment::{AttachmentClassifier, Base64Encoder, BinaryEncoder, DisabledRecognizer, TesseractRecognizer, TextRecognizer};
pub use error::{HistoryError, Result, TransformError};
pub use models::{Activity, Attachment, Extraction, ExtractionMeta, ExtractionRange, Identity, Me, Message, OutputFormat, Participant, RawMessageRow, Thread};
pub use pipeline::{ActivitySink, PipelineReport, TransformPipeline};
pub use source::{RowSource, SqliteRowSource};
pub use store::RecordStore;
pub use transformer::MessageTransformer;
