//! Attachment classification
//!
//! Decides whether a row's media becomes an [`Attachment`]. Every reason for not
//! emitting one (no media path, no or unsupported MIME type, file gone from the
//! backup) yields `Ok(None)`; only a failed payload encoding fails the row.
//!
//! Text recognition and payload encoding sit behind the [`TextRecognizer`] and
//! [`BinaryEncoder`] traits so callers can swap in their own services.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::error::TransformError;
use crate::models::{
    Attachment, AttachmentKind, AttachmentMetadata, AttachmentPayload, DedupeField, ExtractionMeta,
    RawMessageRow, PROVIDER,
};

/// Finds text in an image file
#[cfg_attr(test, mockall::automock)]
pub trait TextRecognizer: Send + Sync {
    /// Recognized text, or `None` when the image holds none
    fn recognize_in_image(&self, filename: &Path) -> Result<Option<String>>;
}

/// Turns an attachment file into a payload that can travel with the record
#[cfg_attr(test, mockall::automock)]
pub trait BinaryEncoder: Send + Sync {
    /// Encode the file at `filename`
    fn encode(&self, filename: &Path, mimetype: &str) -> Result<AttachmentPayload>;
}

/// Runs a `tesseract`-compatible command: `<command> <file> stdout`
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: String,
}

impl TesseractRecognizer {
    /// Create a recognizer running `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize_in_image(&self, filename: &Path) -> Result<Option<String>> {
        let output = Command::new(&self.command)
            .arg(filename)
            .arg("stdout")
            .output()
            .with_context(|| format!("Failed to run {}", self.command))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

/// Recognizer used when OCR is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRecognizer;

impl TextRecognizer for DisabledRecognizer {
    fn recognize_in_image(&self, _filename: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Encodes files as `data:<mimetype>;base64,<content>` URIs
#[derive(Debug, Clone, Copy)]
pub struct Base64Encoder {
    max_bytes: u64,
}

impl Base64Encoder {
    /// Create an encoder refusing files larger than `max_bytes`
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl Default for Base64Encoder {
    fn default() -> Self {
        Self::new(100 * 1024 * 1024)
    }
}

impl BinaryEncoder for Base64Encoder {
    fn encode(&self, filename: &Path, mimetype: &str) -> Result<AttachmentPayload> {
        let size = fs::metadata(filename)
            .with_context(|| format!("Failed to stat {}", filename.display()))?
            .len();
        if size > self.max_bytes {
            return Err(anyhow!(
                "{} is {size} bytes, over the {} byte limit",
                filename.display(),
                self.max_bytes
            ));
        }

        let bytes = fs::read(filename).with_context(|| format!("Failed to read {}", filename.display()))?;

        Ok(AttachmentPayload {
            mimetype: mimetype.to_string(),
            data: format!("data:{mimetype};base64,{}", BASE64_STANDARD.encode(bytes)),
        })
    }
}

/// Split a MIME-like string into its top-level type and subtype
#[must_use]
pub fn split_mime(mime: &str) -> (&str, Option<&str>) {
    match mime.trim().split_once('/') {
        Some((top, sub)) => (top, Some(sub)),
        None => (mime.trim(), None),
    }
}

/// Decides whether a row's media becomes an attachment
pub struct AttachmentClassifier {
    recognizer: Box<dyn TextRecognizer>,
    encoder: Box<dyn BinaryEncoder>,
}

impl AttachmentClassifier {
    /// Create a classifier from its two collaborators
    #[must_use]
    pub fn new(recognizer: Box<dyn TextRecognizer>, encoder: Box<dyn BinaryEncoder>) -> Self {
        Self { recognizer, encoder }
    }

    /// Classify the row's media.
    pub fn classify(&self, row: &RawMessageRow, meta: &ExtractionMeta) -> Result<Option<Attachment>, TransformError> {
        let Some((kind, mime, path)) = qualifying_media(row, meta) else {
            return Ok(None);
        };

        let ocr_text = if kind == AttachmentKind::Image {
            self.recognize(&path)
        } else {
            None
        };

        let payload = self
            .encoder
            .encode(&path, mime)
            .map_err(|e| TransformError::AttachmentEncoding {
                path: path.display().to_string(),
                reason: format!("{e:#}"),
            })?;

        Ok(Some(Attachment {
            represents: kind,
            provider: PROVIDER.to_string(),
            provider_id: row.stanza_id.clone(),
            title: row.media_title.clone(),
            metadata: AttachmentMetadata { ocr_text },
            payload,
            dedupe_on: vec![vec![
                DedupeField::Provider,
                DedupeField::ProviderId,
                DedupeField::Represents,
            ]],
        }))
    }

    // OCR is best effort: failures are logged and dropped
    fn recognize(&self, path: &Path) -> Option<String> {
        match self.recognizer.recognize_in_image(path) {
            Ok(text) => text.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Text recognition failed");
                None
            },
        }
    }
}

fn qualifying_media<'a>(row: &'a RawMessageRow, meta: &ExtractionMeta) -> Option<(AttachmentKind, &'a str, PathBuf)> {
    if !row.has_media() {
        return None;
    }

    let mime = row.mime_type.as_deref()?;
    let (top_level, _subtype) = split_mime(mime);
    let Some(kind) = AttachmentKind::from_top_level(top_level) else {
        debug!(stanza_id = %row.stanza_id, mime, "Skipping unsupported attachment type");
        return None;
    };

    let path = meta.attachment_filename.clone()?;
    if !path.is_file() {
        debug!(stanza_id = %row.stanza_id, path = %path.display(), "Attachment file missing");
        return None;
    }

    Some((kind, mime.trim(), path))
}
