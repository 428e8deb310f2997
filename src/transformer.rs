//! Row transformation
//!
//! Glues the resolver and the graph builder together: one [`Extraction`] in, one
//! [`Activity`] out. Rows share no state, so a transformer can be reused across any
//! number of rows in any order.

use crate::attachment::{AttachmentClassifier, Base64Encoder, DisabledRecognizer};
use crate::builder;
use crate::error::TransformError;
use crate::models::{Activity, Extraction};
use crate::resolver;

/// Turns raw rows into record graphs
pub struct MessageTransformer {
    classifier: AttachmentClassifier,
}

impl MessageTransformer {
    /// Create a transformer classifying attachments with `classifier`
    #[must_use]
    pub fn new(classifier: AttachmentClassifier) -> Self {
        Self { classifier }
    }

    /// Transform one row into its record graph
    pub fn transform(&self, extraction: &Extraction) -> Result<Activity, TransformError> {
        let Extraction { row, meta } = extraction;
        let resolved = resolver::resolve(row, meta)?;
        builder::build(row, resolved.actor, resolved.consumers, meta, &self.classifier)
    }
}

impl Default for MessageTransformer {
    fn default() -> Self {
        Self::new(AttachmentClassifier::new(
            Box::new(DisabledRecognizer),
            Box::new(Base64Encoder::default()),
        ))
    }
}
