//! Data models for raw rows and the emitted record graph
//!
//! This module contains the typed view of a raw WhatsApp message row, the per-row
//! metadata that travels with it, and the entities produced by the transformation:
//! identities, messages, threads, attachments and the wrapping "messaged" activity.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Provider namespace stamped on every emitted entity
pub const PROVIDER: &str = "whatsapp";

/// Verb of the activity wrapping every message
pub const MESSAGED_VERB: &str = "messaged";

/// One raw message row as selected from the WhatsApp database.
///
/// `stanza_id`, `container` and `time` are required and checked when the row is read;
/// every other column may be NULL in the source database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessageRow {
    /// Native message id (`ZSTANZAID`)
    pub stanza_id: String,
    /// Conversation JID, `COALESCE(ZFROMJID, ZTOJID)`
    pub container: String,
    /// Message time as text, UTC
    pub time: String,
    /// Raw `ZISFROMME` flag
    pub is_from_me: Option<i64>,
    /// Chat partner or group name (`ZPARTNERNAME`)
    pub partner_name: Option<String>,
    /// Sending group member JID (`ZMEMBERJID`)
    pub member_jid: Option<String>,
    /// Sender JID (`ZFROMJID`)
    pub from_jid: Option<String>,
    /// Message text (`ZTEXT`)
    pub text: Option<String>,
    /// Media path relative to the backup's message folder (`ZMEDIALOCALPATH`)
    pub media_local_path: Option<String>,
    /// MIME-like media type (`ZVCARDSTRING`)
    pub mime_type: Option<String>,
    /// Media title (`ZTITLE`)
    pub media_title: Option<String>,
}

impl RawMessageRow {
    /// Interpret the `ZISFROMME` flag. NULL counts as "not from me"; anything other
    /// than 0 or 1 leaves the direction of the message undecidable.
    pub fn from_me(&self) -> Result<bool, TransformError> {
        match self.is_from_me {
            Some(1) => Ok(true),
            Some(0) | None => Ok(false),
            Some(other) => Err(TransformError::UnresolvableActor(format!(
                "unexpected ZISFROMME value {other} on message {}",
                self.stanza_id
            ))),
        }
    }

    /// True when the row references local media storage
    #[must_use]
    pub fn has_media(&self) -> bool {
        self.media_local_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// A member of a conversation roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Member JID (`ZMEMBERJID`)
    pub member_jid: Option<String>,
    /// Display name the member pushed to the chat (`ZPUSHNAME`)
    pub push_name: Option<String>,
}

impl Participant {
    /// Create a roster entry
    pub fn new(member_jid: impl Into<String>, push_name: Option<String>) -> Self {
        Self {
            member_jid: Some(member_jid.into()),
            push_name,
        }
    }
}

/// The local user, passed explicitly with every row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Me {
    /// Local user's display name
    pub name: String,
    /// Local user's JID
    pub member_id: String,
}

/// Metadata the row source pairs with each row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    /// Explicit roster for the row's conversation, when group membership is known
    pub participants: Option<Vec<Participant>>,
    /// The local user
    pub me: Me,
    /// Absolute path of the row's media file, when it has one
    pub attachment_filename: Option<PathBuf>,
}

/// A raw row together with its metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// The raw message row
    pub row: RawMessageRow,
    /// Contextual metadata
    pub meta: ExtractionMeta,
}

/// Attribute names that can make up a dedupe tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeField {
    /// Entity type tag
    Represents,
    /// Provider namespace
    Provider,
    /// Native identifier
    ProviderId,
    /// Activity verb
    Verb,
    /// Activity timestamp
    EndAt,
}

impl DedupeField {
    /// Attribute name as written in dedupe keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Represents => "represents",
            Self::Provider => "provider",
            Self::ProviderId => "provider_id",
            Self::Verb => "verb",
            Self::EndAt => "end_at",
        }
    }
}

/// Ordered attribute names forming one alternate natural key
pub type DedupeTuple = Vec<DedupeField>;

/// Entities that carry alternate natural keys for idempotent upsert.
pub trait Dedupable {
    /// The entity's dedupe tuples, in priority order
    fn dedupe_on(&self) -> &[DedupeTuple];

    /// Concrete value of one attribute, if the entity has it
    fn dedupe_value(&self, field: DedupeField) -> Option<String>;

    /// Resolve every dedupe tuple into a concrete key such as
    /// `verb=messaged|provider=whatsapp|provider_id=ABC`.
    ///
    /// Tuples naming an attribute the entity lacks are left out.
    fn dedupe_keys(&self) -> Vec<String> {
        self.dedupe_on()
            .iter()
            .filter_map(|tuple| {
                tuple
                    .iter()
                    .map(|field| {
                        self.dedupe_value(*field)
                            .map(|value| format!("{}={value}", field.as_str()))
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| parts.join("|"))
            })
            .collect()
    }
}

/// Entity type tag for non-attachment entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Represents {
    /// A person
    Identity,
    /// A message
    Message,
    /// A group conversation
    Thread,
}

impl Represents {
    /// Tag as written in output and dedupe keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Message => "message",
            Self::Thread => "thread",
        }
    }
}

/// Semantic type of an emitted attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// `image/*`
    Image,
    /// `audio/*`
    Audio,
    /// `video/*`
    Video,
}

impl AttachmentKind {
    /// Map a MIME top-level type onto an attachment kind
    #[must_use]
    pub fn from_top_level(top_level: &str) -> Option<Self> {
        match top_level {
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Tag as written in output and dedupe keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// The `(represents, provider, provider_id)` key shared by identities, threads and messages
pub(crate) fn single_key() -> Vec<DedupeTuple> {
    vec![vec![
        DedupeField::Represents,
        DedupeField::Provider,
        DedupeField::ProviderId,
    ]]
}

/// A person: the local user or a remote participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Always [`Represents::Identity`]
    pub represents: Represents,
    /// Provider namespace
    pub provider: String,
    /// Member JID
    pub provider_id: String,
    /// Display name
    pub title: Option<String>,
    /// Alternate natural keys
    pub dedupe_on: Vec<DedupeTuple>,
}

impl Identity {
    /// Build an identity keyed on its JID alone
    pub fn new(provider_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            represents: Represents::Identity,
            provider: PROVIDER.to_string(),
            provider_id: provider_id.into(),
            title,
            dedupe_on: single_key(),
        }
    }
}

/// A group conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Always [`Represents::Thread`]
    pub represents: Represents,
    /// Provider namespace
    pub provider: String,
    /// Group container JID
    pub provider_id: String,
    /// Group name
    pub title: Option<String>,
    /// Alternate natural keys
    pub dedupe_on: Vec<DedupeTuple>,
}

impl Thread {
    /// Build a thread keyed on its container JID
    pub fn new(provider_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            represents: Represents::Thread,
            provider: PROVIDER.to_string(),
            provider_id: provider_id.into(),
            title,
            dedupe_on: single_key(),
        }
    }
}

/// Extra attachment attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    /// Text recognized in an image attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
}

/// Encoded attachment content
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    /// MIME type the payload was encoded with
    pub mimetype: String,
    /// Encoded content
    pub data: String,
}

impl fmt::Debug for AttachmentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentPayload")
            .field("mimetype", &self.mimetype)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Media carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Media kind
    pub represents: AttachmentKind,
    /// Provider namespace
    pub provider: String,
    /// Id of the owning message
    pub provider_id: String,
    /// Media title
    pub title: Option<String>,
    /// Extra attributes
    pub metadata: AttachmentMetadata,
    /// Encoded content
    pub payload: AttachmentPayload,
    /// Alternate natural keys
    pub dedupe_on: Vec<DedupeTuple>,
}

/// A message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Always [`Represents::Message`]
    pub represents: Represents,
    /// Provider namespace
    pub provider: String,
    /// Native message id
    pub provider_id: String,
    /// Message text
    pub body: Option<String>,
    /// Receiving identities
    pub consumers: Vec<Identity>,
    /// Group thread, for group conversations only
    pub containers: Option<Thread>,
    /// Attachment, if the message carries one
    pub contains: Option<Attachment>,
    /// Alternate natural keys
    pub dedupe_on: Vec<DedupeTuple>,
}

/// The "messaged" activity wrapping one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Always [`MESSAGED_VERB`]
    pub verb: String,
    /// Provider namespace
    pub provider: String,
    /// Native message id
    pub provider_id: String,
    /// Message timestamp
    pub end_at: DateTime<Utc>,
    /// Sender
    pub actor: Identity,
    /// The message
    pub involved: Message,
    /// Alternate natural keys
    pub dedupe_on: Vec<DedupeTuple>,
}

impl Dedupable for Identity {
    fn dedupe_on(&self) -> &[DedupeTuple] {
        &self.dedupe_on
    }

    fn dedupe_value(&self, field: DedupeField) -> Option<String> {
        match field {
            DedupeField::Represents => Some(self.represents.as_str().to_string()),
            DedupeField::Provider => Some(self.provider.clone()),
            DedupeField::ProviderId => Some(self.provider_id.clone()),
            DedupeField::Verb | DedupeField::EndAt => None,
        }
    }
}

impl Dedupable for Thread {
    fn dedupe_on(&self) -> &[DedupeTuple] {
        &self.dedupe_on
    }

    fn dedupe_value(&self, field: DedupeField) -> Option<String> {
        match field {
            DedupeField::Represents => Some(self.represents.as_str().to_string()),
            DedupeField::Provider => Some(self.provider.clone()),
            DedupeField::ProviderId => Some(self.provider_id.clone()),
            DedupeField::Verb | DedupeField::EndAt => None,
        }
    }
}

impl Dedupable for Attachment {
    fn dedupe_on(&self) -> &[DedupeTuple] {
        &self.dedupe_on
    }

    fn dedupe_value(&self, field: DedupeField) -> Option<String> {
        match field {
            DedupeField::Represents => Some(self.represents.as_str().to_string()),
            DedupeField::Provider => Some(self.provider.clone()),
            DedupeField::ProviderId => Some(self.provider_id.clone()),
            DedupeField::Verb | DedupeField::EndAt => None,
        }
    }
}

impl Dedupable for Message {
    fn dedupe_on(&self) -> &[DedupeTuple] {
        &self.dedupe_on
    }

    fn dedupe_value(&self, field: DedupeField) -> Option<String> {
        match field {
            DedupeField::Represents => Some(self.represents.as_str().to_string()),
            DedupeField::Provider => Some(self.provider.clone()),
            DedupeField::ProviderId => Some(self.provider_id.clone()),
            DedupeField::Verb | DedupeField::EndAt => None,
        }
    }
}

impl Dedupable for Activity {
    fn dedupe_on(&self) -> &[DedupeTuple] {
        &self.dedupe_on
    }

    fn dedupe_value(&self, field: DedupeField) -> Option<String> {
        match field {
            DedupeField::Verb => Some(self.verb.clone()),
            DedupeField::Provider => Some(self.provider.clone()),
            DedupeField::ProviderId => Some(self.provider_id.clone()),
            DedupeField::EndAt => Some(self.end_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            DedupeField::Represents => None,
        }
    }
}

/// Bounds for selecting rows from the source database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRange {
    /// Only rows strictly after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only rows strictly before this instant
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of rows, newest first
    pub limit: Option<usize>,
}

/// Output format for emitted record graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON array
    Json,
    /// One JSON document per line
    JsonLines,
    /// Flattened comma-separated summary
    Csv,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
