//! Record graph construction
//!
//! Assembles the entities for one row: the optional group [`Thread`], the
//! [`Message`] and the "messaged" [`Activity`] wrapping it. A build either returns
//! the whole graph or fails; nothing partial leaves this module.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::attachment::AttachmentClassifier;
use crate::error::TransformError;
use crate::models::{
    single_key, Activity, Attachment, DedupeField, ExtractionMeta, Identity, Message, RawMessageRow, Represents,
    Thread, MESSAGED_VERB, PROVIDER,
};

/// Naive layouts accepted for row timestamps, read as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

fn group_container_re() -> &'static Regex {
    static GROUP_CONTAINER_RE: OnceLock<Regex> = OnceLock::new();
    GROUP_CONTAINER_RE.get_or_init(|| Regex::new(r"g\.us$").expect("valid group container regex"))
}

/// True when the container JID names a group conversation (`…@g.us`)
#[must_use]
pub fn is_group_container(container: &str) -> bool {
    group_container_re().is_match(container)
}

/// Parse a row timestamp.
///
/// Accepts RFC 3339, RFC 2822, the SQLite `datetime()` layout and a few close
/// variants; values without an offset are taken as UTC. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TransformError> {
    let text = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TransformError::UnparseableTimestamp(raw.to_string()))
}

/// The group thread a row belongs to, if its container is a group
#[must_use]
pub fn build_thread(row: &RawMessageRow) -> Option<Thread> {
    is_group_container(&row.container).then(|| Thread::new(row.container.clone(), row.partner_name.clone()))
}

/// The message entity for a row
#[must_use]
pub fn build_message(row: &RawMessageRow, consumers: Vec<Identity>, attachment: Option<Attachment>) -> Message {
    Message {
        represents: Represents::Message,
        provider: PROVIDER.to_string(),
        provider_id: row.stanza_id.clone(),
        body: row.text.clone(),
        consumers,
        containers: build_thread(row),
        contains: attachment,
        dedupe_on: single_key(),
    }
}

/// Wrap a message in its "messaged" activity.
///
/// The activity is matchable by timestamp or by native id, so a message whose id
/// changes between exports, or whose timestamp does, is still recognized.
#[must_use]
pub fn build_activity(row: &RawMessageRow, end_at: DateTime<Utc>, actor: Identity, message: Message) -> Activity {
    Activity {
        verb: MESSAGED_VERB.to_string(),
        provider: PROVIDER.to_string(),
        provider_id: row.stanza_id.clone(),
        end_at,
        actor,
        involved: message,
        dedupe_on: vec![
            vec![DedupeField::Verb, DedupeField::Provider, DedupeField::EndAt],
            vec![DedupeField::Verb, DedupeField::Provider, DedupeField::ProviderId],
        ],
    }
}

/// Build the full record graph for a resolved row.
///
/// The timestamp is parsed before the attachment is classified so an unparseable
/// row never pays for OCR or encoding.
pub fn build(
    row: &RawMessageRow,
    actor: Identity,
    consumers: Vec<Identity>,
    meta: &ExtractionMeta,
    classifier: &AttachmentClassifier,
) -> Result<Activity, TransformError> {
    let end_at = parse_timestamp(&row.time)?;
    let attachment = classifier.classify(row, meta)?;
    let message = build_message(row, consumers, attachment);
    Ok(build_activity(row, end_at, actor, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Base64Encoder, DisabledRecognizer};
    use chrono::TimeZone;

    fn classifier() -> AttachmentClassifier {
        AttachmentClassifier::new(Box::new(DisabledRecognizer), Box::new(Base64Encoder::default()))
    }

    fn row(container: &str) -> RawMessageRow {
        RawMessageRow {
            stanza_id: "3EB0ABC".to_string(),
            container: container.to_string(),
            time: "2021-06-01 10:11:12".to_string(),
            is_from_me: Some(1),
            partner_name: Some("Family".to_string()),
            text: Some("dinner at 7?".to_string()),
            ..RawMessageRow::default()
        }
    }

    #[test]
    fn test_group_container_pattern() {
        assert!(is_group_container("123-456@g.us"));
        assert!(!is_group_container("555@s.whatsapp.net"));
        assert!(!is_group_container("g.us@s.whatsapp.net"));
    }

    #[test]
    fn test_thread_only_for_groups() {
        let thread = build_thread(&row("123@g.us")).unwrap();
        assert_eq!(thread.provider_id, "123@g.us");
        assert_eq!(thread.title.as_deref(), Some("Family"));
        assert_eq!(thread.represents, Represents::Thread);

        assert!(build_thread(&row("555@s.whatsapp.net")).is_none());
    }

    #[test]
    fn test_parse_sqlite_datetime() {
        let parsed = parse_timestamp("2021-06-01 10:11:12").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 6, 1, 10, 11, 12).unwrap());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2021, 6, 1, 10, 11, 12).unwrap();
        assert_eq!(parse_timestamp("2021-06-01T10:11:12Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-06-01T12:11:12+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("Tue, 1 Jun 2021 10:11:12 +0000").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2021-06-01T10:11:12 ").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2021-06-01").unwrap(),
            Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_timestamp() {
        assert_eq!(
            parse_timestamp("yesterday-ish"),
            Err(TransformError::UnparseableTimestamp("yesterday-ish".to_string()))
        );
    }

    #[test]
    fn test_build_full_graph() {
        let row = row("123@g.us");
        let actor = Identity::new("999@s.whatsapp.net", Some("Jess".to_string()));
        let consumers = vec![Identity::new("456@s.whatsapp.net", Some("Robert".to_string()))];

        let activity = build(&row, actor.clone(), consumers.clone(), &ExtractionMeta::default(), &classifier()).unwrap();

        assert_eq!(activity.verb, "messaged");
        assert_eq!(activity.provider_id, "3EB0ABC");
        assert_eq!(activity.actor, actor);
        assert_eq!(activity.end_at, Utc.with_ymd_and_hms(2021, 6, 1, 10, 11, 12).unwrap());
        assert_eq!(activity.dedupe_on.len(), 2);

        let message = &activity.involved;
        assert_eq!(message.body.as_deref(), Some("dinner at 7?"));
        assert_eq!(message.consumers, consumers);
        assert!(message.containers.is_some());
        assert!(message.contains.is_none());
        assert_eq!(
            message.dedupe_on,
            vec![vec![DedupeField::Represents, DedupeField::Provider, DedupeField::ProviderId]]
        );
    }

    #[test]
    fn test_build_fails_on_bad_timestamp() {
        let mut row = row("555@s.whatsapp.net");
        row.time = "not a time".to_string();
        let result = build(
            &row,
            Identity::new("1@s.whatsapp.net", None),
            Vec::new(),
            &ExtractionMeta::default(),
            &classifier(),
        );
        assert!(matches!(result, Err(TransformError::UnparseableTimestamp(_))));
    }
}
