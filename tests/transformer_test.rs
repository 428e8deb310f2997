//! Integration tests for turning rows into record graphs

mod common;

use std::collections::BTreeSet;
use std::fs;

use common::{me, ME_ID, ME_NAME};
use proptest::prelude::*;
use tempfile::tempdir;
use whatsapp_history_rust::attachment::{AttachmentClassifier, Base64Encoder, DisabledRecognizer};
use whatsapp_history_rust::models::{
    AttachmentKind, Dedupable, DedupeField, Extraction, ExtractionMeta, Participant, RawMessageRow, Represents,
};
use whatsapp_history_rust::{MessageTransformer, TransformError};

fn extraction(row: RawMessageRow, participants: Option<Vec<Participant>>) -> Extraction {
    Extraction {
        row,
        meta: ExtractionMeta {
            participants,
            me: me(),
            attachment_filename: None,
        },
    }
}

#[test]
fn test_group_message_from_me() {
    let row = RawMessageRow {
        stanza_id: "3EB0G1".to_string(),
        container: "123@g.us".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(1),
        partner_name: Some("Family".to_string()),
        text: Some("dinner?".to_string()),
        ..RawMessageRow::default()
    };
    let roster = vec![
        Participant::new("123@g.us", Some("Family".to_string())),
        Participant::new("456", Some("Sam".to_string())),
    ];

    let activity = MessageTransformer::default()
        .transform(&extraction(row, Some(roster)))
        .unwrap();

    assert_eq!(activity.actor.provider_id, ME_ID);
    assert_eq!(activity.actor.title.as_deref(), Some(ME_NAME));
    let consumer_ids: BTreeSet<&str> = activity
        .involved
        .consumers
        .iter()
        .map(|c| c.provider_id.as_str())
        .collect();
    assert_eq!(consumer_ids, BTreeSet::from(["123@g.us", "456"]));

    let thread = activity.involved.containers.as_ref().unwrap();
    assert_eq!(thread.provider_id, "123@g.us");
    assert_eq!(thread.represents, Represents::Thread);
    assert_eq!(activity.involved.body.as_deref(), Some("dinner?"));
}

#[test]
fn test_one_to_one_incoming_uses_synthesized_roster() {
    let row = RawMessageRow {
        stanza_id: "IN1".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(0),
        partner_name: Some("Pat".to_string()),
        from_jid: Some("555@s.whatsapp.net".to_string()),
        ..RawMessageRow::default()
    };

    let activity = MessageTransformer::default().transform(&extraction(row, None)).unwrap();

    assert_eq!(activity.actor.provider_id, "555@s.whatsapp.net");
    assert_eq!(activity.actor.title.as_deref(), Some("Pat"));
    assert_eq!(activity.involved.consumers.len(), 1);
    assert_eq!(activity.involved.consumers[0].provider_id, ME_ID);
    assert!(activity.involved.containers.is_none());
}

#[test]
fn test_text_plain_media_yields_no_attachment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, b"shopping list").unwrap();

    let row = RawMessageRow {
        stanza_id: "DOC1".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(1),
        media_local_path: Some("Media/notes.txt".to_string()),
        mime_type: Some("text/plain".to_string()),
        ..RawMessageRow::default()
    };
    let mut extraction = extraction(row, None);
    extraction.meta.attachment_filename = Some(path);

    let activity = MessageTransformer::default().transform(&extraction).unwrap();

    assert!(activity.involved.contains.is_none());
}

#[test]
fn test_audio_attachment_is_encoded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("voice.opus");
    fs::write(&path, b"opus").unwrap();

    let row = RawMessageRow {
        stanza_id: "AUD1".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(1),
        media_local_path: Some("Media/voice.opus".to_string()),
        mime_type: Some("audio/ogg".to_string()),
        media_title: Some("voice note".to_string()),
        ..RawMessageRow::default()
    };
    let mut extraction = extraction(row, None);
    extraction.meta.attachment_filename = Some(path);

    let activity = MessageTransformer::default().transform(&extraction).unwrap();
    let attachment = activity.involved.contains.unwrap();

    assert_eq!(attachment.represents, AttachmentKind::Audio);
    assert_eq!(attachment.provider_id, "AUD1");
    assert_eq!(attachment.title.as_deref(), Some("voice note"));
    assert_eq!(attachment.payload.data, "data:audio/ogg;base64,b3B1cw==");
    assert!(attachment.metadata.ocr_text.is_none());
    assert_eq!(
        attachment.dedupe_on,
        vec![vec![DedupeField::Provider, DedupeField::ProviderId, DedupeField::Represents]]
    );
}

#[test]
fn test_oversized_attachment_fails_the_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    fs::write(&path, vec![0_u8; 64]).unwrap();

    let row = RawMessageRow {
        stanza_id: "VID1".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(1),
        media_local_path: Some("Media/clip.mp4".to_string()),
        mime_type: Some("video/mp4".to_string()),
        ..RawMessageRow::default()
    };
    let mut extraction = extraction(row, None);
    extraction.meta.attachment_filename = Some(path);

    let transformer = MessageTransformer::new(AttachmentClassifier::new(
        Box::new(DisabledRecognizer),
        Box::new(Base64Encoder::new(16)),
    ));
    let result = transformer.transform(&extraction);

    assert!(matches!(result, Err(TransformError::AttachmentEncoding { .. })));
}

#[test]
fn test_unparseable_timestamp_fails_the_row() {
    let row = RawMessageRow {
        stanza_id: "BAD1".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "yesterday-ish".to_string(),
        is_from_me: Some(1),
        ..RawMessageRow::default()
    };

    let result = MessageTransformer::default().transform(&extraction(row, None));

    assert_eq!(
        result,
        Err(TransformError::UnparseableTimestamp("yesterday-ish".to_string()))
    );
}

#[test]
fn test_unknown_sender_fails_the_row() {
    let row = RawMessageRow {
        stanza_id: "GRP9".to_string(),
        container: "123@g.us".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(0),
        member_jid: Some("999@s.whatsapp.net".to_string()),
        ..RawMessageRow::default()
    };
    let roster = vec![Participant::new("456", None)];

    let result = MessageTransformer::default().transform(&extraction(row, Some(roster)));

    assert!(matches!(result, Err(TransformError::UnresolvableActor(_))));
}

#[test]
fn test_activity_dedupe_keys() {
    let row = RawMessageRow {
        stanza_id: "ABC".to_string(),
        container: "555@s.whatsapp.net".to_string(),
        time: "2021-06-01 10:00:00".to_string(),
        is_from_me: Some(1),
        ..RawMessageRow::default()
    };

    let activity = MessageTransformer::default().transform(&extraction(row, None)).unwrap();

    assert_eq!(
        activity.dedupe_keys(),
        vec![
            "verb=messaged|provider=whatsapp|end_at=2021-06-01T10:00:00Z".to_string(),
            "verb=messaged|provider=whatsapp|provider_id=ABC".to_string(),
        ]
    );
    assert_eq!(
        activity.involved.dedupe_keys(),
        vec!["represents=message|provider=whatsapp|provider_id=ABC".to_string()]
    );
}

fn arb_row() -> impl Strategy<Value = RawMessageRow> {
    (
        "[A-F0-9]{8,16}",
        prop_oneof!["[0-9]{6,12}@s\\.whatsapp\\.net", "[0-9]{6,12}-[0-9]{6}@g\\.us"],
        0_i64..=1,
        proptest::option::of("[a-z ]{0,20}"),
        1_500_000_000_i64..1_800_000_000,
    )
        .prop_map(|(stanza_id, container, is_from_me, text, seconds)| RawMessageRow {
            stanza_id,
            from_jid: (is_from_me == 0).then(|| container.clone()),
            container,
            time: chrono::DateTime::from_timestamp(seconds, 0)
                .unwrap()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            is_from_me: Some(is_from_me),
            text,
            ..RawMessageRow::default()
        })
}

proptest! {
    #[test]
    fn prop_retransform_is_idempotent(row in arb_row()) {
        let transformer = MessageTransformer::default();
        let extraction = extraction(row, None);

        let first = transformer.transform(&extraction).unwrap();
        let second = transformer.transform(&extraction).unwrap();

        prop_assert_eq!(first.dedupe_keys(), second.dedupe_keys());
        prop_assert_eq!(&first.dedupe_on, &second.dedupe_on);
        prop_assert_eq!(first.involved.dedupe_keys(), second.involved.dedupe_keys());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_thread_iff_group_container(row in arb_row()) {
        let is_group = row.container.ends_with("g.us");
        let activity = MessageTransformer::default().transform(&extraction(row, None)).unwrap();
        prop_assert_eq!(activity.involved.containers.is_some(), is_group);
    }
}
