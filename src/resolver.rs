//! Sender and receiver resolution
//!
//! Works out who sent a message and who received it. Both fallback chains (where the
//! roster comes from, and which column names the sender) are ordered strategy lists:
//! the first strategy returning `Some` wins.

use tracing::trace;

use crate::error::TransformError;
use crate::models::{ExtractionMeta, Identity, Me, Participant, RawMessageRow};

/// Produces a roster for a row, or `None` to defer to the next strategy
pub type RosterStrategy = fn(&RawMessageRow, &ExtractionMeta) -> Option<Vec<Participant>>;

/// Picks the sender JID out of a row, or `None` to defer to the next strategy
pub type SenderIdStrategy = for<'a> fn(&'a RawMessageRow) -> Option<&'a str>;

/// Roster sources in priority order
pub const ROSTER_STRATEGIES: &[(&str, RosterStrategy)] = &[
    ("explicit", explicit_roster),
    ("synthesized_partner", synthesized_roster),
];

/// Sender id columns in priority order
pub const SENDER_ID_STRATEGIES: &[(&str, SenderIdStrategy)] = &[
    ("group_member", group_member_id),
    ("from_jid", from_jid),
];

/// Sender and receivers of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The sending identity
    pub actor: Identity,
    /// The receiving identities, in roster order
    pub consumers: Vec<Identity>,
}

/// The roster supplied with the row's metadata. Empty lists count as absent.
#[must_use]
pub fn explicit_roster(_row: &RawMessageRow, meta: &ExtractionMeta) -> Option<Vec<Participant>> {
    meta.participants.clone().filter(|roster| !roster.is_empty())
}

/// One-to-one chats carry no group membership, so the chat partner is the only
/// participant: their JID is the conversation container.
#[must_use]
pub fn synthesized_roster(row: &RawMessageRow, _meta: &ExtractionMeta) -> Option<Vec<Participant>> {
    Some(vec![Participant::new(row.container.clone(), row.partner_name.clone())])
}

/// `ZMEMBERJID`, set on group messages
#[must_use]
pub fn group_member_id(row: &RawMessageRow) -> Option<&str> {
    row.member_jid.as_deref().filter(|jid| !jid.is_empty())
}

/// `ZFROMJID`
#[must_use]
pub fn from_jid(row: &RawMessageRow) -> Option<&str> {
    row.from_jid.as_deref().filter(|jid| !jid.is_empty())
}

/// Resolve the row's roster from the first strategy that yields one
#[must_use]
pub fn resolve_roster(row: &RawMessageRow, meta: &ExtractionMeta) -> Vec<Participant> {
    ROSTER_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let roster = strategy(row, meta)?;
            trace!(strategy = name, size = roster.len(), "Resolved roster");
            Some(roster)
        })
        .unwrap_or_default()
}

/// Resolve the sender JID from the first column that carries one
#[must_use]
pub fn resolve_sender_id(row: &RawMessageRow) -> Option<&str> {
    SENDER_ID_STRATEGIES.iter().find_map(|(name, strategy)| {
        let id = strategy(row)?;
        trace!(strategy = name, sender = id, "Resolved sender id");
        Some(id)
    })
}

/// The local user's identity
#[must_use]
pub fn identity_for_me(me: &Me) -> Identity {
    Identity::new(me.member_id.clone(), Some(me.name.clone()))
}

/// Build the identity of a roster entry.
///
/// An entry carrying the local user's JID is named after the local user, whatever
/// name the roster stored for it.
pub fn identity_for(participant: &Participant, me: &Me) -> Result<Identity, TransformError> {
    let jid = participant
        .member_jid
        .as_deref()
        .ok_or_else(|| TransformError::UnresolvableContact(format!("roster entry {participant:?} has no member id")))?;

    let title = if jid == me.member_id {
        Some(me.name.clone())
    } else {
        participant.push_name.clone()
    };

    Ok(Identity::new(jid, title))
}

/// Determine the sender and receivers of a row.
///
/// Messages from the local user go to every roster member. For incoming messages
/// the sender is looked up in the roster by JID and everyone else receives it; when
/// nobody else is on the roster (a one-to-one chat) the local user is the receiver.
pub fn resolve(row: &RawMessageRow, meta: &ExtractionMeta) -> Result<Resolved, TransformError> {
    let roster = resolve_roster(row, meta);
    let me = identity_for_me(&meta.me);

    if row.from_me()? {
        let consumers = roster
            .iter()
            .map(|participant| identity_for(participant, &meta.me))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Resolved { actor: me, consumers });
    }

    let sender_id = resolve_sender_id(row).ok_or_else(|| {
        TransformError::UnresolvableActor(format!(
            "message {} names no sender",
            row.stanza_id
        ))
    })?;

    let sender = roster
        .iter()
        .find(|participant| participant.member_jid.as_deref() == Some(sender_id))
        .ok_or_else(|| {
            TransformError::UnresolvableActor(format!(
                "sender {sender_id} of message {} is not a member of {}",
                row.stanza_id, row.container
            ))
        })?;
    let actor = identity_for(sender, &meta.me)?;

    let mut consumers = roster
        .iter()
        .filter(|participant| participant.member_jid.as_deref() != Some(sender_id))
        .map(|participant| identity_for(participant, &meta.me))
        .collect::<Result<Vec<_>, _>>()?;

    if consumers.is_empty() && actor.provider_id != me.provider_id {
        consumers.push(me);
    }

    Ok(Resolved { actor, consumers })
}
