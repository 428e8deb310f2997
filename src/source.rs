//! Row source for a WhatsApp iOS backup
//!
//! Reads messages and group rosters out of `ChatStorage.sqlite` and pairs every
//! message row with the metadata the transformer needs. The database is opened
//! read-only; queries run on a blocking task behind the async [`RowSource`] seam.
//! Rows can be read a page at a time so a large backup never sits in memory whole.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::{debug, info, warn};

use crate::error::{HistoryError, Result};
use crate::models::{Extraction, ExtractionMeta, ExtractionRange, Me, Participant, RawMessageRow};
use crate::schema::{aliases, chat_sessions, group_members, media_items, messages, push_names, CORE_DATA_EPOCH_OFFSET};

/// Group rosters keyed by conversation JID
pub type Rosters = HashMap<String, Vec<Participant>>;

/// Produces raw rows paired with their metadata
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Every row the range selects, newest first
    async fn extract(&self, range: &ExtractionRange) -> Result<Vec<Extraction>>;

    /// At most `page_size` rows of the range, skipping the first `offset`.
    ///
    /// Pages follow the same order as [`RowSource::extract`] and never reach past
    /// the range's own limit.
    async fn extract_page(&self, range: &ExtractionRange, offset: usize, page_size: usize) -> Result<Vec<Extraction>>;

    /// Number of rows the range selects
    async fn results_count(&self, range: &ExtractionRange) -> Result<usize>;
}

/// Reads a local `ChatStorage.sqlite` backup
#[derive(Debug, Clone)]
pub struct SqliteRowSource {
    db_path: PathBuf,
    me: Me,
    rosters: Arc<OnceLock<Rosters>>,
}

impl SqliteRowSource {
    /// Create a source for the database at `db_path`, attributing outgoing
    /// messages to `me`
    pub fn new(db_path: impl Into<PathBuf>, me: Me) -> Result<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(HistoryError::WhatsAppDatabase(format!(
                "database not found at {}",
                db_path.display()
            )));
        }
        Ok(Self {
            db_path,
            me,
            rosters: Arc::new(OnceLock::new()),
        })
    }

    /// Path of the backing database
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| HistoryError::WhatsAppDatabase(format!("failed to open {}: {e}", self.db_path.display())))
    }

    /// Media files live next to the database under `result/Message/`
    fn attachment_path(&self, media_local_path: &str) -> PathBuf {
        self.db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("result")
            .join("Message")
            .join(media_local_path)
    }

    /// Blocking form of [`RowSource::extract`]
    pub fn extract_blocking(&self, range: &ExtractionRange) -> Result<Vec<Extraction>> {
        self.page_blocking(range, 0, None)
    }

    /// Blocking form of [`RowSource::extract_page`]
    pub fn extract_page_blocking(&self, range: &ExtractionRange, offset: usize, page_size: usize) -> Result<Vec<Extraction>> {
        self.page_blocking(range, offset, Some(page_size))
    }

    fn page_blocking(&self, range: &ExtractionRange, offset: usize, page_size: Option<usize>) -> Result<Vec<Extraction>> {
        let Some(limit) = page_limit(range, offset, page_size) else {
            return Ok(Vec::new());
        };

        let conn = self.connect()?;
        let rows = query_messages(&conn, range, offset, limit)?;
        let chats = self.rosters(&conn)?;
        info!(rows = rows.len(), offset, chats = chats.len(), "Loaded WhatsApp messages");

        let extractions = rows
            .into_iter()
            .map(|row| {
                let attachment_filename = row
                    .media_local_path
                    .as_deref()
                    .filter(|_| row.has_media())
                    .map(|path| self.attachment_path(path));
                let participants = chats.get(&row.container).cloned();

                Extraction {
                    meta: ExtractionMeta {
                        participants,
                        me: self.me.clone(),
                        attachment_filename,
                    },
                    row,
                }
            })
            .collect();

        Ok(extractions)
    }

    /// Rosters are read once per source and shared by every page
    fn rosters(&self, conn: &Connection) -> Result<&Rosters> {
        if let Some(rosters) = self.rosters.get() {
            return Ok(rosters);
        }
        let loaded = load_chats(conn)?;
        Ok(self.rosters.get_or_init(|| loaded))
    }

    /// Blocking form of [`RowSource::results_count`]
    pub fn results_count_blocking(&self, range: &ExtractionRange) -> Result<usize> {
        let conn = self.connect()?;
        let sql = format!("SELECT COUNT(*) FROM ({})", messages_sql());
        let count: i64 = conn.query_row(&sql, query_params(range, 0, None), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl RowSource for SqliteRowSource {
    async fn extract(&self, range: &ExtractionRange) -> Result<Vec<Extraction>> {
        let source = self.clone();
        let range = range.clone();
        tokio::task::spawn_blocking(move || source.extract_blocking(&range)).await?
    }

    async fn extract_page(&self, range: &ExtractionRange, offset: usize, page_size: usize) -> Result<Vec<Extraction>> {
        let source = self.clone();
        let range = range.clone();
        tokio::task::spawn_blocking(move || source.extract_page_blocking(&range, offset, page_size)).await?
    }

    async fn results_count(&self, range: &ExtractionRange) -> Result<usize> {
        let source = self.clone();
        let range = range.clone();
        tokio::task::spawn_blocking(move || source.results_count_blocking(&range)).await?
    }
}

fn messages_sql() -> String {
    let time_expr = format!(
        "datetime(m.{} + {}, 'unixepoch')",
        messages::MESSAGE_DATE,
        CORE_DATA_EPOCH_OFFSET
    );

    format!(
        "SELECT
            COALESCE(m.{from_jid}, m.{to_jid}) AS {container},
            chat.{partner_name},
            {time_expr} AS {time},
            gm.{member_jid},
            m.{stanza_id},
            m.{is_from_me},
            m.{from_jid},
            m.{text},
            media.{media_local_path},
            media.{vcard_string},
            media.{title}
        FROM {messages_table} AS m
            LEFT JOIN {group_members_table} AS gm ON m.{group_member} = gm.{gm_pk}
            LEFT JOIN {media_table} AS media ON m.{message_pk} = media.{media_message}
            LEFT JOIN {chats_table} AS chat ON chat.{contact_jid} = COALESCE(m.{from_jid}, m.{to_jid})
        WHERE m.{stanza_id} IS NOT NULL
            AND m.{message_date} IS NOT NULL
            AND COALESCE(m.{from_jid}, m.{to_jid}) IS NOT NULL
            AND (?1 IS NULL OR {time_expr} > ?1)
            AND (?2 IS NULL OR {time_expr} < ?2)
        ORDER BY {time} DESC, m.{message_pk} DESC
        LIMIT ?3 OFFSET ?4",
        from_jid = messages::FROM_JID,
        to_jid = messages::TO_JID,
        container = aliases::CONTAINER,
        partner_name = chat_sessions::PARTNER_NAME,
        time = aliases::TIME,
        member_jid = group_members::MEMBER_JID,
        stanza_id = messages::STANZA_ID,
        message_date = messages::MESSAGE_DATE,
        is_from_me = messages::IS_FROM_ME,
        text = messages::TEXT,
        media_local_path = media_items::MEDIA_LOCAL_PATH,
        vcard_string = media_items::VCARD_STRING,
        title = media_items::TITLE,
        messages_table = messages::TABLE,
        group_members_table = group_members::TABLE,
        group_member = messages::GROUP_MEMBER,
        gm_pk = group_members::PK,
        media_table = media_items::TABLE,
        message_pk = messages::PK,
        media_message = media_items::MESSAGE,
        chats_table = chat_sessions::TABLE,
        contact_jid = chat_sessions::CONTACT_JID,
    )
}

/// Range bounds in the layout SQLite `datetime()` produces
fn sqlite_time(instant: Option<DateTime<Utc>>) -> Option<String> {
    instant.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Rows to fetch for a page, or `None` when the range's limit is already used up
fn page_limit(range: &ExtractionRange, offset: usize, page_size: Option<usize>) -> Option<Option<usize>> {
    let remaining = match range.limit {
        Some(limit) if offset >= limit => return None,
        Some(limit) => Some(limit - offset),
        None => None,
    };
    let limit = match (remaining, page_size) {
        (Some(remaining), Some(size)) => Some(remaining.min(size)),
        (remaining, size) => remaining.or(size),
    };
    (limit != Some(0)).then_some(limit)
}

/// Bind values for `messages_sql`; a `None` limit becomes SQLite's "no limit"
fn query_params(range: &ExtractionRange, offset: usize, limit: Option<usize>) -> impl rusqlite::Params {
    let limit = limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    (sqlite_time(range.since), sqlite_time(range.until), limit, offset)
}

/// Load message rows, newest first.
pub fn load_messages(conn: &Connection, range: &ExtractionRange) -> Result<Vec<RawMessageRow>> {
    query_messages(conn, range, 0, range.limit)
}

fn query_messages(conn: &Connection, range: &ExtractionRange, offset: usize, limit: Option<usize>) -> Result<Vec<RawMessageRow>> {
    let mut stmt = conn.prepare(&messages_sql())?;
    let mapped = stmt.query_map(query_params(range, offset, limit), map_message_row)?;

    let mut rows = Vec::new();
    for row in mapped {
        match row? {
            Some(row) => rows.push(row),
            None => warn!("Skipping message row without stanza id, container or time"),
        }
    }

    debug!(count = rows.len(), "Loaded message rows");
    Ok(rows)
}

fn map_message_row(row: &Row) -> rusqlite::Result<Option<RawMessageRow>> {
    let stanza_id: Option<String> = row.get(messages::STANZA_ID)?;
    let container: Option<String> = row.get(aliases::CONTAINER)?;
    let time: Option<String> = row.get(aliases::TIME)?;

    let (Some(stanza_id), Some(container), Some(time)) = (stanza_id, container, time) else {
        return Ok(None);
    };

    Ok(Some(RawMessageRow {
        stanza_id,
        container,
        time,
        is_from_me: row.get(messages::IS_FROM_ME)?,
        partner_name: row.get(chat_sessions::PARTNER_NAME)?,
        member_jid: row.get(group_members::MEMBER_JID)?,
        from_jid: row.get(messages::FROM_JID)?,
        text: row.get(messages::TEXT)?,
        media_local_path: row.get(media_items::MEDIA_LOCAL_PATH)?,
        mime_type: row.get(media_items::VCARD_STRING)?,
        media_title: row.get(media_items::TITLE)?,
    }))
}

/// Load group rosters keyed by conversation JID
pub fn load_chats(conn: &Connection) -> Result<Rosters> {
    let sql = format!(
        "SELECT chat.{contact_jid}, gm.{member_jid}, profile.{push_name}
        FROM {group_members_table} AS gm
            LEFT JOIN {chats_table} AS chat ON gm.{chat_session} = chat.{chat_pk}
            LEFT JOIN {push_names_table} AS profile ON gm.{member_jid} = profile.{jid}
        ORDER BY chat.{contact_jid}",
        contact_jid = chat_sessions::CONTACT_JID,
        member_jid = group_members::MEMBER_JID,
        push_name = push_names::PUSH_NAME,
        group_members_table = group_members::TABLE,
        chats_table = chat_sessions::TABLE,
        chat_session = group_members::CHAT_SESSION,
        chat_pk = chat_sessions::PK,
        push_names_table = push_names::TABLE,
        jid = push_names::JID,
    );

    let mut stmt = conn.prepare(&sql)?;
    let members = stmt.query_map(params![], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            Participant {
                member_jid: row.get(1)?,
                push_name: row.get(2)?,
            },
        ))
    })?;

    let mut chats = Rosters::new();
    for member in members {
        let (chat_jid, participant) = member?;
        if let Some(chat_jid) = chat_jid {
            chats.entry(chat_jid).or_default().push(participant);
        }
    }

    Ok(chats)
}
