//! Shared fixture: a minimal `ChatStorage.sqlite` in a temporary directory

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use tempfile::TempDir;
use whatsapp_history_rust::models::Me;
use whatsapp_history_rust::schema::CORE_DATA_EPOCH_OFFSET;

pub const ME_ID: &str = "15550000000@s.whatsapp.net";
pub const ME_NAME: &str = "Jess";

pub fn me() -> Me {
    Me {
        name: ME_NAME.to_string(),
        member_id: ME_ID.to_string(),
    }
}

/// 2021-06-01 at `hour`:00:00 UTC
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 1, hour, 0, 0).unwrap()
}

/// One `ZWAMESSAGE` row
pub struct FixtureMessage {
    pub pk: i64,
    pub stanza_id: Option<String>,
    pub from_me: i64,
    pub from_jid: Option<String>,
    pub to_jid: Option<String>,
    pub text: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub group_member: Option<i64>,
}

impl FixtureMessage {
    pub fn outgoing(pk: i64, stanza_id: &str, to_jid: &str, text: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            pk,
            stanza_id: Some(stanza_id.to_string()),
            from_me: 1,
            from_jid: None,
            to_jid: Some(to_jid.to_string()),
            text: Some(text.to_string()),
            sent_at,
            group_member: None,
        }
    }

    pub fn incoming(pk: i64, stanza_id: &str, from_jid: &str, text: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            pk,
            stanza_id: Some(stanza_id.to_string()),
            from_me: 0,
            from_jid: Some(from_jid.to_string()),
            to_jid: Some(ME_ID.to_string()),
            text: Some(text.to_string()),
            sent_at,
            group_member: None,
        }
    }

    pub fn from_member(mut self, member_pk: i64) -> Self {
        self.group_member = Some(member_pk);
        self
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
    conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("ChatStorage.sqlite");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE ZWAMESSAGE (
                Z_PK INTEGER PRIMARY KEY,
                ZSTANZAID TEXT,
                ZISFROMME INTEGER,
                ZFROMJID TEXT,
                ZTOJID TEXT,
                ZTEXT TEXT,
                ZMESSAGEDATE REAL,
                ZGROUPMEMBER INTEGER
            );
            CREATE TABLE ZWAGROUPMEMBER (
                Z_PK INTEGER PRIMARY KEY,
                ZMEMBERJID TEXT,
                ZCHATSESSION INTEGER
            );
            CREATE TABLE ZWACHATSESSION (
                Z_PK INTEGER PRIMARY KEY,
                ZCONTACTJID TEXT,
                ZPARTNERNAME TEXT
            );
            CREATE TABLE ZWAMEDIAITEM (
                Z_PK INTEGER PRIMARY KEY,
                ZMESSAGE INTEGER,
                ZMEDIALOCALPATH TEXT,
                ZVCARDSTRING TEXT,
                ZTITLE TEXT
            );
            CREATE TABLE ZWAPROFILEPUSHNAME (
                Z_PK INTEGER PRIMARY KEY,
                ZJID TEXT,
                ZPUSHNAME TEXT
            );",
        )
        .unwrap();

        Self { dir, db_path, conn }
    }

    pub fn add_chat(&self, pk: i64, jid: &str, name: &str) {
        self.conn
            .execute(
                "INSERT INTO ZWACHATSESSION (Z_PK, ZCONTACTJID, ZPARTNERNAME) VALUES (?1, ?2, ?3)",
                params![pk, jid, name],
            )
            .unwrap();
    }

    pub fn add_group_member(&self, pk: i64, chat_pk: i64, member_jid: &str, push_name: Option<&str>) {
        self.conn
            .execute(
                "INSERT INTO ZWAGROUPMEMBER (Z_PK, ZMEMBERJID, ZCHATSESSION) VALUES (?1, ?2, ?3)",
                params![pk, member_jid, chat_pk],
            )
            .unwrap();
        if let Some(push_name) = push_name {
            self.conn
                .execute(
                    "INSERT INTO ZWAPROFILEPUSHNAME (ZJID, ZPUSHNAME) VALUES (?1, ?2)",
                    params![member_jid, push_name],
                )
                .unwrap();
        }
    }

    pub fn add_message(&self, message: &FixtureMessage) {
        let core_data_seconds = (message.sent_at.timestamp() - CORE_DATA_EPOCH_OFFSET) as f64;
        self.conn
            .execute(
                "INSERT INTO ZWAMESSAGE
                    (Z_PK, ZSTANZAID, ZISFROMME, ZFROMJID, ZTOJID, ZTEXT, ZMESSAGEDATE, ZGROUPMEMBER)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.pk,
                    message.stanza_id,
                    message.from_me,
                    message.from_jid,
                    message.to_jid,
                    message.text,
                    core_data_seconds,
                    message.group_member,
                ],
            )
            .unwrap();
    }

    pub fn add_media(&self, message_pk: i64, local_path: &str, mime: &str, title: Option<&str>) {
        self.conn
            .execute(
                "INSERT INTO ZWAMEDIAITEM (ZMESSAGE, ZMEDIALOCALPATH, ZVCARDSTRING, ZTITLE) VALUES (?1, ?2, ?3, ?4)",
                params![message_pk, local_path, mime, title],
            )
            .unwrap();
    }

    /// Write a media file where the row source expects it
    pub fn write_media_file(&self, local_path: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join("result").join("Message").join(local_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }
}
