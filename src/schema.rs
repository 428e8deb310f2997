//! WhatsApp iOS database schema definitions
//!
//! This module provides constants for the Core Data tables and columns of
//! `ChatStorage.sqlite` that the row source reads, plus the aliases the message
//! query exposes.

/// Seconds between the Unix epoch and the Core Data epoch (2001-01-01 UTC)
pub const CORE_DATA_EPOCH_OFFSET: i64 = 978_307_200;

/// Messages table schema
pub mod messages {
    /// Table name
    pub const TABLE: &str = "ZWAMESSAGE";
    /// Primary key column
    pub const PK: &str = "Z_PK";
    /// Native message id column
    pub const STANZA_ID: &str = "ZSTANZAID";
    /// Flag indicating if message is from current user
    pub const IS_FROM_ME: &str = "ZISFROMME";
    /// Sender JID column
    pub const FROM_JID: &str = "ZFROMJID";
    /// Recipient JID column
    pub const TO_JID: &str = "ZTOJID";
    /// Message text column
    pub const TEXT: &str = "ZTEXT";
    /// Core Data timestamp column
    pub const MESSAGE_DATE: &str = "ZMESSAGEDATE";
    /// Foreign key to group members table
    pub const GROUP_MEMBER: &str = "ZGROUPMEMBER";
}

/// Group members table schema
pub mod group_members {
    /// Table name
    pub const TABLE: &str = "ZWAGROUPMEMBER";
    /// Primary key column
    pub const PK: &str = "Z_PK";
    /// Member JID column
    pub const MEMBER_JID: &str = "ZMEMBERJID";
    /// Foreign key to chat sessions table
    pub const CHAT_SESSION: &str = "ZCHATSESSION";
}

/// Chat sessions table schema
pub mod chat_sessions {
    /// Table name
    pub const TABLE: &str = "ZWACHATSESSION";
    /// Primary key column
    pub const PK: &str = "Z_PK";
    /// Conversation JID column
    pub const CONTACT_JID: &str = "ZCONTACTJID";
    /// Partner or group name column
    pub const PARTNER_NAME: &str = "ZPARTNERNAME";
}

/// Media items table schema
pub mod media_items {
    /// Table name
    pub const TABLE: &str = "ZWAMEDIAITEM";
    /// Foreign key to messages table
    pub const MESSAGE: &str = "ZMESSAGE";
    /// Media path column, relative to the backup's `Message` folder
    pub const MEDIA_LOCAL_PATH: &str = "ZMEDIALOCALPATH";
    /// MIME-like type column
    pub const VCARD_STRING: &str = "ZVCARDSTRING";
    /// Media title column
    pub const TITLE: &str = "ZTITLE";
}

/// Push names table schema
pub mod push_names {
    /// Table name
    pub const TABLE: &str = "ZWAPROFILEPUSHNAME";
    /// Member JID column
    pub const JID: &str = "ZJID";
    /// Display name column
    pub const PUSH_NAME: &str = "ZPUSHNAME";
}

/// Aliases selected by the message query
pub mod aliases {
    /// `COALESCE(ZFROMJID, ZTOJID)`
    pub const CONTAINER: &str = "container";
    /// Message time rendered by SQLite `datetime()`, UTC
    pub const TIME: &str = "time";
}
