use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Thread and reply identities are opaque strings owned by the backend.
pub type ThreadId = String;
pub type ReplyId = String;

/// Opaque pagination token. Passed back to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Only a backend mints cursors; the sync engine never builds one.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creation time as sent on the wire. The raw text is kept so a value the
/// client cannot parse still round-trips and sorts deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ReplyTimestamp {
    raw: String,
    parsed: Option<DateTime<Utc>>,
}

impl ReplyTimestamp {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        Self { raw, parsed }
    }

    pub fn valid(&self) -> Option<DateTime<Utc>> {
        self.parsed
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Valid timestamps order chronologically; invalid ones sort after all
    /// valid ones and compare equal among themselves.
    pub fn cmp_valid_first(&self, other: &Self) -> Ordering {
        match (self.parsed, other.parsed) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl From<DateTime<Utc>> for ReplyTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            raw: dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            parsed: Some(dt),
        }
    }
}

impl From<String> for ReplyTimestamp {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<ReplyTimestamp> for String {
    fn from(ts: ReplyTimestamp) -> Self {
        ts.raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct AuthorRef {
    pub id: String,
    pub name: String,
}

impl AuthorRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    pub fn same_user(&self, other: &AuthorRef) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reply {
    pub id: ReplyId,
    pub thread_id: ThreadId,
    pub content: String,
    pub author: AuthorRef,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: ReplyTimestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewReply {
    pub content: String,
}

/// One page of a thread's replies, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReplyPage {
    pub items: Vec<Reply>,
    #[schema(value_type = Option<String>)]
    pub next_cursor: Option<Cursor>,
}

/// Push notification delivered on a thread's live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelEvent {
    ReplyCreated { thread_id: ThreadId, reply: Reply },
    ReplyDeleted { thread_id: ThreadId, reply_id: ReplyId },
}

impl ChannelEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            ChannelEvent::ReplyCreated { thread_id, .. } => thread_id,
            ChannelEvent::ReplyDeleted { thread_id, .. } => thread_id,
        }
    }
}
