use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("invalid cursor")] InvalidCursor,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Position of the last reply handed out, newest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyset {
    pub created_at: DateTime<Utc>,
    pub id: ReplyId,
}

impl Keyset {
    pub fn of(reply: &Reply) -> Option<Self> {
        Some(Self { created_at: reply.created_at.valid()?, id: reply.id.clone() })
    }

    pub fn encode(&self) -> Cursor {
        let raw = format!("{}|{}", self.created_at.timestamp_micros(), self.id);
        Cursor::new(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn decode(cursor: &Cursor) -> RepoResult<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(cursor.as_str()).map_err(|_| RepoError::InvalidCursor)?;
        let raw = String::from_utf8(bytes).map_err(|_| RepoError::InvalidCursor)?;
        let (micros, id) = raw.split_once('|').ok_or(RepoError::InvalidCursor)?;
        let micros: i64 = micros.parse().map_err(|_| RepoError::InvalidCursor)?;
        let created_at = Utc.timestamp_micros(micros).single().ok_or(RepoError::InvalidCursor)?;
        Ok(Self { created_at, id: id.to_string() })
    }
}

/// Splits an over-fetched (limit + 1) newest-first result into a page.
fn into_page(mut items: Vec<Reply>, limit: usize) -> ReplyPage {
    let more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if more { items.last().and_then(Keyset::of).map(|k| k.encode()) } else { None };
    ReplyPage { items, next_cursor }
}

#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// Newest-first page of a thread's replies strictly older than `cursor`.
    async fn page_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> RepoResult<ReplyPage>;
    async fn get_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<Reply>;
    async fn create_reply(&self, thread_id: &str, author: AuthorRef, content: String) -> RepoResult<Reply>;
    async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<()>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::SubsecRound;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Clone)]
    struct Stored {
        reply: Reply,
        created_at: DateTime<Utc>,
    }

    #[derive(Clone, Default)]
    pub struct InMemRepo {
        threads: Arc<RwLock<HashMap<ThreadId, Vec<Stored>>>>,
    }

    fn poisoned<T>(_: T) -> RepoError {
        RepoError::Internal("reply store lock poisoned".into())
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts a reply with a caller-chosen timestamp (seeding, tests).
        pub fn insert_at(&self, thread_id: &str, author: AuthorRef, content: &str, at: DateTime<Utc>) -> RepoResult<Reply> {
            let at = at.trunc_subsecs(6);
            let reply = Reply {
                id: uuid::Uuid::new_v4().to_string(),
                thread_id: thread_id.to_string(),
                content: content.to_string(),
                author,
                created_at: at.into(),
            };
            let mut s = self.threads.write().map_err(poisoned)?;
            s.entry(thread_id.to_string())
                .or_default()
                .push(Stored { reply: reply.clone(), created_at: at });
            Ok(reply)
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn page_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> RepoResult<ReplyPage> {
            let after = cursor.map(Keyset::decode).transpose()?;
            let s = self.threads.read().map_err(poisoned)?;
            let mut v: Vec<&Stored> = s
                .get(thread_id)
                .map(|rows| rows.iter().collect())
                .unwrap_or_default();
            v.sort_by(|a, b| (b.created_at, &b.reply.id).cmp(&(a.created_at, &a.reply.id))); // newest first
            let items = v
                .into_iter()
                .filter(|r| match &after {
                    Some(k) => (r.created_at, &r.reply.id) < (k.created_at, &k.id),
                    None => true,
                })
                .take(limit.saturating_add(1))
                .map(|r| r.reply.clone())
                .collect();
            Ok(into_page(items, limit))
        }

        async fn get_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<Reply> {
            let s = self.threads.read().map_err(poisoned)?;
            s.get(thread_id)
                .and_then(|rows| rows.iter().find(|r| r.reply.id == reply_id))
                .map(|r| r.reply.clone())
                .ok_or(RepoError::NotFound)
        }

        async fn create_reply(&self, thread_id: &str, author: AuthorRef, content: String) -> RepoResult<Reply> {
            self.insert_at(thread_id, author, &content, Utc::now())
        }

        async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<()> {
            let mut s = self.threads.write().map_err(poisoned)?;
            let rows = s.get_mut(thread_id).ok_or(RepoError::NotFound)?;
            let pos = rows.iter().position(|r| r.reply.id == reply_id).ok_or(RepoError::NotFound)?;
            rows.remove(pos);
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store"); schema in migrations/.
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(sqlx::FromRow)]
    struct ReplyRow {
        id: String,
        thread_id: String,
        content: String,
        author_id: String,
        author_name: String,
        created_at: DateTime<Utc>,
    }

    impl From<ReplyRow> for Reply {
        fn from(r: ReplyRow) -> Self {
            Reply {
                id: r.id,
                thread_id: r.thread_id,
                content: r.content,
                author: AuthorRef { id: r.author_id, name: r.author_name },
                created_at: r.created_at.into(),
            }
        }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    const COLUMNS: &str = "id, thread_id, content, author_id, author_name, created_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    #[async_trait]
    impl ReplyRepo for PgRepo {
        async fn page_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> RepoResult<ReplyPage> {
            let after = cursor.map(Keyset::decode).transpose()?;
            let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);
            let rows = match after {
                Some(k) => sqlx::query_as::<_, ReplyRow>(&format!(
                    "SELECT {COLUMNS} FROM replies WHERE thread_id = $1 AND (created_at, id) < ($2, $3) \
                     ORDER BY created_at DESC, id DESC LIMIT $4"
                ))
                .bind(thread_id)
                .bind(k.created_at)
                .bind(k.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await,
                None => sqlx::query_as::<_, ReplyRow>(&format!(
                    "SELECT {COLUMNS} FROM replies WHERE thread_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
                ))
                .bind(thread_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await,
            }
            .map_err(db_err)?;
            Ok(into_page(rows.into_iter().map(Reply::from).collect(), limit))
        }

        async fn get_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<Reply> {
            let row = sqlx::query_as::<_, ReplyRow>(&format!(
                "SELECT {COLUMNS} FROM replies WHERE thread_id = $1 AND id = $2"
            ))
            .bind(thread_id)
            .bind(reply_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(row.into())
        }

        async fn create_reply(&self, thread_id: &str, author: AuthorRef, content: String) -> RepoResult<Reply> {
            let row = sqlx::query_as::<_, ReplyRow>(&format!(
                "INSERT INTO replies (id, thread_id, content, author_id, author_name) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
            ))
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(thread_id)
            .bind(content)
            .bind(author.id)
            .bind(author.name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(row.into())
        }

        async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> RepoResult<()> {
            let done = sqlx::query("DELETE FROM replies WHERE thread_id = $1 AND id = $2")
                .bind(thread_id)
                .bind(reply_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            if done.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }
}
