#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rib_live::client::{EventSource, EventStream, ReplyApi};
use rib_live::error::{SyncError, SyncResult};
use rib_live::models::{AuthorRef, ChannelEvent, Cursor, Reply, ReplyPage, ReplyTimestamp};
use tokio::sync::Notify;

pub const THREAD: &str = "thread-1";

/// Minute `n` of 2024-01-01, for readable ordering in tests.
pub fn ts(n: u32) -> String {
    format!("2024-01-01T{:02}:{:02}:00Z", n / 60, n % 60)
}

pub fn reply(id: &str, author: &str, minute: u32) -> Reply {
    Reply {
        id: id.to_string(),
        thread_id: THREAD.to_string(),
        content: format!("content of {id}"),
        author: AuthorRef::new(author, author.to_uppercase()),
        created_at: ReplyTimestamp::parse(ts(minute)),
    }
}

/// `count` replies by "other", ids `{prefix}{i}`, minutes from `first_minute`.
pub fn replies(prefix: &str, first_minute: u32, count: u32) -> Vec<Reply> {
    (0..count).map(|i| reply(&format!("{prefix}{i}"), "other", first_minute + i)).collect()
}

pub fn page(items: Vec<Reply>, next: Option<&str>) -> ReplyPage {
    ReplyPage { items, next_cursor: next.map(Cursor::new) }
}

pub fn created(reply: Reply) -> ChannelEvent {
    ChannelEvent::ReplyCreated { thread_id: reply.thread_id.clone(), reply }
}

pub fn deleted(id: &str) -> ChannelEvent {
    ChannelEvent::ReplyDeleted { thread_id: THREAD.to_string(), reply_id: id.to_string() }
}

pub fn me() -> AuthorRef {
    AuthorRef::new("me", "Me")
}

/// Scripted [`ReplyApi`]: pages keyed by the cursor they answer.
#[derive(Default)]
pub struct FakeApi {
    pages: Mutex<HashMap<Option<String>, ReplyPage>>,
    pub seen_cursors: Mutex<Vec<Option<String>>>,
    pub fail_fetch: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub creates: AtomicUsize,
    pub deletes: Mutex<Vec<String>>,
    /// When set, fetches wait for a notification before answering.
    gate: Mutex<Option<Arc<Notify>>>,
    /// Same, for creates.
    create_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn with_pages(pages: Vec<(Option<&str>, ReplyPage)>) -> Arc<Self> {
        let api = Self::default();
        {
            let mut map = api.pages.lock().unwrap();
            for (cursor, page) in pages {
                map.insert(cursor.map(str::to_string), page);
            }
        }
        Arc::new(api)
    }

    pub fn gate_fetches(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn gate_creates(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.create_gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn fetch_count(&self) -> usize {
        self.seen_cursors.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplyApi for FakeApi {
    async fn paged_replies(&self, thread_id: &str, cursor: Option<&Cursor>, _limit: usize) -> SyncResult<ReplyPage> {
        assert_eq!(thread_id, THREAD);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let key = cursor.map(|c| c.as_str().to_string());
        self.seen_cursors.lock().unwrap().push(key.clone());
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection reset".into()));
        }
        self.pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(SyncError::Status { status: 404, body: format!("no page for {key:?}") })
    }

    async fn create_reply(&self, thread_id: &str, content: &str) -> SyncResult<Reply> {
        let gate = self.create_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SyncError::Status { status: 503, body: "unavailable".into() });
        }
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Reply {
            id: format!("mine-{n}"),
            thread_id: thread_id.to_string(),
            content: content.to_string(),
            author: me(),
            created_at: ReplyTimestamp::parse(format!("2030-01-01T00:00:{n:02}Z")),
        })
    }

    async fn delete_reply(&self, _thread_id: &str, reply_id: &str) -> SyncResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("timeout".into()));
        }
        self.deletes.lock().unwrap().push(reply_id.to_string());
        Ok(())
    }
}

/// Event source whose every connection replays the next scripted session
/// and then drops, as a flaky transport would.
#[derive(Default)]
pub struct ScriptedSource {
    sessions: Mutex<VecDeque<Vec<ChannelEvent>>>,
    pub connects: AtomicUsize,
    pub rooms: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(sessions: Vec<Vec<ChannelEvent>>) -> Arc<Self> {
        Arc::new(Self { sessions: Mutex::new(sessions.into()), ..Default::default() })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn connect(&self, thread_id: &str) -> SyncResult<EventStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.rooms.lock().unwrap().push(thread_id.to_string());
        match self.sessions.lock().unwrap().pop_front() {
            Some(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            // nothing left to replay: stay connected and quiet
            None => Ok(stream::pending().boxed()),
        }
    }
}
