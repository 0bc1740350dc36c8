use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Method, Url};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::models::{ChannelEvent, Cursor, NewReply, Reply, ReplyPage};

/// Request/response collaborator for a thread's replies.
#[async_trait]
pub trait ReplyApi: Send + Sync {
    async fn paged_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> SyncResult<ReplyPage>;
    async fn create_reply(&self, thread_id: &str, content: &str) -> SyncResult<Reply>;
    async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> SyncResult<()>;
}

pub type EventStream = BoxStream<'static, SyncResult<ChannelEvent>>;

/// Push collaborator. Opening a stream joins the thread's room; dropping
/// it leaves. Streams end (or yield an error) when the transport drops.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(&self, thread_id: &str) -> SyncResult<EventStream>;
}

/// HTTP implementation of both collaborators against the rib-live backend.
#[derive(Clone)]
pub struct HttpClient {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: &str) -> SyncResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SyncError::Transport(format!("invalid base url: {e}")))?;
        Ok(Self { base_url, token: None, http: reqwest::Client::new() })
    }

    /// Bearer token identifying the local session (needed to post/delete).
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn thread_url(&self, thread_id: &str, tail: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Transport("base url cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["api", "v1", "threads", thread_id])
            .extend(tail);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let req = self.http.request(method, url);
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

async fn check_status(resp: reqwest::Response) -> SyncResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl ReplyApi for HttpClient {
    async fn paged_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> SyncResult<ReplyPage> {
        let url = self.thread_url(thread_id, &["replies"])?;
        let mut query = vec![("limit", limit.to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c.as_str().to_string()));
        }
        let resp = self.request(Method::GET, url).query(&query).send().await?;
        Ok(check_status(resp).await?.json::<ReplyPage>().await?)
    }

    async fn create_reply(&self, thread_id: &str, content: &str) -> SyncResult<Reply> {
        let url = self.thread_url(thread_id, &["replies"])?;
        let resp = self
            .request(Method::POST, url)
            .json(&NewReply { content: content.to_string() })
            .send()
            .await?;
        Ok(check_status(resp).await?.json::<Reply>().await?)
    }

    async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> SyncResult<()> {
        let url = self.thread_url(thread_id, &["replies", reply_id])?;
        let resp = self.request(Method::DELETE, url).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl EventSource for HttpClient {
    async fn connect(&self, thread_id: &str) -> SyncResult<EventStream> {
        let url = self.thread_url(thread_id, &["events"])?;
        let resp = self.request(Method::GET, url).send().await?;
        let resp = check_status(resp).await?;
        Ok(decode_ndjson(resp.bytes_stream()))
    }
}

fn parse_line(line: &[u8]) -> Option<ChannelEvent> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(ev) => Some(ev),
        Err(e) => {
            debug!(error = %e, "dropping malformed channel line");
            None
        }
    }
}

struct LineDecoder<S> {
    chunks: std::pin::Pin<Box<S>>,
    buf: Vec<u8>,
    ready: VecDeque<ChannelEvent>,
    done: bool,
}

impl<S> LineDecoder<S> {
    fn take_lines(&mut self) {
        while let Some(nl) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=nl).collect();
            if let Some(ev) = parse_line(&line) {
                self.ready.push_back(ev);
            }
        }
    }
}

/// Turns a byte stream of newline-delimited JSON into channel events.
/// Blank and malformed lines are skipped; a transport error is yielded
/// once and ends the stream.
pub fn decode_ndjson<S, B, E>(chunks: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let decoder = LineDecoder { chunks: Box::pin(chunks), buf: Vec::new(), ready: VecDeque::new(), done: false };
    stream::unfold(decoder, |mut dec| async move {
        loop {
            if let Some(ev) = dec.ready.pop_front() {
                return Some((Ok(ev), dec));
            }
            if dec.done {
                return None;
            }
            match dec.chunks.next().await {
                Some(Ok(chunk)) => {
                    dec.buf.extend_from_slice(chunk.as_ref());
                    dec.take_lines();
                }
                Some(Err(e)) => {
                    dec.done = true;
                    return Some((Err(SyncError::Transport(e.to_string())), dec));
                }
                None => {
                    dec.done = true;
                    let rest = std::mem::take(&mut dec.buf);
                    if let Some(ev) = parse_line(&rest) {
                        dec.ready.push_back(ev);
                    }
                }
            }
        }
    })
    .boxed()
}
