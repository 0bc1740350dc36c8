use std::convert::Infallible;
use std::sync::Arc;

use actix_web::web::Bytes;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::client::{EventSource, EventStream};
use crate::error::{SyncError, SyncResult};
use crate::models::{ChannelEvent, ThreadId};

/// Per-thread broadcast rooms for reply notifications (process local).
#[derive(Clone)]
pub struct ReplyHub {
    rooms: Arc<DashMap<ThreadId, broadcast::Sender<ChannelEvent>>>,
    capacity: usize,
}

impl Default for ReplyHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ReplyHub {
    pub fn new(capacity: usize) -> Self {
        Self { rooms: Arc::new(DashMap::new()), capacity: capacity.max(1) }
    }

    pub fn join(&self, thread_id: &str) -> broadcast::Receiver<ChannelEvent> {
        self.rooms
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `event` to its thread's room. Returns how many members got it;
    /// rooms nobody listens to are dropped.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        let thread_id = event.thread_id().to_string();
        let delivered = match self.rooms.get(&thread_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.rooms.remove_if(&thread_id, |_, tx| tx.receiver_count() == 0);
        }
        delivered
    }

    pub fn members(&self, thread_id: &str) -> usize {
        self.rooms.get(thread_id).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

/// Newline-delimited JSON body for a room member. Ends if the member falls
/// too far behind, so its client reconnects.
pub fn ndjson_stream(rx: broadcast::Receiver<ChannelEvent>) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_vec(&event) {
                    Ok(mut line) => {
                        line.push(b'\n');
                        return Some((Ok(Bytes::from(line)), rx));
                    }
                    Err(e) => log::error!("event encode failed: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("room member lagged by {skipped} events; closing stream");
                    return None;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// In-process event source, for hosts that embed the backend.
#[async_trait]
impl EventSource for ReplyHub {
    async fn connect(&self, thread_id: &str) -> SyncResult<EventStream> {
        let rx = self.join(thread_id);
        Ok(stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((Ok(event), rx)),
                Err(RecvError::Lagged(skipped)) => Some((Err(SyncError::Transport(format!("lagged by {skipped} events"))), rx)),
                Err(RecvError::Closed) => None,
            }
        })
        .boxed())
    }
}
