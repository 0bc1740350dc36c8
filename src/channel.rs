use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::EventSource;
use crate::config::ViewConfig;
use crate::models::{ChannelEvent, ThreadId};

/// Shared live-update client. Each open thread view joins its room
/// through [`LiveChannel::join`] and owns the returned [`Subscription`].
#[derive(Clone)]
pub struct LiveChannel {
    source: Arc<dyn EventSource>,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    buffer: usize,
}

impl LiveChannel {
    pub fn new(source: Arc<dyn EventSource>, cfg: &ViewConfig) -> Self {
        Self {
            source,
            reconnect_initial: cfg.reconnect_initial,
            reconnect_max: cfg.reconnect_max,
            buffer: cfg.channel_buffer,
        }
    }

    /// Joins `thread_id`'s room. The room is re-joined after every
    /// transport drop until the subscription leaves.
    pub fn join(&self, thread_id: impl Into<ThreadId>) -> Subscription {
        let (stop, _) = watch::channel(false);
        self.join_until(thread_id, Arc::new(stop))
    }

    /// Like [`LiveChannel::join`], but the room is also left the moment
    /// `stop` is set, without waiting for the subscription to be polled
    /// or dropped.
    pub fn join_until(&self, thread_id: impl Into<ThreadId>, stop: Arc<watch::Sender<bool>>) -> Subscription {
        let thread_id = thread_id.into();
        let (tx, rx) = mpsc::channel(self.buffer);
        metrics::counter!("rib_live_channel_joins_total").increment(1);
        info!(%thread_id, "joined thread room");
        let task = tokio::spawn(pump(
            self.source.clone(),
            thread_id.clone(),
            tx,
            stop.subscribe(),
            self.reconnect_initial,
            self.reconnect_max,
        ));
        Subscription { thread_id, events: rx, stop, task: Some(task) }
    }
}

/// Room membership for one thread view. Leaving is idempotent and also
/// happens on drop.
pub struct Subscription {
    thread_id: ThreadId,
    events: mpsc::Receiver<ChannelEvent>,
    stop: Arc<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some() && !*self.stop.borrow()
    }

    /// Next inbound event; `None` once the subscription has left.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        if self.task.is_none() {
            return None;
        }
        self.events.recv().await
    }

    pub fn leave(&mut self) {
        let Some(task) = self.task.take() else { return };
        self.stop.send_replace(true);
        task.abort();
        self.events.close();
        info!(thread_id = %self.thread_id, "left thread room");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.leave();
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // a dropped sender also ends the membership
    let _ = stop.wait_for(|s| *s).await;
}

async fn pump(
    source: Arc<dyn EventSource>,
    thread_id: ThreadId,
    tx: mpsc::Sender<ChannelEvent>,
    mut stop: watch::Receiver<bool>,
    initial: Duration,
    max: Duration,
) {
    let mut delay = initial;
    loop {
        let connected = tokio::select! {
            biased;
            _ = stopped(&mut stop) => return,
            res = source.connect(&thread_id) => res,
        };
        match connected {
            Ok(mut stream) => {
                debug!(%thread_id, "room stream open");
                delay = initial;
                loop {
                    let item = tokio::select! {
                        biased;
                        _ = stopped(&mut stop) => return,
                        item = stream.next() => item,
                    };
                    match item {
                        Some(Ok(event)) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(%thread_id, error = %e, "room stream dropped");
                            break;
                        }
                        None => {
                            warn!(%thread_id, "room stream closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(%thread_id, error = %e, "room connect failed"),
        }

        metrics::counter!("rib_live_channel_reconnects_total").increment(1);
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(max);
    }
}
