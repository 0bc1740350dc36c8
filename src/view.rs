use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::channel::{LiveChannel, Subscription};
use crate::client::ReplyApi;
use crate::config::ViewConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{AuthorRef, Reply, ThreadId};
use crate::reconciler::{PageMerge, PushOutcome, Reconciler, Submitted};
use crate::scroll::{AnchorState, Edge, ScrollCommand, Viewport};
use crate::sort::SortOrder;

/// Handle that tears a [`ThreadView`] down from outside its driving task.
/// Closing leaves the thread's room right away, even if the view is idle.
#[derive(Clone)]
pub struct ViewCloser(Arc<watch::Sender<bool>>);

impl ViewCloser {
    pub fn close(&self) {
        self.0.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // The view keeps its own sender alive, so this only returns on close.
    let _ = closed.wait_for(|c| *c).await;
}

/// Runs `fut` unless the view closes first, in which case the future is
/// dropped before it can touch the cache.
async fn guarded<T>(closed: &mut watch::Receiver<bool>, fut: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
    if *closed.borrow() {
        return Err(SyncError::Closed);
    }
    tokio::select! {
        biased;
        _ = wait_closed(closed) => Err(SyncError::Closed),
        res = fut => res,
    }
}

/// One open discussion thread: its reply cache, pager, scroll state and
/// live-room membership.
pub struct ThreadView {
    reconciler: Reconciler,
    subscription: Subscription,
    closed: watch::Receiver<bool>,
    closer: ViewCloser,
}

impl ThreadView {
    /// Joins the thread's room without fetching anything yet.
    pub fn new(
        thread_id: impl Into<ThreadId>,
        session: AuthorRef,
        api: Arc<dyn ReplyApi>,
        channel: &LiveChannel,
        cfg: &ViewConfig,
    ) -> Self {
        let thread_id = thread_id.into();
        let (tx, rx) = watch::channel(false);
        let closer = ViewCloser(Arc::new(tx));
        // join before the first fetch so nothing posted in between is missed;
        // closing the view stops the membership too
        let subscription = channel.join_until(thread_id.clone(), closer.0.clone());
        Self {
            reconciler: Reconciler::new(thread_id, session, api, cfg),
            subscription,
            closed: rx,
            closer,
        }
    }

    /// Joins the room and loads the most recent page.
    pub async fn open(
        thread_id: impl Into<ThreadId>,
        session: AuthorRef,
        api: Arc<dyn ReplyApi>,
        channel: &LiveChannel,
        cfg: &ViewConfig,
    ) -> SyncResult<Self> {
        let mut view = Self::new(thread_id, session, api, channel, cfg);
        view.load_older().await?;
        info!(thread_id = %view.thread_id(), replies = view.len(), "thread view opened");
        Ok(view)
    }

    pub fn closer(&self) -> ViewCloser {
        self.closer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    fn settle<T>(&mut self, res: SyncResult<T>) -> SyncResult<T> {
        if matches!(res, Err(SyncError::Closed)) {
            self.subscription.leave();
        }
        res
    }

    pub async fn load_older(&mut self) -> SyncResult<PageMerge> {
        let res = guarded(&mut self.closed, self.reconciler.load_next_page()).await;
        self.settle(res)
    }

    pub async fn submit(&mut self, content: &str) -> SyncResult<Submitted> {
        let res = guarded(&mut self.closed, self.reconciler.submit(content)).await;
        self.settle(res)
    }

    pub async fn delete(&mut self, reply_id: &str) -> SyncResult<bool> {
        let res = guarded(&mut self.closed, self.reconciler.delete(reply_id)).await;
        self.settle(res)
    }

    pub async fn set_order(&mut self, order: SortOrder) -> SyncResult<SortOrder> {
        let res = guarded(&mut self.closed, self.reconciler.set_order(order)).await;
        self.settle(res)
    }

    pub async fn toggle_order(&mut self) -> SyncResult<SortOrder> {
        let res = guarded(&mut self.closed, self.reconciler.toggle_order()).await;
        self.settle(res)
    }

    /// Waits for the next push event and merges it. `None` once closed.
    pub async fn next_update(&mut self) -> Option<PushOutcome> {
        if self.is_closed() {
            self.subscription.leave();
            return None;
        }
        let event = tokio::select! {
            biased;
            _ = wait_closed(&mut self.closed) => None,
            ev = self.subscription.recv() => ev,
        };
        match event {
            Some(ev) => Some(self.reconciler.apply_event(ev)),
            None => {
                self.subscription.leave();
                None
            }
        }
    }

    pub fn on_scroll(&mut self, viewport: Viewport) {
        self.reconciler.observe(viewport);
    }

    pub fn jump_to_new(&mut self, edge: Edge) -> ScrollCommand {
        self.reconciler.jump(edge)
    }

    pub fn close(mut self) {
        self.closer.close();
        self.subscription.leave();
        info!(thread_id = %self.reconciler.thread_id(), "thread view closed");
    }

    pub fn thread_id(&self) -> &str {
        self.reconciler.thread_id()
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.reconciler.replies()
    }

    pub fn len(&self) -> usize {
        self.reconciler.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconciler.cache().is_empty()
    }

    /// Whether a "load older" control should be offered.
    pub fn has_more(&self) -> bool {
        self.reconciler.has_more()
    }

    pub fn order(&self) -> SortOrder {
        self.reconciler.order()
    }

    pub fn pending(&self, edge: Edge) -> u32 {
        self.reconciler.pending(edge)
    }

    pub fn anchor_state(&self) -> AnchorState {
        self.reconciler.anchor_state()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}
