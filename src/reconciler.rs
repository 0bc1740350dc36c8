use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::ReplyCache;
use crate::client::ReplyApi;
use crate::config::ViewConfig;
use crate::error::SyncResult;
use crate::models::{AuthorRef, ChannelEvent, Reply, ReplyId, ThreadId};
use crate::pager::CursorPager;
use crate::scroll::{AnchorSnapshot, AnchorState, Edge, Placement, ScrollAnchor, ScrollCommand, Viewport};
use crate::sort::{self, SortOrder};

/// Transient "new reply" banner for an insert the user cannot see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyNotice {
    pub reply_id: ReplyId,
    pub author: AuthorRef,
    pub edge: Edge,
}

/// Result of merging one push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Inserted {
        reply_id: ReplyId,
        placement: Placement,
        scroll: ScrollCommand,
        notice: Option<ReplyNotice>,
    },
    Removed { reply_id: ReplyId },
    /// Redelivery of a reply already cached.
    Duplicate { reply_id: ReplyId },
    /// The local user's own reply, already merged through `submit`.
    OwnEcho { reply_id: ReplyId },
    /// Deletion of a reply this view never held.
    NotCached { reply_id: ReplyId },
    OtherThread,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageMerge {
    pub fetched: usize,
    pub inserted: usize,
    /// Scroll position before the merge; restore it after layout.
    pub anchor: Option<AnchorSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub reply: Reply,
    /// Replies pulled in by draining history before the create call.
    pub drained: usize,
    pub scroll: ScrollCommand,
}

/// Sole writer of a thread view's reply cache.
pub struct Reconciler {
    api: Arc<dyn ReplyApi>,
    session: AuthorRef,
    pager: CursorPager,
    cache: ReplyCache,
    order: SortOrder,
    anchor: ScrollAnchor,
}

impl Reconciler {
    pub fn new(thread_id: impl Into<ThreadId>, session: AuthorRef, api: Arc<dyn ReplyApi>, cfg: &ViewConfig) -> Self {
        Self {
            api,
            session,
            pager: CursorPager::new(thread_id, cfg.page_size),
            cache: ReplyCache::new(),
            order: SortOrder::default(),
            anchor: ScrollAnchor::new(cfg.edge_threshold_px),
        }
    }

    pub fn thread_id(&self) -> &str {
        self.pager.thread_id()
    }

    pub fn session(&self) -> &AuthorRef {
        &self.session
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn has_more(&self) -> bool {
        self.pager.has_more()
    }

    pub fn cache(&self) -> &ReplyCache {
        &self.cache
    }

    /// Replies in display order.
    pub fn replies(&self) -> Vec<Reply> {
        sort::project(self.cache.all(), self.order)
    }

    /// Fetches the next (older) page and merges it.
    pub async fn load_next_page(&mut self) -> SyncResult<PageMerge> {
        let anchor = self.anchor.capture(self.order);
        let items = self.pager.fetch_next(self.api.as_ref()).await?;
        let fetched = items.len();
        let inserted = items.into_iter().filter(|r| self.cache.upsert(r.clone())).count();
        debug!(thread_id = %self.thread_id(), fetched, inserted, "merged reply page");
        Ok(PageMerge { fetched, inserted, anchor })
    }

    /// Pulls every remaining page. Returns how many replies were added.
    pub async fn drain(&mut self) -> SyncResult<usize> {
        let mut added = 0;
        while self.pager.has_more() {
            added += self.load_next_page().await?.inserted;
        }
        Ok(added)
    }

    /// Posts a reply once the full history is loaded. Nothing is cached
    /// unless the backend confirms it.
    pub async fn submit(&mut self, content: &str) -> SyncResult<Submitted> {
        let drained = self.drain().await?;
        let reply = self.api.create_reply(self.pager.thread_id(), content).await?;
        self.cache.upsert(reply.clone());
        metrics::counter!("rib_live_replies_created_total").increment(1);
        info!(thread_id = %self.thread_id(), reply_id = %reply.id, drained, "reply submitted");
        Ok(Submitted { reply, drained, scroll: self.anchor.after_own_submit(self.order) })
    }

    /// Deletes a reply on the backend, then drops it locally. Returns
    /// whether the cache held it.
    pub async fn delete(&mut self, reply_id: &str) -> SyncResult<bool> {
        self.api.delete_reply(self.pager.thread_id(), reply_id).await?;
        self.anchor.forget(reply_id);
        Ok(self.cache.remove(reply_id).is_some())
    }

    /// Switches display order, loading all history first so the flipped
    /// view is complete.
    pub async fn set_order(&mut self, order: SortOrder) -> SyncResult<SortOrder> {
        if order != self.order {
            self.drain().await?;
            self.order = order;
            self.anchor.flip();
        }
        Ok(self.order)
    }

    pub async fn toggle_order(&mut self) -> SyncResult<SortOrder> {
        self.set_order(self.order.flip()).await
    }

    pub fn apply_event(&mut self, event: ChannelEvent) -> PushOutcome {
        if event.thread_id() != self.thread_id() {
            return PushOutcome::OtherThread;
        }
        match event {
            ChannelEvent::ReplyCreated { reply, .. } => self.merge_pushed(reply),
            ChannelEvent::ReplyDeleted { reply_id, .. } => match self.cache.remove(&reply_id) {
                Some(_) => {
                    self.anchor.forget(&reply_id);
                    debug!(%reply_id, "pushed deletion applied");
                    PushOutcome::Removed { reply_id }
                }
                None => PushOutcome::NotCached { reply_id },
            },
        }
    }

    fn merge_pushed(&mut self, reply: Reply) -> PushOutcome {
        if reply.thread_id != self.thread_id() {
            return PushOutcome::OtherThread;
        }
        let reply_id = reply.id.clone();
        if reply.author.same_user(&self.session) {
            return PushOutcome::OwnEcho { reply_id };
        }
        if self.cache.has(&reply_id) {
            metrics::counter!("rib_live_push_duplicates_total").increment(1);
            return PushOutcome::Duplicate { reply_id };
        }

        let len_before = self.cache.len();
        let idx = sort::position_of(self.cache.all(), &reply, self.order);
        let author = reply.author.clone();
        self.cache.upsert(reply);

        let placement = self.anchor.placement(idx);
        let (scroll, notice) = match placement.edge() {
            Some(edge) => {
                self.anchor.record_pending(edge, reply_id.clone());
                let notice = ReplyNotice { reply_id: reply_id.clone(), author, edge };
                (ScrollCommand::Stay, Some(notice))
            }
            None => (self.anchor.follow(idx, len_before), None),
        };
        debug!(%reply_id, idx, ?placement, "pushed reply merged");
        PushOutcome::Inserted { reply_id, placement, scroll, notice }
    }

    pub fn observe(&mut self, viewport: Viewport) {
        self.anchor.observe(viewport);
    }

    pub fn jump(&mut self, edge: Edge) -> ScrollCommand {
        self.anchor.jump(edge)
    }

    pub fn pending(&self, edge: Edge) -> u32 {
        self.anchor.pending(edge)
    }

    pub fn anchor_state(&self) -> AnchorState {
        self.anchor.state()
    }
}
