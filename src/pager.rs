use tracing::debug;

use crate::client::ReplyApi;
use crate::config::MAX_PAGE_SIZE;
use crate::error::SyncResult;
use crate::models::{Cursor, Reply, ThreadId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PagerState {
    /// First page not fetched yet.
    Fresh,
    More(Cursor),
    Exhausted,
}

/// Walks a thread's reply history backward one page at a time.
#[derive(Debug)]
pub struct CursorPager {
    thread_id: ThreadId,
    limit: usize,
    state: PagerState,
}

impl CursorPager {
    pub fn new(thread_id: impl Into<ThreadId>, limit: usize) -> Self {
        Self { thread_id: thread_id.into(), limit: limit.clamp(1, MAX_PAGE_SIZE), state: PagerState::Fresh }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// True until a fetch comes back without a next cursor.
    pub fn has_more(&self) -> bool {
        !matches!(self.state, PagerState::Exhausted)
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self.state, PagerState::Fresh)
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.state {
            PagerState::More(c) => Some(c),
            _ => None,
        }
    }

    /// Fetches the next page. State only advances on success, so a failed
    /// call can simply be retried. Returns an empty page once exhausted.
    pub async fn fetch_next(&mut self, api: &dyn ReplyApi) -> SyncResult<Vec<Reply>> {
        if !self.has_more() {
            return Ok(Vec::new());
        }
        let page = api.paged_replies(&self.thread_id, self.cursor(), self.limit).await?;
        debug!(
            thread_id = %self.thread_id,
            items = page.items.len(),
            more = page.next_cursor.is_some(),
            "fetched reply page"
        );
        metrics::counter!("rib_live_pages_fetched_total").increment(1);
        self.state = match page.next_cursor {
            Some(next) => PagerState::More(next),
            None => PagerState::Exhausted,
        };
        Ok(page.items)
    }
}
