use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::models::ReplyId;
use crate::sort::SortOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
}

/// Scroll geometry reported by the host after each layout or scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
    /// Half-open range of projected reply indices currently on screen.
    pub visible: Range<usize>,
}

impl Viewport {
    pub fn distance_to(&self, edge: Edge) -> f64 {
        match edge {
            Edge::Top => self.scroll_top.max(0.0),
            Edge::Bottom => (self.scroll_height - self.scroll_top - self.client_height).max(0.0),
        }
    }
}

/// Where a newly inserted reply landed relative to what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Above,
    Within,
    Below,
}

impl Placement {
    pub fn edge(self) -> Option<Edge> {
        match self {
            Placement::Above => Some(Edge::Top),
            Placement::Below => Some(Edge::Bottom),
            Placement::Within => None,
        }
    }
}

/// What the host should do with its scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    Stay,
    RevealTop,
    RevealBottom,
}

impl ScrollCommand {
    fn reveal(edge: Edge) -> Self {
        match edge {
            Edge::Top => ScrollCommand::RevealTop,
            Edge::Bottom => ScrollCommand::RevealBottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    Idle,
    PendingTop(u32),
    PendingBottom(u32),
    PendingBoth { top: u32, bottom: u32 },
}

/// Scroll position captured before a backward page is merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSnapshot {
    order: SortOrder,
    scroll_top: f64,
    scroll_height: f64,
}

impl AnchorSnapshot {
    /// Scroll top to apply once the older page has been laid out, so the
    /// replies that were on screen stay put.
    pub fn restore(&self, new_scroll_height: f64) -> f64 {
        match self.order {
            // older replies were added above the visible ones
            SortOrder::Asc => (new_scroll_height - (self.scroll_height - self.scroll_top)).max(0.0),
            SortOrder::Desc => self.scroll_top,
        }
    }
}

/// Unseen replies per edge plus the last viewport the host reported.
#[derive(Debug)]
pub struct ScrollAnchor {
    threshold: f64,
    viewport: Option<Viewport>,
    pending_top: HashSet<ReplyId>,
    pending_bottom: HashSet<ReplyId>,
}

impl ScrollAnchor {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, viewport: None, pending_top: HashSet::new(), pending_bottom: HashSet::new() }
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    fn near(&self, edge: Edge) -> bool {
        self.viewport.as_ref().map_or(true, |vp| vp.distance_to(edge) <= self.threshold)
    }

    /// Records a new viewport; reaching an edge clears that edge's counter.
    pub fn observe(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        if self.near(Edge::Top) {
            self.pending_top.clear();
        }
        if self.near(Edge::Bottom) {
            self.pending_bottom.clear();
        }
    }

    /// Classifies an insert at projected index `idx`, where indices are
    /// those of the projection before the insert.
    pub fn placement(&self, idx: usize) -> Placement {
        let Some(vp) = &self.viewport else {
            return Placement::Within;
        };
        let Range { start, end } = vp.visible;
        if idx < start || (idx == start && !self.near(Edge::Top)) {
            Placement::Above
        } else if idx > end || (idx == end && !self.near(Edge::Bottom)) {
            Placement::Below
        } else {
            Placement::Within
        }
    }

    pub fn record_pending(&mut self, edge: Edge, reply_id: ReplyId) {
        match edge {
            Edge::Top => self.pending_top.insert(reply_id),
            Edge::Bottom => self.pending_bottom.insert(reply_id),
        };
    }

    /// Drops a reply that is no longer in the list from the unseen counts.
    pub fn forget(&mut self, reply_id: &str) {
        self.pending_top.remove(reply_id);
        self.pending_bottom.remove(reply_id);
    }

    /// The list was reversed: unseen replies now sit at the opposite edge.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.pending_top, &mut self.pending_bottom);
    }

    /// Keeps the user pinned to an edge they are sitting on when a visible
    /// insert lands there.
    pub fn follow(&self, idx: usize, len_before: usize) -> ScrollCommand {
        if self.viewport.is_none() {
            return ScrollCommand::Stay;
        }
        if idx == 0 && self.near(Edge::Top) {
            ScrollCommand::RevealTop
        } else if idx == len_before && self.near(Edge::Bottom) {
            ScrollCommand::RevealBottom
        } else {
            ScrollCommand::Stay
        }
    }

    /// The user's own reply: oldest-first reveals it at the bottom,
    /// newest-first leaves the scroll position alone.
    pub fn after_own_submit(&self, order: SortOrder) -> ScrollCommand {
        match order {
            SortOrder::Asc => ScrollCommand::RevealBottom,
            SortOrder::Desc => ScrollCommand::Stay,
        }
    }

    pub fn jump(&mut self, edge: Edge) -> ScrollCommand {
        match edge {
            Edge::Top => self.pending_top.clear(),
            Edge::Bottom => self.pending_bottom.clear(),
        }
        ScrollCommand::reveal(edge)
    }

    pub fn capture(&self, order: SortOrder) -> Option<AnchorSnapshot> {
        self.viewport.as_ref().map(|vp| AnchorSnapshot {
            order,
            scroll_top: vp.scroll_top,
            scroll_height: vp.scroll_height,
        })
    }

    pub fn pending(&self, edge: Edge) -> u32 {
        let unseen = match edge {
            Edge::Top => &self.pending_top,
            Edge::Bottom => &self.pending_bottom,
        };
        u32::try_from(unseen.len()).unwrap_or(u32::MAX)
    }

    pub fn state(&self) -> AnchorState {
        match (self.pending(Edge::Top), self.pending(Edge::Bottom)) {
            (0, 0) => AnchorState::Idle,
            (top, 0) => AnchorState::PendingTop(top),
            (0, bottom) => AnchorState::PendingBottom(bottom),
            (top, bottom) => AnchorState::PendingBoth { top, bottom },
        }
    }
}
