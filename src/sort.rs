use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::Reply;

/// Display order of a thread's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

impl SortOrder {
    pub fn flip(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Ordering used by [`project`]. Valid timestamps come first in the chosen
/// direction, ties broken by id in the same direction; unparseable
/// timestamps always trail, by id ascending.
pub fn compare(a: &Reply, b: &Reply, order: SortOrder) -> Ordering {
    match (a.created_at.valid(), b.created_at.valid()) {
        (Some(x), Some(y)) => {
            let asc = x.cmp(&y).then_with(|| a.id.cmp(&b.id));
            match order {
                SortOrder::Asc => asc,
                SortOrder::Desc => asc.reverse(),
            }
        }
        _ => a
            .created_at
            .cmp_valid_first(&b.created_at)
            .then_with(|| a.id.cmp(&b.id)),
    }
}

pub fn project(replies: &[Reply], order: SortOrder) -> Vec<Reply> {
    let mut out = replies.to_vec();
    out.sort_by(|a, b| compare(a, b, order));
    out
}

/// Index `reply` occupies in `project(replies, order)`. `replies` must
/// already contain it.
pub fn position_of(replies: &[Reply], reply: &Reply, order: SortOrder) -> usize {
    replies
        .iter()
        .filter(|other| other.id != reply.id && compare(other, reply, order) == Ordering::Less)
        .count()
}
