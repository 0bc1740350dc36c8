use std::collections::HashSet;

use crate::models::Reply;

/// Identity-deduplicated reply store for one open thread view.
///
/// Entries keep insertion order; display order is a projection computed by
/// [`crate::sort::project`]. An entry is never modified once stored.
#[derive(Debug, Default)]
pub struct ReplyCache {
    entries: Vec<Reply>,
    ids: HashSet<String>,
}

impl ReplyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `reply` unless its id is already cached. Returns true when
    /// the cache grew.
    pub fn upsert(&mut self, reply: Reply) -> bool {
        if self.ids.contains(&reply.id) {
            return false;
        }
        self.ids.insert(reply.id.clone());
        self.entries.push(reply);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Reply> {
        if !self.ids.remove(id) {
            return None;
        }
        let pos = self.entries.iter().position(|r| r.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn all(&self) -> &[Reply] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
