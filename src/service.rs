use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ReplyApi;
use crate::error::SyncResult;
use crate::hub::ReplyHub;
use crate::models::{AuthorRef, ChannelEvent, Cursor, Reply, ReplyPage};
use crate::repo::{RepoResult, ReplyRepo};

/// Reply storage plus room notifications: every write is announced to the
/// thread's live channel.
#[derive(Clone)]
pub struct ThreadService {
    repo: Arc<dyn ReplyRepo>,
    hub: ReplyHub,
}

impl ThreadService {
    pub fn new(repo: Arc<dyn ReplyRepo>, hub: ReplyHub) -> Self {
        Self { repo, hub }
    }

    pub fn hub(&self) -> &ReplyHub {
        &self.hub
    }

    pub async fn page(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> RepoResult<ReplyPage> {
        self.repo.page_replies(thread_id, cursor, limit).await
    }

    pub async fn get(&self, thread_id: &str, reply_id: &str) -> RepoResult<Reply> {
        self.repo.get_reply(thread_id, reply_id).await
    }

    pub async fn post(&self, thread_id: &str, author: AuthorRef, content: String) -> RepoResult<Reply> {
        let reply = self.repo.create_reply(thread_id, author, content).await?;
        let members = self.hub.publish(ChannelEvent::ReplyCreated {
            thread_id: thread_id.to_string(),
            reply: reply.clone(),
        });
        debug!(%thread_id, reply_id = %reply.id, members, "announced reply");
        Ok(reply)
    }

    pub async fn remove(&self, thread_id: &str, reply_id: &str) -> RepoResult<()> {
        self.repo.delete_reply(thread_id, reply_id).await?;
        self.hub.publish(ChannelEvent::ReplyDeleted {
            thread_id: thread_id.to_string(),
            reply_id: reply_id.to_string(),
        });
        Ok(())
    }
}

/// [`ReplyApi`] served straight from a [`ThreadService`], acting as one
/// signed-in author.
#[derive(Clone)]
pub struct LocalReplyApi {
    service: ThreadService,
    author: AuthorRef,
}

impl LocalReplyApi {
    pub fn new(service: ThreadService, author: AuthorRef) -> Self {
        Self { service, author }
    }
}

#[async_trait]
impl ReplyApi for LocalReplyApi {
    async fn paged_replies(&self, thread_id: &str, cursor: Option<&Cursor>, limit: usize) -> SyncResult<ReplyPage> {
        Ok(self.service.page(thread_id, cursor, limit).await?)
    }

    async fn create_reply(&self, thread_id: &str, content: &str) -> SyncResult<Reply> {
        Ok(self.service.post(thread_id, self.author.clone(), content.to_string()).await?)
    }

    async fn delete_reply(&self, thread_id: &str, reply_id: &str) -> SyncResult<()> {
        Ok(self.service.remove(thread_id, reply_id).await?)
    }
}
