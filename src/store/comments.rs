//! Comment thread under one answer.
//!
//! Paging follows the same single-flight rules as the feed list. Posting is
//! not optimistic: the server assigns the comment's id, so the comment only
//! appears once the server has returned it. Comments confirmed while a
//! first-page load is in flight are kept when that page replaces the list,
//! since the page may have been read before they were inserted.
use super::list::LoadMode;
use super::paging::{append_unique, dedupe};
use super::task::Inbox;
use super::{Dispatch, Failure, Ignored};
use crate::api::RemoteApi;
use crate::model::{Comment, Page};
use crate::util::MAX_COMMENT_LENGTH;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThreadState {
    pub answer_id: String,
    pub items: Arc<Vec<Comment>>,
    pub page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub is_posting: bool,
    pub error: Option<String>,
}

impl CommentThreadState {
    fn new(answer_id: String) -> Self {
        Self {
            answer_id,
            items: Arc::new(Vec::new()),
            page: 1,
            has_more: true,
            is_loading: false,
            is_loading_more: false,
            is_posting: false,
            error: None,
        }
    }
}

#[derive(Debug)]
pub enum CommentEvent {
    PageLoaded {
        generation: u64,
        mode: LoadMode,
        result: Result<Page<Comment>, Failure>,
    },
    Posted {
        result: Result<Comment, Failure>,
    },
}

pub struct CommentThread {
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    state: CommentThreadState,
    generation: u64,
    /// Comments confirmed since the current first-page request was sent
    posted_since_reload: Vec<Comment>,
    inbox: Inbox<CommentEvent>,
    publisher: watch::Sender<CommentThreadState>,
}

impl CommentThread {
    pub fn new(api: Arc<dyn RemoteApi>, answer_id: impl Into<String>, page_size: u32) -> Self {
        let state = CommentThreadState::new(answer_id.into());
        let (publisher, _) = watch::channel(state.clone());
        Self {
            api,
            page_size: page_size.max(1),
            state,
            generation: 0,
            posted_since_reload: Vec::new(),
            inbox: Inbox::new(),
            publisher,
        }
    }

    pub fn state(&self) -> &CommentThreadState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<CommentThreadState> {
        self.publisher.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.inbox.in_flight()
    }

    pub fn load_first_page(&mut self) -> Dispatch {
        if self.state.is_loading {
            return Dispatch::Ignored(Ignored::AlreadyLoading);
        }
        self.generation += 1;
        self.posted_since_reload.clear();
        self.state.is_loading = true;
        self.state.is_loading_more = false;
        self.state.error = None;
        self.publish();
        self.spawn_page(1, LoadMode::First);
        Dispatch::Started
    }

    pub fn load_next_page(&mut self) -> Dispatch {
        if self.state.is_loading {
            return Dispatch::Ignored(Ignored::AlreadyLoading);
        }
        if self.state.is_loading_more {
            return Dispatch::Ignored(Ignored::AlreadyLoadingMore);
        }
        if !self.state.has_more {
            return Dispatch::Ignored(Ignored::NoMorePages);
        }
        let page = self.state.page;
        self.state.is_loading_more = true;
        self.publish();
        self.spawn_page(page, LoadMode::Next { page });
        Dispatch::Started
    }

    /// Post `content` (trimmed) as a new comment.
    ///
    /// Rejected locally when empty, longer than [`MAX_COMMENT_LENGTH`]
    /// characters, or while another post is in flight.
    pub fn post(&mut self, content: &str) -> Dispatch {
        let content = content.trim();
        if content.is_empty() {
            return Dispatch::Ignored(Ignored::EmptyComment);
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Dispatch::Ignored(Ignored::CommentTooLong);
        }
        if self.state.is_posting {
            return Dispatch::Ignored(Ignored::AlreadyPosting);
        }

        self.state.is_posting = true;
        self.state.error = None;
        self.publish();

        let api = Arc::clone(&self.api);
        let answer_id = self.state.answer_id.clone();
        let content = content.to_string();
        tracing::debug!(%answer_id, chars = content.chars().count(), "Posting comment");
        self.inbox.spawn(
            "post_comment",
            async move {
                let result = api
                    .post_comment(&answer_id, &content)
                    .await
                    .map_err(Failure::from);
                CommentEvent::Posted { result }
            },
            |msg| CommentEvent::Posted {
                result: Err(Failure::panicked(msg)),
            },
        );
        Dispatch::Started
    }

    pub fn clear_error(&mut self) {
        if self.state.error.take().is_some() {
            self.publish();
        }
    }

    pub async fn next_event(&mut self) -> Option<CommentEvent> {
        self.inbox.recv().await
    }

    pub async fn settle(&mut self) {
        while let Some(event) = self.inbox.recv().await {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: CommentEvent) {
        match event {
            CommentEvent::PageLoaded {
                generation,
                mode,
                result,
            } => {
                if generation != self.generation {
                    tracing::debug!(
                        expected = self.generation,
                        got = generation,
                        "Ignoring stale comment page (generation mismatch)"
                    );
                    return;
                }
                match (mode, result) {
                    (LoadMode::First, Ok(page)) => {
                        let mut items = dedupe(page.items);
                        let posted = std::mem::take(&mut self.posted_since_reload);
                        append_unique(&mut items, posted);
                        self.state.items = Arc::new(items);
                        self.state.page = 2;
                        self.state.has_more = page.has_more;
                        self.state.is_loading = false;
                    }
                    (LoadMode::Next { page: number }, Ok(page)) => {
                        append_unique(Arc::make_mut(&mut self.state.items), page.items);
                        self.state.page = number + 1;
                        self.state.has_more = page.has_more;
                        self.state.is_loading_more = false;
                    }
                    (mode, Err(failure)) => {
                        tracing::warn!(answer_id = %self.state.answer_id, ?mode, error = %failure.message, "Comment page load failed");
                        match mode {
                            LoadMode::First => self.state.is_loading = false,
                            LoadMode::Next { .. } => self.state.is_loading_more = false,
                        }
                        self.state.error = Some(failure.message);
                    }
                }
            }
            CommentEvent::Posted { result } => {
                self.state.is_posting = false;
                match result {
                    Ok(comment) => {
                        tracing::debug!(comment_id = %comment.id, "Comment posted");
                        if self.state.is_loading {
                            self.posted_since_reload.push(comment.clone());
                        }
                        append_unique(Arc::make_mut(&mut self.state.items), vec![comment]);
                    }
                    Err(failure) => {
                        tracing::warn!(answer_id = %self.state.answer_id, error = %failure.message, "Posting comment failed");
                        self.state.error = Some(failure.message);
                    }
                }
            }
        }
        self.publish();
    }

    fn spawn_page(&mut self, page: u32, mode: LoadMode) {
        let api = Arc::clone(&self.api);
        let answer_id = self.state.answer_id.clone();
        let page_size = self.page_size;
        let generation = self.generation;
        self.inbox.spawn(
            "load_comments",
            async move {
                let result = api
                    .comments(&answer_id, page, page_size)
                    .await
                    .map_err(Failure::from);
                CommentEvent::PageLoaded {
                    generation,
                    mode,
                    result,
                }
            },
            move |msg| CommentEvent::PageLoaded {
                generation,
                mode,
                result: Err(Failure::panicked(msg)),
            },
        );
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}
