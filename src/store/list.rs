//! Paginated feed store with optimistic likes.
//!
//! ```text
//! Idle ──load_first_page──▶ Loading ──result──▶ Idle (error set on failure)
//! Idle ──load_next_page───▶ LoadingMore ──result──▶ Idle (error set on failure)
//! ```
//!
//! The two machines are orthogonal except that a next-page load is refused
//! while a first-page load runs, and a first-page load supersedes a running
//! next-page load. Like toggles never block either and never change the
//! list's shape.
//!
//! Every list request carries the store's generation. Replacing the list
//! (refresh or filter switch) bumps it, so results of superseded requests are
//! recognised and dropped instead of being mixed into the new list.
//!
//! Like toggles are tracked by entry id, independent of the list they were
//! started from. A page that arrives while a like is in flight shows the
//! pending like on top of the server's copy, and the like's result is applied
//! to whatever entry carries that id when it lands.
use super::paging::{append_unique, dedupe};
use super::task::Inbox;
use super::toggle::{Settlement, Ticket, Toggle, ToggleLedger};
use super::{Dispatch, Failure, Ignored};
use crate::api::{ListQuery, RemoteApi};
use crate::model::{FeedEntry, Filter, Page};
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of a feed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListState {
    /// Entries in display order; ids are unique.
    pub items: Arc<Vec<FeedEntry>>,
    pub filter: Filter,
    /// Next page to request (1-based).
    pub page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<String>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            filter: Filter::default(),
            page: 1,
            has_more: true,
            is_loading: false,
            is_loading_more: false,
            error: None,
        }
    }
}

impl ListState {
    pub fn entry(&self, id: &str) -> Option<&FeedEntry> {
        self.items.iter().find(|e| e.id == id)
    }
}

/// Which kind of list request produced a [`ListEvent::PageLoaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    First,
    Next { page: u32 },
}

/// Completion of a request spawned by [`SyncedListStore`].
#[derive(Debug)]
pub enum ListEvent {
    PageLoaded {
        generation: u64,
        mode: LoadMode,
        result: Result<Page<FeedEntry>, Failure>,
    },
    LikeSettled {
        ticket: Ticket<String>,
        result: Result<(), Failure>,
    },
}

/// Owner of one feed list.
pub struct SyncedListStore {
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    state: ListState,
    /// Bumped whenever the list is about to be replaced wholesale
    generation: u64,
    likes: ToggleLedger<String>,
    inbox: Inbox<ListEvent>,
    publisher: watch::Sender<ListState>,
}

impl SyncedListStore {
    pub fn new(api: Arc<dyn RemoteApi>, page_size: u32) -> Self {
        let state = ListState::default();
        let (publisher, _) = watch::channel(state.clone());
        Self {
            api,
            page_size: page_size.max(1),
            state,
            generation: 0,
            likes: ToggleLedger::new(),
            inbox: Inbox::new(),
            publisher,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.publisher.subscribe()
    }

    /// Number of requests whose results have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.inbox.in_flight()
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Load page 1 of `filter`, replacing the list on success.
    ///
    /// A different filter than the current one behaves as [`select_filter`].
    /// A repeated call while page 1 of the same filter is loading is coalesced.
    ///
    /// [`select_filter`]: SyncedListStore::select_filter
    pub fn load_first_page(&mut self, filter: Filter) -> Dispatch {
        if filter != self.state.filter {
            return self.select_filter(filter);
        }
        if self.state.is_loading {
            tracing::debug!(filter = %filter, "First page already loading, ignoring");
            return Dispatch::Ignored(Ignored::AlreadyLoading);
        }
        self.start_first_page()
    }

    /// Reload page 1 of the current filter.
    pub fn refresh(&mut self) -> Dispatch {
        self.load_first_page(self.state.filter.clone())
    }

    /// Load the next page and append the entries not already shown.
    pub fn load_next_page(&mut self) -> Dispatch {
        if self.state.is_loading {
            return Dispatch::Ignored(Ignored::AlreadyLoading);
        }
        if self.state.is_loading_more {
            tracing::debug!(page = self.state.page, "Next page already loading, ignoring");
            return Dispatch::Ignored(Ignored::AlreadyLoadingMore);
        }
        if !self.state.has_more {
            return Dispatch::Ignored(Ignored::NoMorePages);
        }

        let page = self.state.page;
        self.state.is_loading_more = true;
        self.publish();
        self.spawn_list(page, LoadMode::Next { page });
        Dispatch::Started
    }

    /// Switch to `filter`: clear the list, then load its first page.
    ///
    /// The cleared state is published before the request is sent, and any
    /// result still in flight for the previous filter is discarded.
    pub fn select_filter(&mut self, filter: Filter) -> Dispatch {
        if filter == self.state.filter {
            return Dispatch::Ignored(Ignored::SameFilter);
        }
        tracing::debug!(from = %self.state.filter, to = %filter, "Switching filter");
        self.state.filter = filter;
        self.state.items = Arc::new(Vec::new());
        self.state.page = 1;
        self.state.has_more = true;
        self.start_first_page()
    }

    /// Optimistically flip the like on `entry_id` and send the request.
    ///
    /// The entry shows the new state immediately. If the request fails the
    /// entry returns to the last state the server confirmed and `error` is set.
    pub fn toggle_like(&mut self, entry_id: &str) -> Dispatch {
        let Some(index) = self.state.items.iter().position(|e| e.id == entry_id) else {
            tracing::debug!(entry_id, "Toggle on unknown entry, ignoring");
            return Dispatch::Ignored(Ignored::UnknownItem);
        };

        let current = self.state.items[index].toggle_state();
        let ticket = self.likes.begin(entry_id.to_string(), current);
        Arc::make_mut(&mut self.state.items)[index].set_toggle_state(ticket.target);
        self.publish();

        let api = Arc::clone(&self.api);
        let like = ticket.target.on;
        let id = entry_id.to_string();
        let panic_ticket = ticket.clone();
        self.inbox.spawn(
            "toggle_like",
            async move {
                let result = if like {
                    api.like(&id).await
                } else {
                    api.unlike(&id).await
                };
                ListEvent::LikeSettled {
                    ticket,
                    result: result.map_err(Failure::from),
                }
            },
            move |msg| ListEvent::LikeSettled {
                ticket: panic_ticket,
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

    // ------------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------------

    /// Wait for the next completed request, or `None` if nothing is in flight.
    pub async fn next_event(&mut self) -> Option<ListEvent> {
        self.inbox.recv().await
    }

    /// Apply every completed request without waiting. Returns how many.
    pub fn apply_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.inbox.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply results until no request is in flight.
    pub async fn settle(&mut self) {
        while let Some(event) = self.inbox.recv().await {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: ListEvent) {
        match event {
            ListEvent::PageLoaded {
                generation,
                mode,
                result,
            } => self.handle_page_loaded(generation, mode, result),
            ListEvent::LikeSettled { ticket, result } => self.handle_like_settled(ticket, result),
        }
    }

    fn handle_page_loaded(
        &mut self,
        generation: u64,
        mode: LoadMode,
        result: Result<Page<FeedEntry>, Failure>,
    ) {
        if generation != self.generation {
            tracing::debug!(
                expected = self.generation,
                got = generation,
                "Ignoring stale page (generation mismatch)"
            );
            return;
        }

        match (mode, result) {
            (LoadMode::First, Ok(page)) => {
                let mut items = dedupe(page.items);
                tracing::debug!(filter = %self.state.filter, count = items.len(), has_more = page.has_more, "First page loaded");
                self.likes.observe_all(&mut items);
                self.state.items = Arc::new(items);
                self.state.page = 2;
                self.state.has_more = page.has_more;
                self.state.is_loading = false;
            }
            (LoadMode::Next { page: number }, Ok(page)) => {
                let items = Arc::make_mut(&mut self.state.items);
                let before = items.len();
                let added = append_unique(items, page.items);
                self.likes.observe_all(&mut items[before..]);
                tracing::debug!(page = number, added, has_more = page.has_more, "Next page loaded");
                self.state.page = number + 1;
                self.state.has_more = page.has_more;
                self.state.is_loading_more = false;
            }
            (mode, Err(failure)) => {
                tracing::warn!(?mode, kind = ?failure.kind, error = %failure.message, "Page load failed");
                match mode {
                    LoadMode::First => self.state.is_loading = false,
                    LoadMode::Next { .. } => self.state.is_loading_more = false,
                }
                self.state.error = Some(failure.message);
            }
        }
        self.publish();
    }

    fn handle_like_settled(&mut self, ticket: Ticket<String>, result: Result<(), Failure>) {
        let settlement = self.likes.settle(&ticket, result.is_ok());
        if let Err(failure) = result {
            tracing::warn!(
                entry_id = %ticket.key,
                liked = ticket.target.on,
                error = %failure.message,
                "Like toggle failed, rolling back"
            );
            self.state.error = Some(failure.message);
        }
        if let Settlement::Restore(state) = settlement {
            if let Some(index) = self.state.items.iter().position(|e| e.id == ticket.key) {
                if self.state.items[index].toggle_state() != state {
                    Arc::make_mut(&mut self.state.items)[index].set_toggle_state(state);
                }
            }
        }
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn start_first_page(&mut self) -> Dispatch {
        self.generation += 1;
        self.state.is_loading = true;
        // A running next-page load belongs to the list being replaced
        self.state.is_loading_more = false;
        self.state.error = None;
        self.publish();
        self.spawn_list(1, LoadMode::First);
        Dispatch::Started
    }

    fn spawn_list(&mut self, page: u32, mode: LoadMode) {
        let query = ListQuery {
            filter: self.state.filter.clone(),
            page,
            page_size: self.page_size,
        };
        let generation = self.generation;
        let api = Arc::clone(&self.api);
        tracing::debug!(filter = %query.filter, page, generation, "Requesting page");
        self.inbox.spawn(
            "load_page",
            async move {
                let result = api.list(&query).await.map_err(Failure::from);
                ListEvent::PageLoaded {
                    generation,
                    mode,
                    result,
                }
            },
            move |msg| ListEvent::PageLoaded {
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
