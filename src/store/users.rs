//! Followers / following list with a follow toggle on every row.
//!
//! Paging works like the comment thread; follow toggles work like likes in
//! the feed list, keyed by user id.
use super::list::LoadMode;
use super::paging::{append_unique, dedupe};
use super::task::Inbox;
use super::toggle::{Settlement, Ticket, Toggle, ToggleLedger};
use super::{Dispatch, Failure, Ignored};
use crate::api::RemoteApi;
use crate::model::{Page, UserList, UserListEntry};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListState {
    pub list: UserList,
    pub items: Arc<Vec<UserListEntry>>,
    pub page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<String>,
}

impl UserListState {
    fn new(list: UserList) -> Self {
        Self {
            list,
            items: Arc::new(Vec::new()),
            page: 1,
            has_more: true,
            is_loading: false,
            is_loading_more: false,
            error: None,
        }
    }

    pub fn user(&self, id: &str) -> Option<&UserListEntry> {
        self.items.iter().find(|u| u.id == id)
    }
}

#[derive(Debug)]
pub enum UserListEvent {
    PageLoaded {
        generation: u64,
        mode: LoadMode,
        result: Result<Page<UserListEntry>, Failure>,
    },
    FollowSettled {
        ticket: Ticket<String>,
        result: Result<(), Failure>,
    },
}

pub struct UserListStore {
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    state: UserListState,
    generation: u64,
    follows: ToggleLedger<String>,
    inbox: Inbox<UserListEvent>,
    publisher: watch::Sender<UserListState>,
}

impl UserListStore {
    pub fn new(api: Arc<dyn RemoteApi>, list: UserList, page_size: u32) -> Self {
        let state = UserListState::new(list);
        let (publisher, _) = watch::channel(state.clone());
        Self {
            api,
            page_size: page_size.max(1),
            state,
            generation: 0,
            follows: ToggleLedger::new(),
            inbox: Inbox::new(),
            publisher,
        }
    }

    pub fn state(&self) -> &UserListState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<UserListState> {
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

    /// Optimistically flip follow on the row for `user_id` and send the request.
    pub fn toggle_follow(&mut self, user_id: &str) -> Dispatch {
        let Some(index) = self.state.items.iter().position(|u| u.id == user_id) else {
            tracing::debug!(user_id, "Follow toggle on unknown row, ignoring");
            return Dispatch::Ignored(Ignored::UnknownItem);
        };

        let current = self.state.items[index].toggle_state();
        let ticket = self.follows.begin(user_id.to_string(), current);
        Arc::make_mut(&mut self.state.items)[index].set_toggle_state(ticket.target);
        self.publish();

        let api = Arc::clone(&self.api);
        let follow = ticket.target.on;
        let id = user_id.to_string();
        let panic_ticket = ticket.clone();
        self.inbox.spawn(
            "toggle_follow",
            async move {
                let result = if follow {
                    api.follow(&id).await
                } else {
                    api.unfollow(&id).await
                };
                UserListEvent::FollowSettled {
                    ticket,
                    result: result.map_err(Failure::from),
                }
            },
            move |msg| UserListEvent::FollowSettled {
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

    pub async fn next_event(&mut self) -> Option<UserListEvent> {
        self.inbox.recv().await
    }

    pub async fn settle(&mut self) {
        while let Some(event) = self.inbox.recv().await {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: UserListEvent) {
        match event {
            UserListEvent::PageLoaded {
                generation,
                mode,
                result,
            } => {
                if generation != self.generation {
                    tracing::debug!(list = %self.state.list, "Ignoring stale user page (generation mismatch)");
                    return;
                }
                self.apply_page(mode, result);
            }
            UserListEvent::FollowSettled { ticket, result } => {
                let settlement = self.follows.settle(&ticket, result.is_ok());
                if let Err(failure) = result {
                    tracing::warn!(
                        user_id = %ticket.key,
                        following = ticket.target.on,
                        error = %failure.message,
                        "Follow toggle failed, rolling back"
                    );
                    self.state.error = Some(failure.message);
                }
                if let Settlement::Restore(state) = settlement {
                    if let Some(index) = self.state.items.iter().position(|u| u.id == ticket.key) {
                        Arc::make_mut(&mut self.state.items)[index].set_toggle_state(state);
                    }
                }
            }
        }
        self.publish();
    }

    fn apply_page(&mut self, mode: LoadMode, result: Result<Page<UserListEntry>, Failure>) {
        match (mode, result) {
            (LoadMode::First, Ok(page)) => {
                let mut items = dedupe(page.items);
                self.follows.observe_all(&mut items);
                self.state.items = Arc::new(items);
                self.state.page = 2;
                self.state.has_more = page.has_more;
                self.state.is_loading = false;
            }
            (LoadMode::Next { page: number }, Ok(page)) => {
                let items = Arc::make_mut(&mut self.state.items);
                let before = items.len();
                append_unique(items, page.items);
                self.follows.observe_all(&mut items[before..]);
                self.state.page = number + 1;
                self.state.has_more = page.has_more;
                self.state.is_loading_more = false;
            }
            (mode, Err(failure)) => {
                tracing::warn!(list = %self.state.list, ?mode, error = %failure.message, "User list load failed");
                match mode {
                    LoadMode::First => self.state.is_loading = false,
                    LoadMode::Next { .. } => self.state.is_loading_more = false,
                }
                self.state.error = Some(failure.message);
            }
        }
    }

    fn spawn_page(&mut self, page: u32, mode: LoadMode) {
        let api = Arc::clone(&self.api);
        let list = self.state.list.clone();
        let page_size = self.page_size;
        let generation = self.generation;
        tracing::debug!(list = %list, page, generation, "Requesting user page");
        self.inbox.spawn(
            "load_users",
            async move {
                let result = api
                    .users(&list, page, page_size)
                    .await
                    .map_err(Failure::from);
                UserListEvent::PageLoaded {
                    generation,
                    mode,
                    result,
                }
            },
            move |msg| UserListEvent::PageLoaded {
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
