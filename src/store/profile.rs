//! Single user profile with an optimistic follow toggle.
//!
//! Follow toggles are tracked by user id, so a reload of the same profile
//! keeps a pending follow visible and its result still applies afterwards.
use super::task::Inbox;
use super::toggle::{Settlement, Ticket, Toggle, ToggleLedger};
use super::{Dispatch, Failure, Ignored};
use crate::api::RemoteApi;
use crate::model::UserProfile;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileState {
    pub profile: Option<UserProfile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum ProfileEvent {
    Loaded {
        generation: u64,
        user_id: String,
        result: Result<UserProfile, Failure>,
    },
    FollowSettled {
        ticket: Ticket<String>,
        result: Result<(), Failure>,
    },
}

pub struct ProfileStore {
    api: Arc<dyn RemoteApi>,
    state: ProfileState,
    /// User whose profile is loading or shown
    user_id: Option<String>,
    generation: u64,
    follows: ToggleLedger<String>,
    inbox: Inbox<ProfileEvent>,
    publisher: watch::Sender<ProfileState>,
}

impl ProfileStore {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        let state = ProfileState::default();
        let (publisher, _) = watch::channel(state.clone());
        Self {
            api,
            state,
            user_id: None,
            generation: 0,
            follows: ToggleLedger::new(),
            inbox: Inbox::new(),
            publisher,
        }
    }

    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileState> {
        self.publisher.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.inbox.in_flight()
    }

    /// Fetch `user_id`'s profile.
    ///
    /// A repeated call for the same user while loading is ignored; a call for
    /// another user supersedes it. A different user's profile is cleared
    /// immediately so it is never shown under the new id.
    pub fn load(&mut self, user_id: &str) -> Dispatch {
        let same_user = self.user_id.as_deref() == Some(user_id);
        if same_user && self.state.is_loading {
            return Dispatch::Ignored(Ignored::AlreadyLoading);
        }
        if !same_user {
            self.state.profile = None;
            self.user_id = Some(user_id.to_string());
        }

        self.generation += 1;
        self.state.is_loading = true;
        self.state.error = None;
        self.publish();

        let generation = self.generation;
        let api = Arc::clone(&self.api);
        let id = user_id.to_string();
        let panic_id = id.clone();
        tracing::debug!(user_id, generation, "Requesting profile");
        self.inbox.spawn(
            "load_profile",
            async move {
                let result = api.profile(&id).await.map_err(Failure::from);
                ProfileEvent::Loaded {
                    generation,
                    user_id: id,
                    result,
                }
            },
            move |msg| ProfileEvent::Loaded {
                generation,
                user_id: panic_id,
                result: Err(Failure::panicked(msg)),
            },
        );
        Dispatch::Started
    }

    /// Optimistically flip follow on the loaded profile and send the request.
    pub fn toggle_follow(&mut self) -> Dispatch {
        let Some(profile) = self.state.profile.as_mut() else {
            return Dispatch::Ignored(Ignored::NothingLoaded);
        };

        let ticket = self.follows.begin(profile.id.clone(), profile.toggle_state());
        profile.set_toggle_state(ticket.target);
        self.publish();

        let api = Arc::clone(&self.api);
        let follow = ticket.target.on;
        let id = ticket.key.clone();
        let panic_ticket = ticket.clone();
        self.inbox.spawn(
            "toggle_follow",
            async move {
                let result = if follow {
                    api.follow(&id).await
                } else {
                    api.unfollow(&id).await
                };
                ProfileEvent::FollowSettled {
                    ticket,
                    result: result.map_err(Failure::from),
                }
            },
            move |msg| ProfileEvent::FollowSettled {
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

    pub async fn next_event(&mut self) -> Option<ProfileEvent> {
        self.inbox.recv().await
    }

    pub async fn settle(&mut self) {
        while let Some(event) = self.inbox.recv().await {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: ProfileEvent) {
        match event {
            ProfileEvent::Loaded {
                generation,
                user_id,
                result,
            } => {
                if generation != self.generation {
                    tracing::debug!(%user_id, "Ignoring stale profile (generation mismatch)");
                    return;
                }
                self.state.is_loading = false;
                match result {
                    Ok(mut profile) => {
                        tracing::debug!(%user_id, followers = profile.follower_count, "Profile loaded");
                        let current = profile.toggle_state();
                        let shown = self.follows.observe(profile.id.as_str(), current);
                        profile.set_toggle_state(shown);
                        self.state.profile = Some(profile);
                    }
                    Err(failure) => {
                        tracing::warn!(%user_id, error = %failure.message, "Profile load failed");
                        self.state.error = Some(failure.message);
                    }
                }
            }
            ProfileEvent::FollowSettled { ticket, result } => {
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
                    if let Some(profile) = self.state.profile.as_mut() {
                        if profile.id == ticket.key {
                            profile.set_toggle_state(state);
                        }
                    }
                }
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}
