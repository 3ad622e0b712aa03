//! Optimistic toggle bookkeeping shared by likes and follows.
//!
//! A toggle flips a boolean and moves its counter by one before the server
//! answers. [`ToggleLedger`] remembers, per key, the last state the server
//! confirmed and which request is the most recent, so that overlapping
//! toggles on one key settle to a state consistent with what the server
//! actually applied:
//!
//! - a success advances the confirmed state (only forward in issue order)
//! - once the most recent request has failed, the key displays the confirmed
//!   state, and keeps tracking it while older requests settle
//! - a lone failed toggle therefore restores exactly its pre-toggle snapshot
//!
//! Pending toggles survive reloads of the data they apply to: a fresh server
//! reading of a pending key goes through [`ToggleLedger::observe`], which
//! keeps the pending toggle visible on top of it.
use crate::model::{FeedEntry, Identified, UserListEntry, UserProfile};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A boolean with the counter that moves with it (liked + like count,
/// following + follower count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleState {
    pub on: bool,
    pub count: u64,
}

impl ToggleState {
    pub fn new(on: bool, count: u64) -> Self {
        Self { on, count }
    }

    /// The optimistic result of toggling: flip `on` and move `count` by one.
    ///
    /// Decrements saturate at zero so a stale count never underflows.
    pub fn toggled(self) -> Self {
        if self.on {
            Self {
                on: false,
                count: self.count.saturating_sub(1),
            }
        } else {
            Self {
                on: true,
                count: self.count.saturating_add(1),
            }
        }
    }
}

/// Something with a [`ToggleState`] that can be read and written back.
pub trait Toggle {
    fn toggle_state(&self) -> ToggleState;
    fn set_toggle_state(&mut self, state: ToggleState);
}

impl Toggle for FeedEntry {
    fn toggle_state(&self) -> ToggleState {
        ToggleState::new(self.is_liked, u64::from(self.like_count))
    }

    fn set_toggle_state(&mut self, state: ToggleState) {
        self.is_liked = state.on;
        self.like_count = u32::try_from(state.count).unwrap_or(u32::MAX);
    }
}

/// Rows without a follower count keep showing none.
impl Toggle for UserListEntry {
    fn toggle_state(&self) -> ToggleState {
        ToggleState::new(self.is_following, self.follower_count.unwrap_or(0))
    }

    fn set_toggle_state(&mut self, state: ToggleState) {
        self.is_following = state.on;
        if self.follower_count.is_some() {
            self.follower_count = Some(state.count);
        }
    }
}

impl Toggle for UserProfile {
    fn toggle_state(&self) -> ToggleState {
        ToggleState::new(self.is_following, self.follower_count)
    }

    fn set_toggle_state(&mut self, state: ToggleState) {
        self.is_following = state.on;
        self.follower_count = state.count;
    }
}

/// Handle for one in-flight toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    pub key: K,
    /// Optimistic state this request displayed; also what it asks the server for.
    pub target: ToggleState,
    seq: u64,
}

/// What the owner must do with the displayed state after a settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Leave the displayed state as it is.
    Keep,
    /// Display this state.
    Restore(ToggleState),
}

#[derive(Debug)]
struct Pending {
    confirmed: ToggleState,
    confirmed_seq: u64,
    latest_seq: u64,
    latest_target: ToggleState,
    latest_failed: bool,
    in_flight: usize,
}

impl Pending {
    fn shown(&self) -> ToggleState {
        if self.latest_failed {
            self.confirmed
        } else {
            self.latest_target
        }
    }
}

/// Per-key record of in-flight optimistic toggles.
#[derive(Debug)]
pub struct ToggleLedger<K> {
    entries: HashMap<K, Pending>,
    next_seq: u64,
}

impl<K> Default for ToggleLedger<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> ToggleLedger<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a toggle from the currently displayed state.
    ///
    /// The caller displays `ticket.target` immediately and sends the request
    /// for `ticket.target.on`.
    pub fn begin(&mut self, key: K, current: ToggleState) -> Ticket<K> {
        self.next_seq += 1;
        let seq = self.next_seq;
        let target = current.toggled();

        let entry = self.entries.entry(key.clone()).or_insert(Pending {
            confirmed: current,
            confirmed_seq: 0,
            latest_seq: 0,
            latest_target: target,
            latest_failed: false,
            in_flight: 0,
        });
        entry.latest_seq = seq;
        entry.latest_target = target;
        entry.latest_failed = false;
        entry.in_flight += 1;

        Ticket { key, target, seq }
    }

    /// Record the outcome of `ticket`'s request.
    pub fn settle(&mut self, ticket: &Ticket<K>, succeeded: bool) -> Settlement {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            // Tickets always come from `begin`, which creates the entry
            return Settlement::Keep;
        };

        entry.in_flight = entry.in_flight.saturating_sub(1);
        if succeeded && ticket.seq > entry.confirmed_seq {
            entry.confirmed = ticket.target;
            entry.confirmed_seq = ticket.seq;
        }
        if !succeeded && ticket.seq == entry.latest_seq {
            entry.latest_failed = true;
        }

        let outcome = if entry.latest_failed {
            Settlement::Restore(entry.shown())
        } else {
            Settlement::Keep
        };

        if entry.in_flight == 0 {
            self.entries.remove(&ticket.key);
        }
        outcome
    }

    /// Whether `key` has requests in flight.
    pub fn is_pending(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Fold a fresh server reading of `key` into its pending toggles and
    /// return the state to display.
    ///
    /// With nothing pending that is the reading itself. Otherwise the reading
    /// may predate the pending requests, so the on-state the toggles show is
    /// kept and the counter is taken from the reading. A reading that agrees
    /// with the confirmed on-state also refreshes the confirmed counter.
    pub fn observe<Q>(&mut self, key: &Q, fresh: ToggleState) -> ToggleState
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return fresh;
        };
        if entry.confirmed.on == fresh.on {
            entry.confirmed.count = fresh.count;
        }
        if entry.shown().on == fresh.on {
            fresh
        } else {
            fresh.toggled()
        }
    }
}

impl ToggleLedger<String> {
    /// [`observe`](Self::observe) every item, writing back what to display.
    pub fn observe_all<T: Toggle + Identified>(&mut self, items: &mut [T]) {
        if self.entries.is_empty() {
            return;
        }
        for item in items {
            let current = item.toggle_state();
            let shown = self.observe(item.id(), current);
            if shown != current {
                item.set_toggle_state(shown);
            }
        }
    }
}
