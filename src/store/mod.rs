//! Client-side state stores.
//!
//! Each store owns its state, publishes a snapshot through a
//! `tokio::sync::watch` channel after every change, and runs remote calls in
//! spawned tasks whose results come back as events. The owner applies those
//! events with `handle_event` (or `settle().await`), so state is only ever
//! mutated from one place. Operations that send requests must be called from
//! within a Tokio runtime.
//!
//! - [`list`] - paginated feed with optimistic likes
//! - [`profile`] - one user profile with optimistic follow
//! - [`comments`] - paginated comment thread with posting
//! - [`users`] - followers / following list with per-row follow
//! - [`toggle`] - snapshot/confirm bookkeeping shared by likes and follows

pub mod comments;
pub mod list;
mod paging;
pub mod profile;
mod task;
pub mod toggle;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use comments::{CommentEvent, CommentThread, CommentThreadState};
pub use list::{ListEvent, ListState, LoadMode, SyncedListStore};
pub use profile::{ProfileEvent, ProfileState, ProfileStore};
pub use toggle::{Settlement, Ticket, Toggle, ToggleLedger, ToggleState};
pub use users::{UserListEvent, UserListState, UserListStore};

use crate::api::{ApiError, FailureKind};
use thiserror::Error;

/// Outcome of calling a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// State changed and, where needed, a request was sent.
    Started,
    /// Nothing happened.
    Ignored(Ignored),
}

impl Dispatch {
    pub fn is_started(self) -> bool {
        matches!(self, Dispatch::Started)
    }

    pub fn ignored_reason(self) -> Option<Ignored> {
        match self {
            Dispatch::Started => None,
            Dispatch::Ignored(reason) => Some(reason),
        }
    }
}

/// Why an operation was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Ignored {
    /// A first-page load for the same source is already in flight.
    #[error("already loading")]
    AlreadyLoading,
    #[error("next page already loading")]
    AlreadyLoadingMore,
    #[error("no more pages")]
    NoMorePages,
    #[error("filter already selected")]
    SameFilter,
    /// No item with that id is in the list.
    #[error("unknown item")]
    UnknownItem,
    /// The operation needs data that has not been loaded yet.
    #[error("nothing loaded")]
    NothingLoaded,
    #[error("a comment is already being posted")]
    AlreadyPosting,
    /// The comment is empty after trimming.
    #[error("comment is empty")]
    EmptyComment,
    #[error("comment exceeds {} characters", crate::util::MAX_COMMENT_LENGTH)]
    CommentTooLong,
}

/// A failed remote call, as the stores record it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    /// Text placed in the store's `error` field.
    pub message: String,
}

impl Failure {
    /// The request task panicked instead of returning.
    pub(crate) fn panicked(panic_msg: String) -> Self {
        Self {
            kind: FailureKind::Internal,
            message: format!("Request failed unexpectedly: {panic_msg}"),
        }
    }
}

impl From<ApiError> for Failure {
    fn from(err: ApiError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}
