//! Remote API contract and its HTTP implementation.
//!
//! The stores only talk to [`RemoteApi`]; [`HttpApi`] is the production
//! implementation, and tests substitute scripted fakes.
//!
//! - [`error`] - [`ApiError`] and its [`FailureKind`] classification
//! - [`envelope`] - `{success, data, error, pagination}` decoding
//! - [`http`] - `reqwest`-backed client

mod envelope;
mod error;
mod http;

pub use envelope::Pagination;
pub use error::{ApiError, FailureKind, DECODING_MESSAGE};
pub use http::{HttpApi, USER_ID_HEADER};

use crate::model::{
    Category, Comment, FeedEntry, Filter, Page, UserList, UserListEntry, UserProfile,
};
use async_trait::async_trait;

/// Parameters of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Filter,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

/// Everything the stores need from the server.
///
/// Action calls (`like`, `unlike`, `follow`, `unfollow`) are idempotent from
/// the caller's point of view: repeating an action the server already applied
/// is not an error.
#[async_trait]
pub trait RemoteApi: Send + Sync + 'static {
    async fn list(&self, query: &ListQuery) -> Result<Page<FeedEntry>, ApiError>;

    async fn like(&self, entry_id: &str) -> Result<(), ApiError>;

    async fn unlike(&self, entry_id: &str) -> Result<(), ApiError>;

    async fn follow(&self, user_id: &str) -> Result<(), ApiError>;

    async fn unfollow(&self, user_id: &str) -> Result<(), ApiError>;

    async fn profile(&self, user_id: &str) -> Result<UserProfile, ApiError>;

    /// One page of a user's followers or followed users.
    async fn users(
        &self,
        list: &UserList,
        page: u32,
        page_size: u32,
    ) -> Result<Page<UserListEntry>, ApiError>;

    async fn comments(
        &self,
        answer_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Comment>, ApiError>;

    async fn post_comment(&self, answer_id: &str, content: &str) -> Result<Comment, ApiError>;

    async fn categories(&self) -> Result<Vec<Category>, ApiError>;
}
