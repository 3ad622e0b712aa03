use super::envelope::{decode_ack, decode_data, decode_failure};
use super::{ApiError, ListQuery, RemoteApi};
use crate::config::Config;
use crate::model::{
    Category, Comment, FeedEntry, Filter, Page, UserList, UserListEntry, UserProfile,
};
use crate::util::validate_base_url;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024; // 5MB

/// Header carrying the caller's identity on every request.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// 404 messages meaning the answer or user itself is gone, as opposed to the
/// like or follow being absent.
const TARGET_MISSING_MESSAGES: &[&str] = &["Answer not found", "User not found"];

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    content: &'a str,
}

/// Idempotent action whose "already applied" status is not a failure.
#[derive(Debug, Clone, Copy)]
enum Action {
    Like,
    Unlike,
    Follow,
    Unfollow,
}

impl Action {
    fn method(self) -> Method {
        match self {
            Action::Like | Action::Follow => Method::POST,
            Action::Unlike | Action::Unfollow => Method::DELETE,
        }
    }

    /// Status the server answers with when the action was already in effect.
    ///
    /// 409 means "already liked/following". 404 on removal means there is
    /// nothing left to remove, which is the state the caller asked for,
    /// unless the body says the target itself does not exist.
    fn already_applied_status(self) -> u16 {
        match self {
            Action::Like | Action::Follow => 409,
            Action::Unlike | Action::Unfollow => 404,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::Unlike => "unlike",
            Action::Follow => "follow",
            Action::Unfollow => "unfollow",
        }
    }
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// `reqwest`-backed [`RemoteApi`].
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    user_id: Option<SecretString>,
    timeout_secs: u64,
    max_response_bytes: usize,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url.as_str())
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

impl HttpApi {
    /// Client for `base_url` with default limits and no identity header.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::build(
            base_url,
            None,
            DEFAULT_TIMEOUT_SECS,
            DEFAULT_MAX_RESPONSE_BYTES,
        )
    }

    /// Client configured from the loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::build(
            &config.base_url,
            config.user_id(),
            config.request_timeout_secs,
            config.max_response_bytes,
        )
    }

    fn build(
        base_url: &str,
        user_id: Option<SecretString>,
        timeout_secs: u64,
        max_response_bytes: usize,
    ) -> Result<Self, ApiError> {
        let base_url =
            validate_base_url(base_url).map_err(|e| ApiError::InvalidBaseUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs.clamp(1, 10)))
            .redirect(create_redirect_policy())
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        tracing::debug!(base_url = %base_url, timeout_secs, "Created API client");

        Ok(Self {
            client,
            base_url,
            user_id,
            timeout_secs: timeout_secs.max(1),
            max_response_bytes,
        })
    }

    /// Send `X-User-ID` on every request.
    pub fn with_user_id(mut self, user_id: SecretString) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments (each percent-encoded).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Validated http(s) URLs can always be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn paged_endpoint(&self, segments: &[&str], page: u32, page_size: u32) -> Url {
        let mut url = self.endpoint(segments);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        url
    }

    fn list_url(&self, query: &ListQuery) -> Url {
        match &query.filter {
            Filter::All => self.paged_endpoint(&["feed"], query.page, query.page_size),
            Filter::Following => {
                let mut url = self.paged_endpoint(&["feed"], query.page, query.page_size);
                url.query_pairs_mut().append_pair("filter", "following");
                url
            }
            Filter::Category(id) => {
                let mut url = self.paged_endpoint(&["feed"], query.page, query.page_size);
                url.query_pairs_mut().append_pair("category_id", id);
                url
            }
            Filter::Trending => self.paged_endpoint(&["trending"], query.page, query.page_size),
            Filter::User(id) => {
                self.paged_endpoint(&["users", id.as_str(), "answers"], query.page, query.page_size)
            }
            Filter::Ranking(period) => self.paged_endpoint(
                &["rankings", period.segment()],
                query.page,
                query.page_size,
            ),
        }
    }

    /// Send a request and return the status with a size-limited body.
    async fn execute(&self, request: RequestBuilder) -> Result<(u16, Vec<u8>), ApiError> {
        let mut request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(user_id) = &self.user_id {
            request = request.header(USER_ID_HEADER, user_id.expose_secret());
        }

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            request.send(),
        )
        .await
        .map_err(|_| ApiError::Timeout(self.timeout_secs))?
        .map_err(|e| ApiError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status().as_u16();
        let body = read_limited_body(response, self.max_response_bytes, self.timeout_secs).await?;
        Ok((status, body))
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<(T, Option<super::Pagination>), ApiError> {
        tracing::debug!(url = %url, "GET");
        let (status, body) = self.execute(self.client.get(url)).await?;
        if !(200..300).contains(&status) {
            return Err(decode_failure(status, &body));
        }
        decode_data(status, &body)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        page_size: u32,
    ) -> Result<Page<T>, ApiError> {
        let (items, pagination): (Vec<T>, _) = self.get_data(url).await?;
        // Without a pagination block, a full page implies there may be another
        let has_more = match pagination {
            Some(p) => p.has_more,
            None => items.len() >= page_size as usize,
        };
        Ok(Page::new(items, has_more))
    }

    async fn action(&self, action: Action, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.endpoint(segments);
        tracing::debug!(action = action.name(), url = %url, "Sending action");
        let (status, body) = self
            .execute(self.client.request(action.method(), url))
            .await?;

        if status == action.already_applied_status() {
            let failure = decode_failure(status, &body);
            if is_target_missing(&failure) {
                return Err(failure);
            }
            tracing::debug!(
                action = action.name(),
                status,
                "Action already in effect on server, treating as success"
            );
            return Ok(());
        }
        if !(200..300).contains(&status) {
            return Err(decode_failure(status, &body));
        }
        decode_ack(status, &body)
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn list(&self, query: &ListQuery) -> Result<Page<FeedEntry>, ApiError> {
        let page_size = query.page_size.max(1);
        self.get_page(self.list_url(query), page_size).await
    }

    async fn like(&self, entry_id: &str) -> Result<(), ApiError> {
        self.action(Action::Like, &["answers", entry_id, "like"])
            .await
    }

    async fn unlike(&self, entry_id: &str) -> Result<(), ApiError> {
        self.action(Action::Unlike, &["answers", entry_id, "like"])
            .await
    }

    async fn follow(&self, user_id: &str) -> Result<(), ApiError> {
        self.action(Action::Follow, &["users", user_id, "follow"])
            .await
    }

    async fn unfollow(&self, user_id: &str) -> Result<(), ApiError> {
        self.action(Action::Unfollow, &["users", user_id, "follow"])
            .await
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let (profile, _) = self.get_data(self.endpoint(&["users", user_id])).await?;
        Ok(profile)
    }

    async fn users(
        &self,
        list: &UserList,
        page: u32,
        page_size: u32,
    ) -> Result<Page<UserListEntry>, ApiError> {
        let page_size = page_size.max(1);
        let segments = ["users", list.user_id(), list.segment()];
        let url = self.paged_endpoint(&segments, page, page_size);
        self.get_page(url, page_size).await
    }

    async fn comments(
        &self,
        answer_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Comment>, ApiError> {
        let page_size = page_size.max(1);
        let url = self.paged_endpoint(&["answers", answer_id, "comments"], page, page_size);
        self.get_page(url, page_size).await
    }

    async fn post_comment(&self, answer_id: &str, content: &str) -> Result<Comment, ApiError> {
        let url = self.endpoint(&["answers", answer_id, "comments"]);
        let body = serde_json::to_vec(&CreateCommentRequest { content })?;
        tracing::debug!(url = %url, "POST comment");

        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let (status, body) = self.execute(request).await?;
        if !(200..300).contains(&status) {
            return Err(decode_failure(status, &body));
        }
        let (comment, _) = decode_data(status, &body)?;
        Ok(comment)
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let (mut categories, _): (Vec<Category>, _) =
            self.get_data(self.endpoint(&["categories"])).await?;
        categories.sort_by_key(|c| c.sort_order);
        Ok(categories)
    }
}

fn is_target_missing(err: &ApiError) -> bool {
    match err {
        ApiError::Server { message, .. } => TARGET_MISSING_MESSAGES.contains(&message.as_str()),
        _ => false,
    }
}

async fn read_limited_body(
    response: reqwest::Response,
    limit: usize,
    timeout_secs: u64,
) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::from_reqwest(e, timeout_secs))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
