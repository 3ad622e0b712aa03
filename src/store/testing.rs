//! Scripted [`RemoteApi`] fake and fixtures for store tests.
use crate::api::{ApiError, ListQuery, RemoteApi};
use crate::model::{
    Category, Comment, FeedEntry, Filter, Page, UserList, UserListEntry, UserProfile, UserSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

enum Outcome<T> {
    Value(Result<T, ApiError>),
    Panic(&'static str),
}

/// One scripted response, optionally held back until a gate is opened.
pub(crate) struct Reply<T> {
    outcome: Outcome<T>,
    gate: Option<Arc<Notify>>,
}

impl<T> Reply<T> {
    pub(crate) fn ok(value: T) -> Self {
        Self {
            outcome: Outcome::Value(Ok(value)),
            gate: None,
        }
    }

    pub(crate) fn err(err: ApiError) -> Self {
        Self {
            outcome: Outcome::Value(Err(err)),
            gate: None,
        }
    }

    pub(crate) fn network(msg: &str) -> Self {
        Self::err(ApiError::Network(msg.to_string()))
    }

    pub(crate) fn panic(msg: &'static str) -> Self {
        Self {
            outcome: Outcome::Panic(msg),
            gate: None,
        }
    }

    /// Hold the response until `gate.notify_one()` is called.
    pub(crate) fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }
}

/// A request the fake received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List(ListQuery),
    Like(String),
    Unlike(String),
    Follow(String),
    Unfollow(String),
    Profile(String),
    Users { list: UserList, page: u32 },
    Comments { answer_id: String, page: u32 },
    PostComment { answer_id: String, content: String },
    Categories,
}

#[derive(Default)]
struct Script {
    lists: HashMap<(String, u32), VecDeque<Reply<Page<FeedEntry>>>>,
    actions: HashMap<String, VecDeque<Reply<()>>>,
    profiles: VecDeque<Reply<UserProfile>>,
    users: HashMap<u32, VecDeque<Reply<Page<UserListEntry>>>>,
    comments: HashMap<u32, VecDeque<Reply<Page<Comment>>>>,
    posts: VecDeque<Reply<Comment>>,
    calls: Vec<Call>,
}

/// Fake server answering from per-request queues.
///
/// Unscripted list, profile, user list, comment and post requests fail with a
/// network error; unscripted like/follow actions succeed.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub(crate) fn push_list(&self, filter: &Filter, page: u32, reply: Reply<Page<FeedEntry>>) {
        self.with_script(|s| {
            s.lists
                .entry((filter.to_string(), page))
                .or_default()
                .push_back(reply)
        });
    }

    /// Script the next like/unlike/follow/unfollow call on `id`.
    pub(crate) fn push_action(&self, id: &str, reply: Reply<()>) {
        self.with_script(|s| s.actions.entry(id.to_string()).or_default().push_back(reply));
    }

    pub(crate) fn push_profile(&self, reply: Reply<UserProfile>) {
        self.with_script(|s| s.profiles.push_back(reply));
    }

    pub(crate) fn push_users(&self, page: u32, reply: Reply<Page<UserListEntry>>) {
        self.with_script(|s| s.users.entry(page).or_default().push_back(reply));
    }

    pub(crate) fn push_comments(&self, page: u32, reply: Reply<Page<Comment>>) {
        self.with_script(|s| s.comments.entry(page).or_default().push_back(reply));
    }

    pub(crate) fn push_post(&self, reply: Reply<Comment>) {
        self.with_script(|s| s.posts.push_back(reply));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.with_script(|s| s.calls.clone())
    }

    pub(crate) fn list_calls(&self) -> Vec<ListQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::List(q) => Some(q),
                _ => None,
            })
            .collect()
    }
}

async fn resolve<T>(reply: Option<Reply<T>>, unscripted: Result<T, ApiError>) -> Result<T, ApiError> {
    let Some(reply) = reply else {
        return unscripted;
    };
    if let Some(gate) = reply.gate {
        gate.notified().await;
    }
    match reply.outcome {
        Outcome::Value(result) => result,
        Outcome::Panic(msg) => panic!("{msg}"),
    }
}

fn unscripted<T>() -> Result<T, ApiError> {
    Err(ApiError::Network("no scripted response".to_string()))
}

impl ScriptedApi {
    async fn action(&self, call: Call, id: &str) -> Result<(), ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(call);
            s.actions.get_mut(id).and_then(VecDeque::pop_front)
        });
        resolve(reply, Ok(())).await
    }
}

#[async_trait]
impl RemoteApi for ScriptedApi {
    async fn list(&self, query: &ListQuery) -> Result<Page<FeedEntry>, ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(Call::List(query.clone()));
            s.lists
                .get_mut(&(query.filter.to_string(), query.page))
                .and_then(VecDeque::pop_front)
        });
        resolve(reply, unscripted()).await
    }

    async fn like(&self, entry_id: &str) -> Result<(), ApiError> {
        self.action(Call::Like(entry_id.to_string()), entry_id).await
    }

    async fn unlike(&self, entry_id: &str) -> Result<(), ApiError> {
        self.action(Call::Unlike(entry_id.to_string()), entry_id).await
    }

    async fn follow(&self, user_id: &str) -> Result<(), ApiError> {
        self.action(Call::Follow(user_id.to_string()), user_id).await
    }

    async fn unfollow(&self, user_id: &str) -> Result<(), ApiError> {
        self.action(Call::Unfollow(user_id.to_string()), user_id).await
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(Call::Profile(user_id.to_string()));
            s.profiles.pop_front()
        });
        resolve(reply, unscripted()).await
    }

    async fn users(
        &self,
        list: &UserList,
        page: u32,
        _page_size: u32,
    ) -> Result<Page<UserListEntry>, ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(Call::Users {
                list: list.clone(),
                page,
            });
            s.users.get_mut(&page).and_then(VecDeque::pop_front)
        });
        resolve(reply, unscripted()).await
    }

    async fn comments(
        &self,
        answer_id: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<Page<Comment>, ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(Call::Comments {
                answer_id: answer_id.to_string(),
                page,
            });
            s.comments.get_mut(&page).and_then(VecDeque::pop_front)
        });
        resolve(reply, unscripted()).await
    }

    async fn post_comment(&self, answer_id: &str, content: &str) -> Result<Comment, ApiError> {
        let reply = self.with_script(|s| {
            s.calls.push(Call::PostComment {
                answer_id: answer_id.to_string(),
                content: content.to_string(),
            });
            s.posts.pop_front()
        });
        resolve(reply, unscripted()).await
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.with_script(|s| s.calls.push(Call::Categories));
        Ok(Vec::new())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600, 0).unwrap()
}

fn author(id: &str) -> UserSummary {
    UserSummary {
        id: id.to_string(),
        name: format!("user {id}"),
        avatar: None,
    }
}

pub(crate) fn entry(id: &str, is_liked: bool, like_count: u32) -> FeedEntry {
    FeedEntry {
        id: id.to_string(),
        challenge_id: None,
        content: format!("answer {id}"),
        score: None,
        ai_feedback: None,
        like_count,
        comment_count: 0,
        view_count: 0,
        is_liked,
        user: author("author"),
        challenge: None,
        created_at: timestamp(),
    }
}

/// Unliked entries `<prefix>0 .. <prefix>{n-1}`.
pub(crate) fn entries(prefix: &str, n: usize) -> Vec<FeedEntry> {
    (0..n).map(|i| entry(&format!("{prefix}{i}"), false, 0)).collect()
}

pub(crate) fn ids(items: &[FeedEntry]) -> Vec<&str> {
    items.iter().map(|e| e.id.as_str()).collect()
}

pub(crate) fn profile(id: &str, is_following: bool, follower_count: u64) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        name: format!("user {id}"),
        avatar: None,
        bio: None,
        total_likes: 0,
        answer_count: 0,
        follower_count,
        following_count: 0,
        is_following,
    }
}

pub(crate) fn user_row(id: &str, is_following: bool, follower_count: Option<u64>) -> UserListEntry {
    UserListEntry {
        id: id.to_string(),
        name: format!("user {id}"),
        avatar: None,
        is_following,
        follower_count,
    }
}

pub(crate) fn comment(id: &str, answer_id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        answer_id: answer_id.to_string(),
        content: format!("comment {id}"),
        user: author("commenter"),
        created_at: timestamp(),
    }
}
