//! Domain types shared by the API client and the stores.
//!
//! Types deserialize directly from the server's JSON bodies. Fields the server
//! may omit or send as `null` are `Option<T>`; nothing is silently defaulted
//! except counters and the viewer's follow flag on user list rows.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Feed Entries
// ============================================================================

/// One answer to a challenge, as shown in a feed.
///
/// The stores only ever mutate `is_liked` and `like_count`; every other field
/// is passed through to the presentation layer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    #[serde(default)]
    pub challenge_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub ai_feedback: Option<AiFeedback>,
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub view_count: u32,
    pub is_liked: bool,
    pub user: UserSummary,
    #[serde(default)]
    pub challenge: Option<ChallengeSummary>,
    pub created_at: DateTime<Utc>,
}

/// AI-generated feedback attached to a scored answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFeedback {
    pub score: u32,
    pub good_points: String,
    pub improvement: String,
    pub example_answer: String,
}

/// Author shown next to an answer or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// The prompt an answer responds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub char_limit: Option<u32>,
}

// ============================================================================
// Profiles, Comments, Categories
// ============================================================================

/// Public profile of a user, including the viewer's follow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub total_likes: u32,
    #[serde(default)]
    pub answer_count: u64,
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    pub is_following: bool,
}

/// One row of a followers or following list.
///
/// The server sends user summaries; `is_following` and `follower_count` are
/// read when present. An absent follow flag reads as not following, and a
/// follow sent from that state is harmless because the server answers an
/// existing follow with a conflict that counts as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub follower_count: Option<u64>,
}

/// Which relationship list of a user to show.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserList {
    /// Users following this user.
    Followers(String),
    /// Users this user follows.
    Following(String),
}

impl UserList {
    pub fn user_id(&self) -> &str {
        match self {
            UserList::Followers(id) | UserList::Following(id) => id,
        }
    }

    /// Last path segment of the list's endpoint.
    pub fn segment(&self) -> &'static str {
        match self {
            UserList::Followers(_) => "followers",
            UserList::Following(_) => "following",
        }
    }
}

impl fmt::Display for UserList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id(), self.segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub answer_id: String,
    pub content: String,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Feed partition offered as a filter tab (`category_<id>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl Category {
    /// The feed filter that selects this category's answers.
    pub fn filter(&self) -> Filter {
        Filter::Category(self.id.clone())
    }
}

// ============================================================================
// Pages
// ============================================================================

/// One page of a paginated list, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }
}

/// Items that carry a list-unique identifier.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for FeedEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Comment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for UserListEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Filters
// ============================================================================

const CATEGORY_PREFIX: &str = "category_";
const USER_PREFIX: &str = "user_";
const RANKING_PREFIX: &str = "ranking_";

/// Time window of a like ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankingPeriod {
    Daily,
    Weekly,
    AllTime,
}

impl RankingPeriod {
    /// Identifier used in filter names.
    pub fn as_str(self) -> &'static str {
        match self {
            RankingPeriod::Daily => "daily",
            RankingPeriod::Weekly => "weekly",
            RankingPeriod::AllTime => "all_time",
        }
    }

    /// Path segment of the ranking endpoint.
    pub fn segment(self) -> &'static str {
        match self {
            RankingPeriod::Daily => "daily",
            RankingPeriod::Weekly => "weekly",
            RankingPeriod::AllTime => "all-time",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(RankingPeriod::Daily),
            "weekly" => Some(RankingPeriod::Weekly),
            "all_time" | "all-time" => Some(RankingPeriod::AllTime),
            _ => None,
        }
    }
}

/// Named partition of the feed.
///
/// Round-trips through its identifier string: `all`, `following`, `trending`,
/// `category_<id>`, `user_<id>`, `ranking_<daily|weekly|all_time>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    All,
    Following,
    Trending,
    Category(String),
    /// Answers written by one user (profile screen).
    User(String),
    /// Most-liked answers of a period.
    Ranking(RankingPeriod),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("Empty filter identifier")]
    Empty,
    #[error("Filter '{0}' is missing its id")]
    MissingId(String),
    #[error("Unknown filter: {0}")]
    Unknown(String),
}

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FilterParseError::Empty);
        }
        match s {
            "all" => return Ok(Filter::All),
            "following" => return Ok(Filter::Following),
            "trending" => return Ok(Filter::Trending),
            _ => {}
        }
        if let Some(id) = s.strip_prefix(CATEGORY_PREFIX) {
            if id.is_empty() {
                return Err(FilterParseError::MissingId(s.to_string()));
            }
            return Ok(Filter::Category(id.to_string()));
        }
        if let Some(id) = s.strip_prefix(USER_PREFIX) {
            if id.is_empty() {
                return Err(FilterParseError::MissingId(s.to_string()));
            }
            return Ok(Filter::User(id.to_string()));
        }
        if let Some(period) = s.strip_prefix(RANKING_PREFIX) {
            return RankingPeriod::parse(period)
                .map(Filter::Ranking)
                .ok_or_else(|| FilterParseError::Unknown(s.to_string()));
        }
        Err(FilterParseError::Unknown(s.to_string()))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Following => f.write_str("following"),
            Filter::Trending => f.write_str("trending"),
            Filter::Category(id) => write!(f, "{CATEGORY_PREFIX}{id}"),
            Filter::User(id) => write!(f, "{USER_PREFIX}{id}"),
            Filter::Ranking(period) => write!(f, "{RANKING_PREFIX}{}", period.as_str()),
        }
    }
}
