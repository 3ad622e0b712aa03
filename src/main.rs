use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedsync::api::{HttpApi, RemoteApi};
use feedsync::config::Config;
use feedsync::model::{Comment, FeedEntry, Filter, UserList, UserListEntry, UserProfile};
use feedsync::store::{CommentThread, ProfileStore, SyncedListStore, UserListStore};
use feedsync::util::preview;

/// Columns used for content previews
const PREVIEW_WIDTH: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "feedsync", about = "Headless client for the answer feed")]
struct Args {
    /// Config file (default: ~/.config/feedsync/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL from the config file
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List feed entries
    Feed {
        /// all, following, trending, category_<id>, user_<id> or
        /// ranking_<daily|weekly|all_time>
        #[arg(long, default_value = "all")]
        filter: Filter,

        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Like an answer
    Like { answer_id: String },
    /// Remove a like from an answer
    Unlike { answer_id: String },
    /// Follow a user
    Follow { user_id: String },
    /// Stop following a user
    Unfollow { user_id: String },
    /// Show a user's profile
    Profile { user_id: String },
    /// List the users following a user
    Followers {
        user_id: String,

        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// List the users a user follows
    Following {
        user_id: String,

        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// List (and optionally post) comments on an answer
    Comments {
        answer_id: String,

        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Post this text as a new comment first
        #[arg(long, value_name = "TEXT")]
        post: Option<String>,
    },
    /// List the feed's categories
    Categories,
}

fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path().context("Could not locate config file")?,
    };
    let mut config = Config::load(&path)
        .with_context(|| format!("Failed to load config from '{}'", path.display()))?;
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(?config, "Starting");

    let api: Arc<dyn RemoteApi> = Arc::new(
        HttpApi::from_config(&config)
            .with_context(|| format!("Cannot use base URL '{}'", config.base_url))?,
    );

    match args.command {
        Command::Feed { filter, pages } => show_feed(api, config.page_size, filter, pages).await,
        Command::Like { answer_id } => {
            api.like(&answer_id)
                .await
                .with_context(|| format!("Failed to like answer {answer_id}"))?;
            println!("Liked {answer_id}");
            Ok(())
        }
        Command::Unlike { answer_id } => {
            api.unlike(&answer_id)
                .await
                .with_context(|| format!("Failed to unlike answer {answer_id}"))?;
            println!("Removed like from {answer_id}");
            Ok(())
        }
        Command::Follow { user_id } => set_following(api, &user_id, true).await,
        Command::Unfollow { user_id } => set_following(api, &user_id, false).await,
        Command::Profile { user_id } => {
            let profile = load_profile(&mut ProfileStore::new(api), &user_id).await?;
            print_profile(&profile);
            Ok(())
        }
        Command::Followers { user_id, pages } => {
            show_users(api, config.page_size, UserList::Followers(user_id), pages).await
        }
        Command::Following { user_id, pages } => {
            show_users(api, config.page_size, UserList::Following(user_id), pages).await
        }
        Command::Comments {
            answer_id,
            pages,
            post,
        } => show_comments(api, config.page_size, &answer_id, pages, post.as_deref()).await,
        Command::Categories => {
            let categories = api.categories().await.context("Failed to load categories")?;
            for category in categories {
                println!("{:<24} {}", category.filter(), category.name);
            }
            Ok(())
        }
    }
}

async fn show_feed(
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    filter: Filter,
    pages: u32,
) -> Result<()> {
    let mut store = SyncedListStore::new(api, page_size);
    store.load_first_page(filter.clone());
    store.settle().await;
    if let Some(error) = &store.state().error {
        bail!("Failed to load '{filter}' feed: {error}");
    }

    for _ in 1..pages {
        if !store.load_next_page().is_started() {
            break;
        }
        store.settle().await;
        if let Some(error) = &store.state().error {
            // Keep what was loaded; report the page that failed
            eprintln!("Stopped at page {}: {error}", store.state().page);
            break;
        }
    }

    let state = store.state();
    for entry in state.items.iter() {
        print_entry(entry);
    }
    println!(
        "{} entries{}",
        state.items.len(),
        if state.has_more { ", more available" } else { "" }
    );
    Ok(())
}

async fn load_profile(store: &mut ProfileStore, user_id: &str) -> Result<UserProfile> {
    store.load(user_id);
    store.settle().await;
    if let Some(error) = &store.state().error {
        bail!("Failed to load profile {user_id}: {error}");
    }
    store
        .state()
        .profile
        .clone()
        .with_context(|| format!("No profile returned for {user_id}"))
}

async fn set_following(api: Arc<dyn RemoteApi>, user_id: &str, follow: bool) -> Result<()> {
    let mut store = ProfileStore::new(api);
    let profile = load_profile(&mut store, user_id).await?;

    if profile.is_following != follow {
        store.toggle_follow();
        store.settle().await;
        if let Some(error) = &store.state().error {
            bail!("Failed to update follow for {user_id}: {error}");
        }
    }

    if let Some(profile) = &store.state().profile {
        let verb = if profile.is_following { "Following" } else { "Not following" };
        println!("{verb} {} ({} followers)", profile.name, profile.follower_count);
    }
    Ok(())
}

async fn show_users(
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    list: UserList,
    pages: u32,
) -> Result<()> {
    let mut store = UserListStore::new(api, list.clone(), page_size);
    store.load_first_page();
    store.settle().await;
    for _ in 1..pages {
        if !store.load_next_page().is_started() {
            break;
        }
        store.settle().await;
    }
    if let Some(error) = &store.state().error {
        bail!("Failed to load {list}: {error}");
    }

    for user in store.state().items.iter() {
        print_user(user);
    }
    Ok(())
}

async fn show_comments(
    api: Arc<dyn RemoteApi>,
    page_size: u32,
    answer_id: &str,
    pages: u32,
    post: Option<&str>,
) -> Result<()> {
    let mut thread = CommentThread::new(api, answer_id, page_size);

    if let Some(text) = post {
        if let Some(reason) = thread.post(text).ignored_reason() {
            bail!("Comment not posted: {reason}");
        }
        thread.settle().await;
        if let Some(error) = &thread.state().error {
            bail!("Failed to post comment: {error}");
        }
    }

    thread.load_first_page();
    thread.settle().await;
    for _ in 1..pages {
        if !thread.load_next_page().is_started() {
            break;
        }
        thread.settle().await;
    }
    if let Some(error) = &thread.state().error {
        bail!("Failed to load comments: {error}");
    }

    for comment in thread.state().items.iter() {
        print_comment(comment);
    }
    Ok(())
}

fn print_entry(entry: &FeedEntry) {
    let heart = if entry.is_liked { "♥" } else { "♡" };
    let score = entry
        .score
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    println!(
        "{}  {heart} {:<4} {}{score}: {}",
        entry.id,
        entry.like_count,
        preview(&entry.user.name, 16),
        preview(&entry.content, PREVIEW_WIDTH)
    );
}

fn print_comment(comment: &Comment) {
    println!(
        "{}  {} ({}): {}",
        comment.id,
        preview(&comment.user.name, 16),
        comment.created_at.format("%Y-%m-%d %H:%M"),
        preview(&comment.content, PREVIEW_WIDTH)
    );
}

fn print_profile(profile: &UserProfile) {
    println!("{} ({})", preview(&profile.name, 32), profile.id);
    if let Some(bio) = &profile.bio {
        println!("  {}", preview(bio, PREVIEW_WIDTH));
    }
    println!(
        "  answers: {}  likes received: {}  followers: {}  following: {}",
        profile.answer_count, profile.total_likes, profile.follower_count, profile.following_count
    );
    if profile.is_following {
        println!("  You follow this user");
    }
}

fn print_user(user: &UserListEntry) {
    let followed = if user.is_following { "  (following)" } else { "" };
    println!("{}  {}{followed}", user.id, preview(&user.name, 32));
}
