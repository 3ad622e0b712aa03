//! Client-side synchronization for a social answer feed.
//!
//! - [`api`] - remote contract ([`api::RemoteApi`]) and its HTTP client
//! - [`store`] - feed, profile and comment stores with optimistic toggles
//! - [`model`] - domain types decoded from the server
//! - [`config`] - `~/.config/feedsync/config.toml`

pub mod api;
pub mod config;
pub mod model;
pub mod store;
pub mod util;
