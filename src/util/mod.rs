//! Utility functions for common operations.
//!
//! - **Text**: terminal-safe, width-aware previews of user content
//! - **URL validation**: base URL policy for the API client (HTTPS except for
//!   local development hosts)

mod text;
mod url_validator;

pub use text::{preview, strip_control_chars};
pub use url_validator::{validate_base_url, UrlValidationError};

/// Maximum accepted comment length in characters, matching the server's limit.
pub const MAX_COMMENT_LENGTH: usize = 500;
