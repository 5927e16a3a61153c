//! Access-token lifecycle: one cached bearer token, refreshed on expiry.

pub mod cache;
pub mod source;

pub use cache::TokenCache;
pub use source::{OAuthRefreshSource, TokenSource};
