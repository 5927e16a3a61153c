pub mod forward;
pub mod token;

pub use forward::{ForwardedRequest, InboundRequest, Target, UpstreamResponse};
pub use token::{CachedToken, TokenResponse};
