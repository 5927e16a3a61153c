//! Request forwarding: route table, upstream calls with fallback, response shaping.

pub mod forwarder;
pub mod router;
pub mod transform;

pub use forwarder::Forwarder;
pub use router::{Route, RouteTable};
pub use transform::ResponseTransform;
