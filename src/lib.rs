//! Library exports for storefront-proxy, shared between the binary and tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod startup;
pub mod state;
pub mod token;
pub mod utils;
