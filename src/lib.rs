//! Tenant-aware request admission gateway.
//!
//! Decides for every inbound request whether it may proceed, which CORS
//! disclosure it receives, and whether its source is temporarily blocked.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::Gateway;
