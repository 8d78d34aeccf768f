//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps tenant policies and client tokens
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Offender thresholds and global default allow-lists are fixed at startup;
//!   tenant policies and client tokens reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AdminConfig, ClientConfig, CorsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    OffenderConfig, SecurityConfig, TenantPolicyConfig, UpstreamConfig,
};
