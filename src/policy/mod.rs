//! Tenant policy subsystem.
//!
//! # Data Flow
//! ```text
//! config tenants / clients
//!     → store.rs (tenant allow-lists, swapped atomically on reload)
//!     → identity.rs (bearer token → ClientIdentity)
//!     → pattern.rs (allow-rule matching)
//!     → consumed by security guards
//! ```
//!
//! # Design Decisions
//! - Guards depend on the `ConfigProvider` and `Authenticator` traits, not on
//!   the in-memory implementations
//! - Empty tenant lists mean "use the global default"

pub mod identity;
pub mod pattern;
pub mod store;

pub use identity::{
    resolve_identity, AuthError, Authenticator, ClientIdentity, ClientType, StaticTokenAuthenticator,
};
pub use pattern::{matches, matches_any, AllowRule, PatternError};
pub use store::{
    ConfigProvider, GlobalPolicy, PolicyError, PolicyResolver, TenantPolicyStore, TenantSecurityPolicy,
};
