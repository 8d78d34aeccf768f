//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → offenders.rs (is the client address blocked?)
//!     → trusted_host.rs (Host header vs tenant/global allow-list)
//!     → cors.rs (Origin vs tenant allow-list, fallbacks)
//!     → gateway.rs decides: forward, preflight, or deny (error.rs)
//! ```
//!
//! # Design Decisions
//! - Fail closed: policy lookup faults deny the request
//! - No trust in client input
//! - Only untrusted-host denials count towards blocking

pub mod cors;
pub mod error;
pub mod gateway;
pub mod offenders;
pub mod trusted_host;

#[cfg(test)]
pub(crate) mod testing;

pub use cors::{CorsDecision, CorsGuard, CorsHeaders};
pub use error::{CheckStage, GatewayError};
pub use gateway::{Gateway, RequestContext, UNKNOWN_CLIENT};
pub use offenders::{OffenderSnapshot, OffenderTracker};
pub use trusted_host::TrustedHostGuard;
