//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, limits)
//!     → middleware.rs (admission: request.rs extracts facts, gateway decides)
//!     → server.rs forward handler (upstream) or preflight/denial response
//!     → Send to client with CORS headers
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::{admission_middleware, AdmissionState};
pub use request::extract_context;
pub use server::HttpServer;
