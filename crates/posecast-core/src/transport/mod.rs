//! Outbound telemetry transport
//!
//! - [`client`]: the [`Transport`] seam and its `reqwest` implementation
//! - [`guard`]: single in-flight coalescing plus optional signing
//! - [`signing`]: HMAC-SHA-256 over the exact request body

pub mod client;
pub mod guard;
pub mod signing;

pub use client::{DEFAULT_TIMEOUT_SECS, HttpTransport, OutboundRequest, Transport};
pub use guard::{InFlightGuard, InFlightPermit, SendOutcome, TransportGuard};
pub use signing::{AUTH_SCHEME, RequestSigner, SigningError};
