//! # Dispatch Module
//!
//! The orchestrator. Sequences admission control, route matching, cache
//! lookup and the circuit-gated backend call with bounded retry, and turns
//! every terminal state into a distinct, named condition.

pub mod backend;
pub mod backoff;
pub mod dispatcher;

pub use backend::{BackendRequest, BackendResponse, BackendTransport, TransportError};
pub use backoff::delay_for_attempt;
pub use dispatcher::Dispatcher;
