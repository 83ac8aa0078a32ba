#![allow(clippy::doc_markdown)] // Allow technical terms like TOML, SHA-256 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Gateway Core
//!
//! Embeddable data plane for an API gateway: admission control, failure
//! isolation, response caching and resilient backend dispatch behind one
//! async entry point.
//!
//! ## Overview
//!
//! A request moves through four stages. The [`routing`] layer resolves the
//! path to a backend route. The [`limiter`] applies a token-bucket admission
//! check keyed by caller identity and route. The [`cache`] serves eligible
//! reads from a key-value store, collapsing concurrent misses into a single
//! origin fetch. The [`dispatch`] layer calls the backend through a
//! per-backend circuit breaker with bounded retry and exponential backoff.
//!
//! Every terminal outcome is a typed [`error::GatewayError`] variant carrying
//! the HTTP status an edge server would return, including `Retry-After`
//! timing for rate-limit and open-circuit rejections.
//!
//! ## Module Organization
//!
//! - [`config`] - Typed configuration with eager validation
//! - [`limiter`] - Token-bucket rate limiting with per-route overrides
//! - [`resilience`] - Per-backend circuit breakers
//! - [`cache`] - Response cache, key generation, compression, single-flight
//! - [`routing`] - Route table and matcher
//! - [`dispatch`] - Backend transport abstraction and the request pipeline
//! - [`error`] - Structured error handling
//! - [`clock`] - Injectable time source for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway_core::config::GatewayConfig;
//! use gateway_core::dispatch::{BackendTransport, Dispatcher};
//! use gateway_core::types::{GatewayRequest, Identity};
//! use std::sync::Arc;
//!
//! # async fn example<T: BackendTransport + 'static>(transport: Arc<T>) -> gateway_core::Result<()> {
//! let config = GatewayConfig::load(Some("gateway.toml".as_ref()))?;
//! let dispatcher = Dispatcher::from_config(config, transport)?;
//!
//! let request = GatewayRequest::new("GET", "/api/users", Identity::ApiKey("key-1".into()));
//! let response = dispatcher.dispatch(request).await?;
//! println!("{} ({:?})", response.status, response.cache_status);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod resilience;
pub mod routing;
pub mod types;

pub use cache::{CacheKeyGenerator, CacheLookup, KeyValueStore, ResponseCache, StoreProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use dispatch::{BackendRequest, BackendResponse, BackendTransport, Dispatcher, TransportError};
pub use error::{GatewayError, Result};
pub use limiter::TokenBucketLimiter;
pub use resilience::{CallPermit, CircuitBreaker, CircuitBreakerManager, CircuitState};
pub use routing::{RouteConfig, RouteMatcher};
pub use types::{CacheStatus, GatewayRequest, Identity, ProxiedResponse};
