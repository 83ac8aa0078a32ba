//! # Response Cache Module
//!
//! Stores previously computed backend responses keyed by deterministic
//! request digests, with TTL, transparent compression and single-flight
//! stampede protection.
//!
//! ## Architecture
//!
//! ```text
//! ResponseCache
//!   ├── CacheKeyGenerator        <- deterministic vary-by digests
//!   ├── compression              <- gzip, kept only when it actually shrinks
//!   ├── single-flight map        <- at most one origin fetch per key
//!   └── StoreProvider (enum)     <- zero-cost dispatch over KV backends
//!         ├── Memory(MemoryStore)  <- in-process DashMap with TTL
//!         └── NoOp(NoOpStore)      <- always-miss, always-succeed fallback
//! ```
//!
//! ## Design Decisions
//!
//! - **Best-effort everywhere**: store errors degrade to `Unavailable`
//!   lookups and logged no-op writes; caching never fails a request.
//! - **Enum dispatch** for the store backends, no vtable on the hot path.
//! - **Tri-state lookups** (`Hit` / `Miss` / `Unavailable`) so the
//!   pass-through-on-failure behavior is type-checked, not exception-shaped.

pub mod compression;
pub mod entry;
pub mod errors;
pub mod key;
pub mod provider;
pub mod providers;
pub mod response_cache;
pub mod traits;

pub use entry::CacheEntry;
pub use errors::{CacheError, CacheResult};
pub use key::CacheKeyGenerator;
pub use provider::StoreProvider;
pub use providers::{MemoryStore, NoOpStore};
pub use response_cache::{CacheLookup, CacheSettings, FetchedResponse, ResponseCache};
pub use traits::KeyValueStore;
