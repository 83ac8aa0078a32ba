//! The request orchestrator.
//!
//! Per-request pipeline: route match, admission control keyed by
//! identity + route, cache lookup (with single-flight fetch) for
//! cache-eligible methods, circuit-gated backend call with bounded retry and
//! exponential backoff, cache store on success, and pattern invalidation on
//! writes. Backoff sleeps hold no limiter, breaker or cache locks.

use crate::cache::{
    CacheKeyGenerator, FetchedResponse, KeyValueStore, ResponseCache, StoreProvider,
};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::dispatch::backend::{
    classify_status, BackendRequest, BackendTransport, FailureKind, TransportError,
};
use crate::dispatch::backoff;
use crate::error::{GatewayError, Result};
use crate::limiter::TokenBucketLimiter;
use crate::resilience::{CircuitBreaker, CircuitBreakerManager, CircuitBreakerMetrics};
use crate::routing::{RouteConfig, RouteMatcher};
use crate::types::{CacheStatus, GatewayRequest, ProxiedResponse};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Dispatcher<T: BackendTransport + 'static, S: KeyValueStore + 'static = StoreProvider> {
    limiter: Arc<TokenBucketLimiter>,
    matcher: Arc<RouteMatcher>,
    cache: ResponseCache<S>,
    key_gen: CacheKeyGenerator,
    breakers: Arc<CircuitBreakerManager>,
    transport: Arc<T>,
    retryable_statuses: Vec<u16>,
}

impl<T: BackendTransport + 'static> Dispatcher<T, StoreProvider> {
    /// Build the full data plane from validated configuration, with the
    /// production clock.
    pub fn from_config(config: GatewayConfig, transport: Arc<T>) -> Result<Self> {
        Self::from_config_with_clock(config, transport, Arc::new(SystemClock))
    }

    /// As [`Self::from_config`], with an injected clock for deterministic
    /// tests.
    pub fn from_config_with_clock(
        config: GatewayConfig,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = if config.cache.enabled {
            StoreProvider::memory(clock.clone())
        } else {
            StoreProvider::noop()
        };
        let key_gen = CacheKeyGenerator::new(config.cache.namespace.clone());
        let cache = ResponseCache::new(store, config.cache, clock.clone());
        let matcher = RouteMatcher::new(config.routes).map_err(GatewayError::Configuration)?;

        Ok(Self {
            limiter: Arc::new(TokenBucketLimiter::new(config.rate_limit, clock.clone())),
            matcher: Arc::new(matcher),
            cache,
            key_gen,
            breakers: Arc::new(CircuitBreakerManager::new(config.circuit_breakers, clock)),
            transport,
            retryable_statuses: config.retryable_statuses,
        })
    }
}

impl<T: BackendTransport + 'static, S: KeyValueStore + 'static> Dispatcher<T, S> {
    pub fn new(
        limiter: Arc<TokenBucketLimiter>,
        matcher: Arc<RouteMatcher>,
        cache: ResponseCache<S>,
        key_gen: CacheKeyGenerator,
        breakers: Arc<CircuitBreakerManager>,
        transport: Arc<T>,
        retryable_statuses: Vec<u16>,
    ) -> Self {
        Self {
            limiter,
            matcher,
            cache,
            key_gen,
            breakers,
            transport,
            retryable_statuses,
        }
    }

    /// Handle one request through the full pipeline.
    ///
    /// Every terminal state is a distinct [`GatewayError`] variant; a
    /// successful proxy returns the backend's response with cache-status
    /// metadata attached.
    pub async fn dispatch(&self, request: GatewayRequest) -> Result<ProxiedResponse> {
        // Route first: the admission key is identity + route, so per-route
        // limit overrides get independent buckets.
        let route = self
            .matcher
            .match_route(&request.method, &request.path)
            .ok_or_else(|| GatewayError::RouteNotFound {
                method: request.method.clone(),
                path: request.path.clone(),
            })?
            .clone();

        let limit_key = format!("{}:{}", request.identity.rate_limit_key(), route.name);
        let decision = self
            .limiter
            .admit(&limit_key, Some(&route.name), &request.method, &request.path);
        if !decision.allowed {
            return Err(GatewayError::RateLimited {
                key: limit_key,
                retry_after: decision.retry_after,
            });
        }

        let breaker = self.breakers.breaker_for(&route.backend_url);

        let cacheable =
            route.cache_policy.enabled && route.cache_policy.method_is_cacheable(&request.method);
        if cacheable {
            let cache_key = self.key_gen.generate(&request, &route.cache_policy.vary_by);
            let ttl = route.cache_policy.ttl();
            let tags = route.cache_policy.tags.clone();

            let transport = self.transport.clone();
            let retryable = self.retryable_statuses.clone();
            let fetch_route = route.clone();
            let fetch_request = request.clone();
            let (resp, cache_status) = self
                .cache
                .get_or_fetch(&cache_key, ttl, &tags, move || {
                    call_backend(transport, breaker, fetch_route, fetch_request, retryable)
                })
                .await?;
            debug!(
                route = %route.name,
                cache_status = ?cache_status,
                status = resp.status,
                "request dispatched"
            );
            return Ok(ProxiedResponse {
                status: resp.status,
                content_type: resp.content_type,
                body: resp.body,
                cache_status,
            });
        }

        let resp = call_backend(
            self.transport.clone(),
            breaker,
            route.clone(),
            request.clone(),
            self.retryable_statuses.clone(),
        )
        .await?;

        // Writes through this route invalidate its configured dependents.
        if !route.cache_policy.method_is_cacheable(&request.method) {
            for pattern in &route.cache_policy.invalidate_patterns {
                let removed = self.cache.invalidate_pattern(pattern).await;
                debug!(route = %route.name, pattern = %pattern, removed, "write-triggered invalidation");
            }
        }

        debug!(route = %route.name, status = resp.status, "request dispatched uncached");
        Ok(ProxiedResponse {
            status: resp.status,
            content_type: resp.content_type,
            body: resp.body,
            cache_status: CacheStatus::Bypass,
        })
    }

    /// Circuit breaker metrics for every backend seen so far.
    pub fn breaker_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        self.breakers.metrics()
    }
}

/// Circuit-gated backend call with bounded retry.
///
/// A breaker rejection aborts immediately, even mid-loop: once the circuit
/// opens there is no point burning the remaining attempts. The per-attempt
/// timeout is enforced here as well as by the transport, so a misbehaving
/// transport cannot hang the loop.
async fn call_backend<T: BackendTransport>(
    transport: Arc<T>,
    breaker: Arc<CircuitBreaker>,
    route: RouteConfig,
    request: GatewayRequest,
    retryable_statuses: Vec<u16>,
) -> Result<FetchedResponse> {
    let backend = route.backend_url.clone();
    let max_attempts = route.retry_policy.max_attempts;
    let mut last_status: Option<u16> = None;
    let mut last_was_timeout = false;

    for attempt in 1..=max_attempts {
        // The permit holds any half-open probe slot for the duration of the
        // attempt; if this future is cancelled mid-call, dropping it gives
        // the slot back instead of wedging the breaker.
        let permit = match breaker.allow_request() {
            Some(permit) => permit,
            None => {
                return Err(GatewayError::CircuitOpen {
                    backend,
                    retry_after: breaker.retry_after(),
                })
            }
        };

        let backend_request = BackendRequest::from_parts(&route, &request);
        let outcome = match tokio::time::timeout(route.timeout(), transport.call(backend_request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(route.timeout())),
        };

        match outcome {
            Ok(resp) => match classify_status(resp.status, &retryable_statuses) {
                None => {
                    permit.record_success();
                    return Ok(FetchedResponse {
                        status: resp.status,
                        content_type: resp.content_type(),
                        body: resp.body,
                    });
                }
                Some(FailureKind::Retryable) => {
                    permit.record_failure();
                    warn!(backend = %backend, attempt, status = resp.status, "retryable backend failure");
                    last_status = Some(resp.status);
                    last_was_timeout = false;
                }
                Some(FailureKind::Fatal) => {
                    permit.record_failure();
                    warn!(backend = %backend, attempt, status = resp.status, "non-retryable backend failure");
                    return Err(GatewayError::BackendExhausted {
                        backend,
                        attempts: attempt,
                        last_status: Some(resp.status),
                    });
                }
            },
            Err(TransportError::Timeout(t)) => {
                permit.record_failure();
                warn!(backend = %backend, attempt, timeout_ms = t.as_millis() as u64, "backend call timed out");
                last_was_timeout = true;
            }
            Err(TransportError::Network(e)) => {
                permit.record_failure();
                warn!(backend = %backend, attempt, error = %e, "backend network error");
                last_status = None;
                last_was_timeout = false;
            }
        }

        if attempt < max_attempts {
            let delay = backoff::delay_for_attempt(&route.retry_policy, attempt);
            debug!(backend = %backend, attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    if last_was_timeout {
        Err(GatewayError::BackendTimeout {
            backend,
            attempts: max_attempts,
        })
    } else {
        Err(GatewayError::BackendExhausted {
            backend,
            attempts: max_attempts,
            last_status,
        })
    }
}
