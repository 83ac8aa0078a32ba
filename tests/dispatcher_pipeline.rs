//! End-to-end pipeline tests: rate limiting, circuit breaking and cache
//! stampede behavior observed through the public dispatcher surface only.

use async_trait::async_trait;
use gateway_core::config::GatewayConfig;
use gateway_core::dispatch::{BackendRequest, BackendResponse, BackendTransport, TransportError};
use gateway_core::limiter::{RateLimitRule, RateLimitSettings};
use gateway_core::resilience::{CircuitBreakerConfig, CircuitBreakerSettings};
use gateway_core::routing::{CachePolicy, PathType, RouteConfig};
use gateway_core::types::{CacheStatus, GatewayRequest, Identity};
use gateway_core::{Dispatcher, GatewayError, ManualClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts calls and answers with a fixed status per call, cycling the last
/// entry forever.
struct CountingTransport {
    statuses: Vec<u16>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl CountingTransport {
    fn always(status: u16) -> Self {
        Self {
            statuses: vec![status],
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    fn sequence(statuses: Vec<u16>) -> Self {
        Self {
            statuses,
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    fn slow(status: u16, delay: Duration) -> Self {
        Self {
            statuses: vec![status],
            calls: AtomicU32::new(0),
            delay: Some(delay),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendTransport for CountingTransport {
    async fn call(&self, _request: BackendRequest) -> Result<BackendResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let status = *self
            .statuses
            .get(n)
            .unwrap_or_else(|| self.statuses.last().unwrap());
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        Ok(BackendResponse {
            status,
            headers,
            body: format!("call-{n}").into_bytes(),
        })
    }
}

fn api_route() -> RouteConfig {
    let mut route = RouteConfig::for_tests("http://orders.internal");
    route.name = "orders".to_string();
    route.path_pattern = "/orders".to_string();
    route.path_type = PathType::Prefix;
    route.retry_policy.max_attempts = 1;
    route.retry_policy.base_delay_ms = 1;
    route.retry_policy.max_delay_ms = 2;
    route
}

fn config(routes: Vec<RouteConfig>) -> GatewayConfig {
    GatewayConfig {
        routes,
        ..GatewayConfig::default()
    }
}

fn request(path: &str) -> GatewayRequest {
    GatewayRequest::new("GET", path, Identity::ApiKey("tenant-a".into()))
}

#[tokio::test]
async fn bursty_caller_is_throttled_with_accurate_retry_after() {
    let mut cfg = config(vec![api_route()]);
    cfg.rate_limit = RateLimitSettings {
        default: RateLimitRule {
            limit: 2.0,
            window_seconds: 60.0,
            burst: 0.0,
            cost: 1.0,
        },
        overrides: vec![],
    };
    let transport = Arc::new(CountingTransport::always(200));
    let clock = Arc::new(ManualClock::new());
    let dispatcher =
        Dispatcher::from_config_with_clock(cfg, transport.clone(), clock.clone()).unwrap();

    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());
    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());

    let err = dispatcher.dispatch(request("/orders")).await.unwrap_err();
    let retry_after = match err {
        GatewayError::RateLimited { retry_after, .. } => retry_after,
        other => panic!("expected RateLimited, got {other:?}"),
    };
    // 2 per 60s refills one token every 30 seconds.
    assert!((retry_after.as_secs_f64() - 30.0).abs() < 0.5);
    assert_eq!(transport.calls(), 2);

    // After one refill interval a single request is admitted again.
    clock.advance(Duration::from_secs(31));
    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());
    assert!(dispatcher.dispatch(request("/orders")).await.is_err());
}

#[tokio::test]
async fn distinct_identities_do_not_share_buckets() {
    let mut cfg = config(vec![api_route()]);
    cfg.rate_limit.default = RateLimitRule {
        limit: 1.0,
        window_seconds: 60.0,
        burst: 0.0,
        cost: 1.0,
    };
    let transport = Arc::new(CountingTransport::always(200));
    let dispatcher = Dispatcher::from_config(cfg, transport).unwrap();

    let a = GatewayRequest::new("GET", "/orders", Identity::ApiKey("a".into()));
    let b = GatewayRequest::new("GET", "/orders", Identity::AnonymousIp("10.0.0.9".into()));
    assert!(dispatcher.dispatch(a.clone()).await.is_ok());
    assert!(dispatcher.dispatch(b).await.is_ok());
    assert!(dispatcher.dispatch(a).await.is_err());
}

#[tokio::test]
async fn failing_backend_opens_the_circuit_and_fails_fast() {
    let mut cfg = config(vec![api_route()]);
    cfg.circuit_breakers = CircuitBreakerSettings {
        default: CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout_seconds: 60,
            half_open_required: 1,
            half_open_max_concurrent: 1,
        },
        backends: HashMap::new(),
    };
    let transport = Arc::new(CountingTransport::always(500));
    let clock = Arc::new(ManualClock::new());
    let dispatcher =
        Dispatcher::from_config_with_clock(cfg, transport.clone(), clock.clone()).unwrap();

    for _ in 0..3 {
        let err = dispatcher.dispatch(request("/orders")).await.unwrap_err();
        assert!(matches!(err, GatewayError::BackendExhausted { .. }));
    }
    assert_eq!(transport.calls(), 3);

    // Threshold reached: the next request never touches the backend.
    let err = dispatcher.dispatch(request("/orders")).await.unwrap_err();
    match &err {
        GatewayError::CircuitOpen { retry_after, .. } => {
            assert_eq!(*retry_after, Duration::from_secs(60));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(err.status_code(), 503);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn recovered_backend_closes_the_circuit_again() {
    let mut cfg = config(vec![api_route()]);
    cfg.circuit_breakers.default = CircuitBreakerConfig {
        failure_threshold: 1,
        recovery_timeout_seconds: 30,
        half_open_required: 2,
        half_open_max_concurrent: 1,
    };
    // One failure, then healthy forever.
    let transport = Arc::new(CountingTransport::sequence(vec![500, 200]));
    let clock = Arc::new(ManualClock::new());
    let dispatcher =
        Dispatcher::from_config_with_clock(cfg, transport.clone(), clock.clone()).unwrap();

    let _ = dispatcher.dispatch(request("/orders")).await.unwrap_err();
    assert!(matches!(
        dispatcher.dispatch(request("/orders")).await.unwrap_err(),
        GatewayError::CircuitOpen { .. }
    ));

    clock.advance(Duration::from_secs(30));
    // Two successful probes are required before the circuit fully closes.
    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());
    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());
    assert!(dispatcher.dispatch(request("/orders")).await.is_ok());
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn concurrent_misses_collapse_into_one_backend_fetch() {
    let mut route = api_route();
    route.cache_policy = CachePolicy {
        enabled: true,
        ttl_seconds: 60,
        ..CachePolicy::default()
    };
    let cfg = config(vec![route]);
    let transport = Arc::new(CountingTransport::slow(200, Duration::from_millis(30)));
    let dispatcher = Arc::new(Dispatcher::from_config(cfg, transport.clone()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let d = dispatcher.clone();
        handles.push(tokio::spawn(async move { d.dispatch(request("/orders")).await }));
    }

    for handle in handles {
        let resp = handle.await.unwrap().unwrap();
        assert_eq!(resp.body, b"call-0");
    }
    assert_eq!(transport.calls(), 1);

    // A request arriving after the fetch resolves sees a stored entry.
    let resp = dispatcher.dispatch(request("/orders")).await.unwrap();
    assert_eq!(resp.cache_status, CacheStatus::Hit);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn vary_by_query_keys_distinct_entries() {
    let mut route = api_route();
    route.cache_policy.enabled = true;
    route.cache_policy.ttl_seconds = 60;
    let cfg = config(vec![route]);
    let transport = Arc::new(CountingTransport::always(200));
    let dispatcher = Dispatcher::from_config(cfg, transport.clone()).unwrap();

    let page1 = request("/orders").with_query("page", "1");
    let page2 = request("/orders").with_query("page", "2");

    assert_eq!(
        dispatcher.dispatch(page1.clone()).await.unwrap().cache_status,
        CacheStatus::Miss
    );
    assert_eq!(
        dispatcher.dispatch(page2).await.unwrap().cache_status,
        CacheStatus::Miss
    );
    assert_eq!(
        dispatcher.dispatch(page1).await.unwrap().cache_status,
        CacheStatus::Hit
    );
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn disabled_cache_always_passes_through() {
    let mut route = api_route();
    route.cache_policy.enabled = true;
    route.cache_policy.ttl_seconds = 60;
    let mut cfg = config(vec![route]);
    cfg.cache.enabled = false;
    let transport = Arc::new(CountingTransport::always(200));
    let dispatcher = Dispatcher::from_config(cfg, transport.clone()).unwrap();

    for _ in 0..3 {
        let resp = dispatcher.dispatch(request("/orders")).await.unwrap();
        assert_eq!(resp.cache_status, CacheStatus::Miss);
    }
    assert_eq!(transport.calls(), 3);
}
