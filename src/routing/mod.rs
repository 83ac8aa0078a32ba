//! # Routing Module
//!
//! Resolves an incoming request to a backend route configuration. Routes are
//! evaluated in configured order and the first match wins: declaration order
//! is part of the contract, so a broad PREFIX route declared before a narrow
//! EXACT route shadows it.
//!
//! The route table is immutable after construction; matching is a pure read
//! with no shared mutable state.

pub mod route;

pub use route::{CachePolicy, PathType, RetryPolicy, RouteConfig, VaryFactor};

use regex::Regex;
use tracing::trace;

/// One route with its pre-compiled pattern.
#[derive(Debug)]
struct CompiledRoute {
    config: RouteConfig,
    /// Present only for `PathType::Regex`, anchored at both ends.
    regex: Option<Regex>,
}

impl CompiledRoute {
    fn matches(&self, method: &str, path: &str) -> bool {
        if !self.config.allows_method(method) {
            return false;
        }
        match self.config.path_type {
            PathType::Exact => path == self.config.path_pattern,
            PathType::Prefix => path.starts_with(&self.config.path_pattern),
            PathType::Regex => self
                .regex
                .as_ref()
                .is_some_and(|re| re.is_match(path)),
        }
    }
}

/// Ordered, immutable route table.
#[derive(Debug)]
pub struct RouteMatcher {
    routes: Vec<CompiledRoute>,
}

impl RouteMatcher {
    /// Build the matcher, compiling regex routes. Invalid patterns are
    /// configuration errors surfaced here, never at match time.
    pub fn new(routes: Vec<RouteConfig>) -> Result<Self, String> {
        let mut compiled = Vec::with_capacity(routes.len());
        for config in routes {
            let regex = match config.path_type {
                PathType::Regex => {
                    // Full-match semantics: anchor unless already anchored.
                    let pattern = format!("^(?:{})$", config.path_pattern);
                    let re = Regex::new(&pattern).map_err(|e| {
                        format!("route {}: invalid regex {:?}: {e}", config.name, config.path_pattern)
                    })?;
                    Some(re)
                }
                _ => None,
            };
            compiled.push(CompiledRoute { config, regex });
        }
        Ok(Self { routes: compiled })
    }

    /// First route whose method filter and path pattern both match.
    pub fn match_route(&self, method: &str, path: &str) -> Option<&RouteConfig> {
        for route in &self.routes {
            if route.matches(method, path) {
                trace!(route = %route.config.name, method = %method, path = %path, "route matched");
                return Some(&route.config);
            }
        }
        None
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteConfig> {
        self.routes.iter().map(|r| &r.config)
    }
}
