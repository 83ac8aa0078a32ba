//! Rate-limit configuration: a default rule plus targeted overrides.

use serde::{Deserialize, Serialize};

/// A single token-bucket rule.
///
/// The bucket derived from a rule has `capacity = limit + burst` and
/// `refill_rate = limit / window_seconds` tokens per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Sustained requests allowed per window.
    pub limit: f64,
    /// Window length in seconds.
    pub window_seconds: f64,
    /// Extra burst headroom above the sustained limit.
    #[serde(default)]
    pub burst: f64,
    /// Tokens consumed per admitted request.
    #[serde(default = "default_cost")]
    pub cost: f64,
}

fn default_cost() -> f64 {
    1.0
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            limit: 100.0,
            window_seconds: 60.0,
            burst: 0.0,
            cost: 1.0,
        }
    }
}

impl RateLimitRule {
    pub fn capacity(&self) -> f64 {
        self.limit + self.burst
    }

    pub fn refill_rate(&self) -> f64 {
        self.limit / self.window_seconds
    }
}

/// Override targeting. Unset fields match anything; the override with the
/// most matched fields wins, ties going to declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitOverride {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(flatten)]
    pub rule: RateLimitRule,
}

impl RateLimitOverride {
    /// Specificity score when this override matches, `None` otherwise.
    fn match_score(&self, route: Option<&str>, method: &str, path: &str) -> Option<u32> {
        let mut score = 0;
        if let Some(ref want) = self.route {
            if route != Some(want.as_str()) {
                return None;
            }
            score += 1;
        }
        if let Some(ref want) = self.method {
            if !want.eq_ignore_ascii_case(method) {
                return None;
            }
            score += 1;
        }
        if let Some(ref prefix) = self.path_prefix {
            if !path.starts_with(prefix.as_str()) {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

/// The limiter's full configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub default: RateLimitRule,
    #[serde(default)]
    pub overrides: Vec<RateLimitOverride>,
}

impl RateLimitSettings {
    /// Resolve the effective rule for a request. Most specific match wins;
    /// the default applies when no override matches.
    pub fn resolve(&self, route: Option<&str>, method: &str, path: &str) -> &RateLimitRule {
        let mut best: Option<(u32, &RateLimitRule)> = None;
        for ovr in &self.overrides {
            if let Some(score) = ovr.match_score(route, method, path) {
                match best {
                    Some((best_score, _)) if best_score >= score => {}
                    _ => best = Some((score, &ovr.rule)),
                }
            }
        }
        best.map_or(&self.default, |(_, rule)| rule)
    }

    /// Reject impossible rules at load time. A cost above capacity would make
    /// every request for that rule unsatisfiable forever.
    pub fn validate(&self) -> Result<(), String> {
        self.default.validate_rule("default")?;
        for (i, ovr) in self.overrides.iter().enumerate() {
            ovr.rule.validate_rule(&format!("override #{i}"))?;
        }
        Ok(())
    }
}

impl RateLimitRule {
    fn validate_rule(&self, label: &str) -> Result<(), String> {
        if self.limit <= 0.0 {
            return Err(format!("rate limit rule {label}: limit must be positive"));
        }
        if self.window_seconds <= 0.0 {
            return Err(format!("rate limit rule {label}: window must be positive"));
        }
        if self.burst < 0.0 {
            return Err(format!("rate limit rule {label}: burst must not be negative"));
        }
        if self.cost <= 0.0 {
            return Err(format!("rate limit rule {label}: cost must be positive"));
        }
        if self.cost > self.capacity() {
            return Err(format!(
                "rate limit rule {label}: cost {} exceeds capacity {}, requests could never be admitted",
                self.cost,
                self.capacity()
            ));
        }
        Ok(())
    }
}
