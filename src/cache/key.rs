//! Deterministic cache key generation.
//!
//! A key is the sha256 digest of the canonicalized method, path and the
//! route's vary-by factors, prefixed with a namespace tag. Identical
//! method/path/varied-factor values always yield the identical key; any
//! difference in a varied factor yields a different key; non-varied factors
//! never influence the key.

use crate::routing::VaryFactor;
use crate::types::GatewayRequest;
use sha2::{Digest, Sha256};

/// Characters a request can never smuggle a factor boundary through.
const FACTOR_DELIMITER: char = '\n';

/// Hex chars of the body digest included when `body` is varied.
const BODY_HASH_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    namespace: String,
}

impl CacheKeyGenerator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Glob matching every key this generator produces.
    pub fn scan_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    /// Compute the cache key for `request` under the route's vary-by list.
    ///
    /// Factor order is fixed: query parameters, then headers, then body. When
    /// the vary-by list names no query parameter, all query parameters
    /// participate in sorted order.
    pub fn generate(&self, request: &GatewayRequest, vary_by: &[VaryFactor]) -> String {
        let mut factors: Vec<String> = Vec::new();
        factors.push(format!("method={}", request.method.to_ascii_uppercase()));
        factors.push(format!("path={}", request.path));

        let varied_queries: Vec<&str> = vary_by
            .iter()
            .filter_map(|f| match f {
                VaryFactor::Query { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();

        if varied_queries.is_empty() {
            // BTreeMap iteration is already sorted by name.
            for (name, value) in &request.query {
                factors.push(format!("query:{name}={value}"));
            }
        } else {
            for name in varied_queries {
                let value = request.query.get(name).map(String::as_str).unwrap_or("");
                factors.push(format!("query:{name}={value}"));
            }
        }

        for factor in vary_by {
            if let VaryFactor::Header { name } = factor {
                let lower = name.to_ascii_lowercase();
                let value = request.header(&lower).unwrap_or("");
                factors.push(format!("header:{lower}={value}"));
            }
        }

        if vary_by.iter().any(|f| matches!(f, VaryFactor::Body)) {
            let digest = Sha256::digest(&request.body);
            let hash = hex::encode(digest);
            factors.push(format!("body={}", &hash[..BODY_HASH_LEN]));
        }

        let mut joined = String::new();
        for (i, factor) in factors.iter().enumerate() {
            if i > 0 {
                joined.push(FACTOR_DELIMITER);
            }
            joined.push_str(factor);
        }

        let digest = Sha256::digest(joined.as_bytes());
        format!("{}:{}", self.namespace, hex::encode(digest))
    }
}
