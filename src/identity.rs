//! Bearer-credential verification and identity claims.
//!
//! ## Purpose
//!
//! Given the raw authorization header of a request, produce either verified
//! [`Claims`] or an explicit absence - never a partially trusted state.
//!
//! ## Contract
//!
//! - Absent or blank header → `Ok(None)` (anonymous is a valid outcome for
//!   the caller to decide on, not an error)
//! - `"Bearer "` scheme prefix stripped from the start, case-sensitively
//! - Any verification failure (malformed token, bad signature, expired,
//!   wrong algorithm) → [`IdentityError::InvalidCredential`], with the cause
//!   deliberately indistinguishable
//!
//! ## Verification Cache
//!
//! Verification is synchronous CPU work (signature check). For
//! high-throughput deployments the resolver can cache decoded claims in an
//! LRU keyed by a hash of the raw token. A cache hit re-checks expiry
//! against current time, so a cached credential can never outlive its `exp`.
//! Only successful verifications are cached; the cache changes latency,
//! never outcomes.

use std::num::NonZeroUsize;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::BEARER_PREFIX;

/// Error raised when a non-empty credential fails verification.
///
/// A single kind by design: callers must not distinguish a bad signature
/// from an expired token or a malformed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The supplied credential could not be verified.
    #[error("invalid credential")]
    InvalidCredential,
}

/// Verified, decoded payload of a credential.
///
/// Produced only by successful verification inside [`IdentityResolver`];
/// never constructed by hand elsewhere. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    pub sub: String,
    /// Issued-at, seconds since the Unix epoch.
    #[serde(default)]
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch. Required: a credential without
    /// an expiry never verifies.
    pub exp: i64,
    /// Application-defined claims, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Configuration for the claims verification cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}

/// Cache key: xxh64 over the raw token bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TokenKey(u64);

impl TokenKey {
    fn compute(token: &str) -> Self {
        Self(xxh64(token.as_bytes(), 0))
    }
}

/// Resolves an optional authorization header into verified claims.
///
/// Pure apart from cryptographic computation; no I/O. Thread-safe and
/// suitable for unsynchronized concurrent use across requests. The
/// verification key is fixed at construction and never mutated.
pub struct IdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
    cache: Option<Arc<RwLock<LruCache<TokenKey, Claims>>>>,
}

impl IdentityResolver {
    /// Create a resolver verifying HS256 signatures with a shared secret.
    pub fn hs256(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// Create a resolver verifying RS256 signatures with a PEM public key.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the PEM does not parse.
    pub fn rs256_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::with_key(
            DecodingKey::from_rsa_pem(pem)?,
            Algorithm::RS256,
        ))
    }

    fn with_key(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Expiry is checked against current time, with no grace window.
        validation.leeway = 0;

        Self {
            decoding_key,
            validation,
            cache: None,
        }
    }

    /// Enable the claims verification cache.
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(Arc::new(RwLock::new(LruCache::new(size))))
        } else {
            None
        };
        self
    }

    /// Resolve an optional raw authorization header to an identity.
    ///
    /// Returns `Ok(None)` for an absent or blank header, `Ok(Some(claims))`
    /// for a verified credential.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidCredential`] when a non-empty credential
    /// fails signature or expiry verification, whatever the cause.
    pub fn resolve(&self, header: Option<&str>) -> Result<Option<Claims>, IdentityError> {
        let Some(raw) = header else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
        self.verify(token).map(Some)
    }

    /// Get cache statistics. Returns `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, IdentityError> {
        let key = TokenKey::compute(token);

        if let Some(cache) = &self.cache {
            if let Some(claims) = cache.read().peek(&key).cloned() {
                // The cached signature check still holds; expiry may not.
                if claims.exp <= chrono::Utc::now().timestamp() {
                    return Err(IdentityError::InvalidCredential);
                }
                return Ok(claims);
            }
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "credential verification failed");
                IdentityError::InvalidCredential
            })?;

        if let Some(cache) = &self.cache {
            cache.write().put(key, data.claims.clone());
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test_gateway_secret_32_bytes_min";

    fn token_with(secret: &[u8], sub: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "sub": sub,
            "iat": now,
            "exp": now + exp_offset,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
            .unwrap_or_else(|e| panic!("failed to sign test token: {e}"))
    }

    #[test]
    fn test_absent_header_is_anonymous() {
        let resolver = IdentityResolver::hs256(SECRET);
        assert_eq!(resolver.resolve(None).unwrap(), None);
    }

    #[test]
    fn test_blank_header_is_anonymous() {
        let resolver = IdentityResolver::hs256(SECRET);
        assert_eq!(resolver.resolve(Some("")).unwrap(), None);
        assert_eq!(resolver.resolve(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_valid_credential_roundtrips_claims() {
        let resolver = IdentityResolver::hs256(SECRET);
        let token = token_with(SECRET, "u1", 3600);

        let claims = resolver
            .resolve(Some(&format!("Bearer {token}")))
            .unwrap()
            .unwrap();
        assert_eq!(claims.sub, "u1");
        assert!(claims.exp > chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_bare_token_without_scheme_accepted() {
        let resolver = IdentityResolver::hs256(SECRET);
        let token = token_with(SECRET, "u1", 3600);

        let claims = resolver.resolve(Some(&token)).unwrap().unwrap();
        assert_eq!(claims.sub, "u1");
    }

    #[test]
    fn test_lowercase_scheme_is_not_stripped() {
        // The prefix is an exact, case-sensitive literal; "bearer <tok>"
        // verifies as one opaque (invalid) token.
        let resolver = IdentityResolver::hs256(SECRET);
        let token = token_with(SECRET, "u1", 3600);

        let result = resolver.resolve(Some(&format!("bearer {token}")));
        assert_eq!(result.unwrap_err(), IdentityError::InvalidCredential);
    }

    #[test]
    fn test_scheme_with_empty_token_is_invalid() {
        // A non-empty header whose token part is empty is not anonymous.
        let resolver = IdentityResolver::hs256(SECRET);
        let result = resolver.resolve(Some("Bearer "));
        assert_eq!(result.unwrap_err(), IdentityError::InvalidCredential);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let resolver = IdentityResolver::hs256(SECRET);
        let token = token_with(b"a_completely_different_secret!!!", "u1", 3600);

        let result = resolver.resolve(Some(&format!("Bearer {token}")));
        assert_eq!(result.unwrap_err(), IdentityError::InvalidCredential);
    }

    #[test]
    fn test_expired_credential_rejected() {
        // Valid signature, expiry in the past: same error kind as a bad
        // signature.
        let resolver = IdentityResolver::hs256(SECRET);
        let token = token_with(SECRET, "u1", -3600);

        let result = resolver.resolve(Some(&format!("Bearer {token}")));
        assert_eq!(result.unwrap_err(), IdentityError::InvalidCredential);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let resolver = IdentityResolver::hs256(SECRET);
        let result = resolver.resolve(Some("Bearer not.a.token"));
        assert_eq!(result.unwrap_err(), IdentityError::InvalidCredential);
    }

    #[test]
    fn test_verification_is_idempotent() {
        let resolver = IdentityResolver::hs256(SECRET);
        let header = format!("Bearer {}", token_with(SECRET, "u1", 3600));

        let first = resolver.resolve(Some(&header)).unwrap().unwrap();
        let second = resolver.resolve(Some(&header)).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extra_claims_pass_through() {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "sub": "u1",
            "iat": now,
            "exp": now + 3600,
            "role": "editor",
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap_or_else(|e| panic!("failed to sign test token: {e}"));

        let resolver = IdentityResolver::hs256(SECRET);
        let resolved = resolver.resolve(Some(&token)).unwrap().unwrap();
        assert_eq!(resolved.extra.get("role"), Some(&json!("editor")));
    }

    #[test]
    fn test_cache_populates_on_success() {
        let resolver = IdentityResolver::hs256(SECRET).with_cache(CacheConfig::default());
        let header = format!("Bearer {}", token_with(SECRET, "u1", 3600));

        assert_eq!(resolver.cache_stats().map(|s| s.len), Some(0));
        resolver.resolve(Some(&header)).unwrap();
        assert_eq!(resolver.cache_stats().map(|s| s.len), Some(1));

        // Hit: identical claims.
        let cached = resolver.resolve(Some(&header)).unwrap().unwrap();
        assert_eq!(cached.sub, "u1");
        assert_eq!(resolver.cache_stats().map(|s| s.len), Some(1));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let resolver = IdentityResolver::hs256(SECRET).with_cache(CacheConfig::default());
        let header = format!("Bearer {}", token_with(SECRET, "u1", -3600));

        assert!(resolver.resolve(Some(&header)).is_err());
        assert_eq!(resolver.cache_stats().map(|s| s.len), Some(0));

        assert!(resolver.resolve(Some(&header)).is_err());
    }

    #[test]
    fn test_cache_disabled() {
        let config = CacheConfig {
            max_entries: 100,
            enabled: false,
        };
        let resolver = IdentityResolver::hs256(SECRET).with_cache(config);
        assert!(resolver.cache_stats().is_none());

        let header = format!("Bearer {}", token_with(SECRET, "u1", 3600));
        assert!(resolver.resolve(Some(&header)).is_ok());
    }

    #[test]
    fn test_custom_cache_capacity() {
        let config = CacheConfig {
            max_entries: 5,
            enabled: true,
        };
        let resolver = IdentityResolver::hs256(SECRET).with_cache(config);
        assert_eq!(resolver.cache_stats().map(|s| s.cap), Some(5));
    }
}
