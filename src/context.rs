//! Per-request context construction.
//!
//! The [`ContextBuilder`] is the orchestrator of the admission pipeline: it
//! invokes the identity resolver and assembles exactly one
//! [`RequestContext`] per request, never failing past its own boundary.
//!
//! ## Degradation Policy
//!
//! A credential that fails verification does not abort context creation:
//! the request proceeds as anonymous, and downstream per-field
//! authorization (outside this crate) decides whether anonymous access is
//! sufficient. The conversion is explicit - the context carries
//! [`IdentityDisposition::RejectedCredential`] rather than silently
//! reporting plain anonymity - and is logged at `warn`.

use std::sync::Arc;

use serde::Serialize;

use crate::identity::{Claims, IdentityError, IdentityResolver};

/// Outcome of identity resolution for one request.
///
/// Either fully verified or explicitly absent; there is no partially
/// trusted state. `RejectedCredential` behaves as anonymous downstream but
/// lets callers and tests observe which path was taken.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityDisposition {
    /// A credential was supplied and verified.
    Verified(Claims),
    /// No credential was supplied.
    Anonymous,
    /// A credential was supplied but failed verification and was degraded
    /// to anonymous.
    RejectedCredential,
}

impl IdentityDisposition {
    /// Verified claims, if this request carries any.
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            IdentityDisposition::Verified(claims) => Some(claims),
            _ => None,
        }
    }

    /// Whether the request carries a verified identity.
    pub fn is_verified(&self) -> bool {
        matches!(self, IdentityDisposition::Verified(_))
    }

    /// Whether a supplied credential was rejected and degraded.
    pub fn was_rejected(&self) -> bool {
        matches!(self, IdentityDisposition::RejectedCredential)
    }

    /// Tag for logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityDisposition::Verified(_) => "verified",
            IdentityDisposition::Anonymous => "anonymous",
            IdentityDisposition::RejectedCredential => "rejected_credential",
        }
    }
}

impl Serialize for IdentityDisposition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The per-request bundle handed to the query engine.
///
/// Combines the shared data-access handle with this request's identity.
/// Created once per request, never persisted, never shared across
/// requests, and carries no mutable cross-request state.
#[derive(Debug)]
pub struct RequestContext<S> {
    store: Arc<S>,
    identity: IdentityDisposition,
}

impl<S> RequestContext<S> {
    /// The shared data-access handle.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// This request's identity.
    pub fn identity(&self) -> &IdentityDisposition {
        &self.identity
    }

    /// Verified claims, if this request carries any.
    pub fn claims(&self) -> Option<&Claims> {
        self.identity.claims()
    }
}

/// Assembles one [`RequestContext`] per request.
///
/// Holds the resolver and the data-store handle, both fixed at startup.
/// The store handle is threaded into every context by reference count -
/// never a globally reachable singleton.
pub struct ContextBuilder<S> {
    resolver: Arc<IdentityResolver>,
    store: Arc<S>,
}

impl<S> ContextBuilder<S> {
    /// Create a builder from the startup-time store handle and resolver.
    pub fn new(store: Arc<S>, resolver: IdentityResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            store,
        }
    }

    /// Build the context for one request from its raw authorization header.
    ///
    /// Always returns exactly one context. A failed verification degrades
    /// to [`IdentityDisposition::RejectedCredential`]; the error never
    /// propagates past this boundary.
    pub fn build(&self, authorization: Option<&str>) -> RequestContext<S> {
        let identity = match self.resolver.resolve(authorization) {
            Ok(Some(claims)) => IdentityDisposition::Verified(claims),
            Ok(None) => IdentityDisposition::Anonymous,
            Err(IdentityError::InvalidCredential) => {
                tracing::warn!("credential failed verification; proceeding as anonymous");
                IdentityDisposition::RejectedCredential
            }
        };

        RequestContext {
            store: Arc::clone(&self.store),
            identity,
        }
    }
}

impl<S> Clone for ContextBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            store: Arc::clone(&self.store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDataStore;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test_gateway_secret_32_bytes_min";

    fn builder() -> ContextBuilder<InMemoryDataStore> {
        ContextBuilder::new(
            Arc::new(InMemoryDataStore::new()),
            IdentityResolver::hs256(SECRET),
        )
    }

    fn signed_token(secret: &[u8], sub: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({ "sub": sub, "iat": now, "exp": now + 3600 });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
            .unwrap_or_else(|e| panic!("failed to sign test token: {e}"))
    }

    #[test]
    fn test_absent_credential_yields_anonymous_context() {
        let ctx = builder().build(None);
        assert_eq!(*ctx.identity(), IdentityDisposition::Anonymous);
        assert!(ctx.claims().is_none());
    }

    #[test]
    fn test_valid_credential_yields_verified_context() {
        let header = format!("Bearer {}", signed_token(SECRET, "u1"));
        let ctx = builder().build(Some(&header));

        assert!(ctx.identity().is_verified());
        assert_eq!(ctx.claims().map(|c| c.sub.as_str()), Some("u1"));
    }

    #[test]
    fn test_bad_credential_degrades_to_anonymous() {
        // Wrong signing key: the context is built anyway, with the
        // degradation observable.
        let header = format!(
            "Bearer {}",
            signed_token(b"not_the_gateway_secret_at_all!!!", "u1")
        );
        let ctx = builder().build(Some(&header));

        assert!(ctx.identity().was_rejected());
        assert!(ctx.claims().is_none());
        assert_eq!(ctx.identity().as_str(), "rejected_credential");
    }

    #[test]
    fn test_contexts_share_the_store_handle() {
        let store = Arc::new(InMemoryDataStore::new());
        let builder = ContextBuilder::new(Arc::clone(&store), IdentityResolver::hs256(SECRET));

        let a = builder.build(None);
        let b = builder.build(None);
        assert!(std::ptr::eq(a.store(), b.store()));
    }

    #[test]
    fn test_disposition_serializes_as_tag() {
        let json = serde_json::to_string(&IdentityDisposition::Anonymous)
            .unwrap_or_else(|e| panic!("serialize failed: {e}"));
        assert_eq!(json, r#""anonymous""#);
    }
}
