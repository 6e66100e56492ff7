//! Query-engine seam.
//!
//! Execution is out of scope for the gateway; an admitted request is handed
//! to whatever implements [`QueryEngine`]. The engines here exist so the
//! service layer and tests have something concrete to hand requests to.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::query::QueryDocument;

/// Error surfaced by query execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Execution failed after admission.
    #[error("query execution failed: {0}")]
    Execution(String),
}

/// Executes an admitted query against a request context.
///
/// The gate runs before this trait is ever invoked; implementations may
/// assume the document is within the configured shape ceilings.
#[async_trait]
pub trait QueryEngine<S: Send + Sync>: Send + Sync {
    /// Execute the document and produce a response value.
    async fn execute(
        &self,
        context: &RequestContext<S>,
        document: &QueryDocument,
    ) -> Result<serde_json::Value, EngineError>;
}

/// Engine that answers every root field with `null`.
///
/// Stands in for a real resolver tree in the service binary's default
/// wiring and in tests that only care about the admission path.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoEngine;

#[async_trait]
impl<S: Send + Sync> QueryEngine<S> for EchoEngine {
    async fn execute(
        &self,
        _context: &RequestContext<S>,
        document: &QueryDocument,
    ) -> Result<serde_json::Value, EngineError> {
        let mut data = serde_json::Map::new();
        for field in &document.root().fields {
            data.insert(field.response_key().to_string(), serde_json::Value::Null);
        }
        Ok(serde_json::Value::Object(data))
    }
}

/// Engine that counts invocations.
///
/// Used by tests asserting that rejected requests never reach execution.
#[derive(Debug, Default)]
pub struct CountingEngine {
    calls: std::sync::atomic::AtomicU64,
}

impl CountingEngine {
    /// Create an engine with a zeroed call counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `execute` has been invoked.
    pub fn calls(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl<S: Send + Sync> QueryEngine<S> for CountingEngine {
    async fn execute(
        &self,
        _context: &RequestContext<S>,
        document: &QueryDocument,
    ) -> Result<serde_json::Value, EngineError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut data = serde_json::Map::new();
        for field in &document.root().fields {
            data.insert(field.response_key().to_string(), serde_json::Value::Null);
        }
        Ok(serde_json::Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::identity::IdentityResolver;
    use crate::query::parser::parse_document;
    use crate::store::InMemoryDataStore;
    use std::sync::Arc;

    fn context() -> RequestContext<InMemoryDataStore> {
        ContextBuilder::new(
            Arc::new(InMemoryDataStore::new()),
            IdentityResolver::hs256(b"test_gateway_secret_32_bytes_min"),
        )
        .build(None)
    }

    #[tokio::test]
    async fn test_echo_engine_answers_root_fields_with_null() {
        let document = parse_document("{ viewer posts }").unwrap();
        let response = EchoEngine.execute(&context(), &document).await.unwrap();

        assert_eq!(
            response,
            serde_json::json!({ "viewer": null, "posts": null })
        );
    }

    #[tokio::test]
    async fn test_echo_engine_honors_aliases() {
        let document = parse_document("{ me: viewer }").unwrap();
        let response = EchoEngine.execute(&context(), &document).await.unwrap();

        assert_eq!(response, serde_json::json!({ "me": null }));
    }

    #[tokio::test]
    async fn test_counting_engine_counts() {
        let engine = CountingEngine::new();
        let document = parse_document("{ viewer }").unwrap();
        let ctx = context();

        assert_eq!(engine.calls(), 0);
        engine.execute(&ctx, &document).await.unwrap();
        engine.execute(&ctx, &document).await.unwrap();
        assert_eq!(engine.calls(), 2);
    }
}
