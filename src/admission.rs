//! The admission pipeline.
//!
//! Ties the stages together in their fixed order: build the request
//! context, parse the query text, run the shape gate. A request that
//! clears all three is admitted and carries everything the engine needs;
//! a request that fails any stage never reaches execution.

use std::sync::Arc;

use crate::context::{ContextBuilder, RequestContext};
use crate::identity::IdentityResolver;
use crate::query::limits::{GateError, QueryGate, QueryLimits, QueryShape};
use crate::query::parser::{parse_document, ParseError};
use crate::query::QueryDocument;

/// A request the pipeline refused to admit.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AdmissionError {
    /// The query text did not parse into a single valid operation.
    #[error("malformed query: {0}")]
    Malformed(#[from] ParseError),
    /// The query parsed but exceeded a shape ceiling.
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl AdmissionError {
    /// Stable machine-readable code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::Malformed(_) => "MALFORMED_QUERY",
            AdmissionError::Gate(gate) => gate.code(),
        }
    }
}

/// An admitted request, ready for execution.
#[derive(Debug)]
pub struct Admission<S> {
    /// The per-request context built for this request.
    pub context: RequestContext<S>,
    /// The parsed document.
    pub document: QueryDocument,
    /// Measured shape of the document.
    pub shape: QueryShape,
}

/// Context builder and shape gate composed into one entry point.
///
/// Identity problems never surface here; a bad credential degrades inside
/// the context builder. Only malformed or oversized queries are refused.
pub struct AdmissionPipeline<S> {
    builder: ContextBuilder<S>,
    gate: QueryGate,
}

impl<S> AdmissionPipeline<S> {
    /// Assemble a pipeline from its startup-time parts.
    pub fn new(store: Arc<S>, resolver: IdentityResolver, limits: QueryLimits) -> Self {
        Self {
            builder: ContextBuilder::new(store, resolver),
            gate: QueryGate::new(limits),
        }
    }

    /// The configured shape ceilings.
    pub fn limits(&self) -> &QueryLimits {
        self.gate.limits()
    }

    /// Run one request through the pipeline.
    ///
    /// The context is built before the query is inspected, so the identity
    /// disposition is observable even for requests that end up refused.
    pub fn admit(
        &self,
        authorization: Option<&str>,
        query: &str,
    ) -> Result<Admission<S>, AdmissionError> {
        let context = self.builder.build(authorization);
        let document = parse_document(query)?;
        let shape = self.gate.check(&document)?;

        tracing::debug!(
            identity = context.identity().as_str(),
            depth = shape.depth,
            complexity = shape.complexity,
            "request admitted"
        );

        Ok(Admission {
            context,
            document,
            shape,
        })
    }
}

impl<S> Clone for AdmissionPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            gate: self.gate.clone(),
        }
    }
}
