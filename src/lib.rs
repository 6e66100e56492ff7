//! # query-gateway
//!
//! Admission gateway in front of a GraphQL query-execution engine.
//!
//! The gateway answers one question per incoming request:
//!
//! > Who is asking, and is the requested query safe to execute?
//!
//! ## Core Contract
//!
//! 1. Derive a per-request identity from an optional bearer credential
//!    (verified claims, or an explicit absence marker - never a partially
//!    trusted state)
//! 2. Reject queries whose structural depth or weighted complexity exceeds
//!    configured ceilings, before any resolver runs
//! 3. Hand the query engine exactly one request context carrying the
//!    identity and a shared data-store handle
//!
//! ## Architecture
//!
//! ```text
//! Authorization header → IdentityResolver → IdentityDisposition
//!                                                  ↓
//! Query text → parser → QueryDocument → QueryGate → QueryEngine
//!                                                  ↑
//!                           DataStore handle (Arc, threaded per request)
//! ```
//!
//! ## Policy Guarantees
//!
//! - A credential that fails verification degrades to an anonymous context;
//!   the request proceeds and the degradation is observable as
//!   [`IdentityDisposition::RejectedCredential`]
//! - A query rejected by the gate touches no external collaborator: the
//!   engine is never invoked
//! - The verification key and limit configuration are read once at startup
//!   and never mutated

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admission;
pub mod config;
pub mod context;
pub mod engine;
pub mod identity;
pub mod query;
pub mod store;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use admission::{Admission, AdmissionError, AdmissionPipeline};
pub use config::{ConfigError, GatewayConfig, VerificationKey};
pub use context::{ContextBuilder, IdentityDisposition, RequestContext};
pub use engine::{CountingEngine, EchoEngine, EngineError, QueryEngine};
pub use identity::{CacheConfig, CacheStats, Claims, IdentityError, IdentityResolver};
pub use query::limits::{
    FieldWeights, GateError, QueryGate, QueryLimits, QueryShape, DEFAULT_MAX_COMPLEXITY,
    DEFAULT_MAX_DEPTH,
};
pub use query::parser::{parse_document, ParseError};
pub use query::{Field, Operation, OperationKind, QueryDocument, SelectionSet};
pub use store::{DataStore, InMemoryDataStore};

#[cfg(feature = "postgres")]
pub use store::PgDataStore;

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Scheme label stripped from the front of an authorization header before
/// verification. Exact literal, case-sensitive, single space.
pub const BEARER_PREFIX: &str = "Bearer ";
