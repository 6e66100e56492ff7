//! Query Gateway HTTP Service
//!
//! Exposes the admission pipeline and a pluggable query engine over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api` - Admit and execute a query
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_admission};
pub use routes::{create_router, AppState, ErrorResponse, QueryRequest, QueryResponse};
pub use state::ServiceState;
