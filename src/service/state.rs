//! Shared service state.

use std::sync::Arc;

use crate::admission::AdmissionPipeline;
use crate::engine::QueryEngine;
use crate::identity::IdentityResolver;
use crate::query::limits::QueryLimits;
use crate::store::DataStore;

/// Shared state handed to every route handler.
///
/// Holds the data store, the admission pipeline, and the query engine. All
/// three are fixed at startup; handlers only read from this.
pub struct ServiceState<S: DataStore + 'static> {
    /// The data store, shared with every request context the pipeline
    /// builds.
    pub store: Arc<S>,
    /// The admission pipeline requests pass through before execution.
    pub pipeline: AdmissionPipeline<S>,
    /// The engine admitted requests are handed to.
    pub engine: Arc<dyn QueryEngine<S>>,
}

impl<S: DataStore + 'static> ServiceState<S> {
    /// Create service state from its startup-time parts.
    pub fn new(
        store: Arc<S>,
        resolver: IdentityResolver,
        limits: QueryLimits,
        engine: Arc<dyn QueryEngine<S>>,
    ) -> Self {
        let pipeline = AdmissionPipeline::new(Arc::clone(&store), resolver, limits);
        Self {
            store,
            pipeline,
            engine,
        }
    }
}

impl<S: DataStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pipeline: self.pipeline.clone(),
            engine: Arc::clone(&self.engine),
        }
    }
}
