//! Query safety rules: structural depth and weighted complexity ceilings.
//!
//! Both rules are pure functions over the parsed document, run before any
//! resolver executes. Either rule failing is sufficient to reject the
//! request; the gate evaluates depth first and surfaces exactly one
//! rejection.
//!
//! ## Depth Convention
//!
//! A root field counts as depth 1, so `{ a { b } }` has depth 2 and a
//! document with six nested selection levels exceeds the default ceiling of
//! 5. Repeating a field at the same level never increases depth.
//!
//! ## Complexity
//!
//! Complexity is the recursive weighted sum over every selected field.
//! Unlisted fields cost [`DEFAULT_FIELD_WEIGHT`]. When a field carries a
//! paging argument with an integer literal, its child cost is multiplied by
//! that estimate; without an estimate children cost their plain weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{QueryDocument, SelectionSet};

/// Default ceiling on query nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default ceiling on the weighted complexity score.
pub const DEFAULT_MAX_COMPLEXITY: u64 = 1000;

/// Weight applied to fields without a configured weight.
pub const DEFAULT_FIELD_WEIGHT: u64 = 1;

/// Error raised when a query's shape violates a configured ceiling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The query nests deeper than the configured ceiling.
    #[error("query depth {depth} exceeds the configured limit of {limit}")]
    QueryTooDeep {
        /// Measured nesting depth.
        depth: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The query's weighted complexity exceeds the configured ceiling.
    #[error("query complexity {cost} exceeds the configured limit of {limit}")]
    QueryTooComplex {
        /// Computed complexity score.
        cost: u64,
        /// Configured ceiling.
        limit: u64,
    },
}

impl GateError {
    /// Machine-readable rejection code.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::QueryTooDeep { .. } => "QUERY_TOO_DEEP",
            GateError::QueryTooComplex { .. } => "QUERY_TOO_COMPLEX",
        }
    }
}

/// Per-field complexity weights.
///
/// Fields not listed cost [`DEFAULT_FIELD_WEIGHT`]. Process-wide, read-only
/// configuration; safe for unsynchronized concurrent reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldWeights {
    weights: BTreeMap<String, u64>,
}

impl FieldWeights {
    /// Create an empty weight table (every field costs the default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weight for one field, builder style.
    pub fn with_weight(mut self, field: impl Into<String>, weight: u64) -> Self {
        self.weights.insert(field.into(), weight);
        self
    }

    /// Weight for a field name.
    pub fn weight_of(&self, field: &str) -> u64 {
        self.weights
            .get(field)
            .copied()
            .unwrap_or(DEFAULT_FIELD_WEIGHT)
    }

    /// Number of explicitly weighted fields.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no field has an explicit weight.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl FromIterator<(String, u64)> for FieldWeights {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

/// Configured ceilings for the safety gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Maximum nesting depth (root field = depth 1).
    pub max_depth: usize,
    /// Maximum weighted complexity score.
    pub max_complexity: u64,
    /// Per-field complexity weights.
    pub field_weights: FieldWeights,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_complexity: DEFAULT_MAX_COMPLEXITY,
            field_weights: FieldWeights::new(),
        }
    }
}

/// Shape of one request's query: the measurements the gate ruled on.
///
/// Derived per request and never cached across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryShape {
    /// Maximum nesting depth of the document.
    pub depth: usize,
    /// Weighted complexity score of the document.
    pub complexity: u64,
}

/// Measure the document's nesting depth and reject it over the ceiling.
///
/// Pure; depends only on the parsed structure.
///
/// # Errors
///
/// [`GateError::QueryTooDeep`] when the measured depth exceeds `max_depth`.
pub fn check_depth(document: &QueryDocument, max_depth: usize) -> Result<usize, GateError> {
    let depth = selection_depth(document.root());
    if depth > max_depth {
        return Err(GateError::QueryTooDeep {
            depth,
            limit: max_depth,
        });
    }
    Ok(depth)
}

/// Score the document's weighted complexity and reject it over the ceiling.
///
/// Pure; depends only on the parsed structure and the weight table.
///
/// # Errors
///
/// [`GateError::QueryTooComplex`] when the score exceeds `max_complexity`.
pub fn check_complexity(
    document: &QueryDocument,
    weights: &FieldWeights,
    max_complexity: u64,
) -> Result<u64, GateError> {
    let cost = selection_cost(document.root(), weights);
    if cost > max_complexity {
        return Err(GateError::QueryTooComplex {
            cost,
            limit: max_complexity,
        });
    }
    Ok(cost)
}

fn selection_depth(set: &SelectionSet) -> usize {
    set.fields
        .iter()
        .map(|field| {
            1 + field
                .selection_set
                .as_ref()
                .map(selection_depth)
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

fn selection_cost(set: &SelectionSet, weights: &FieldWeights) -> u64 {
    set.fields
        .iter()
        .map(|field| {
            let own = weights.weight_of(&field.name);
            let children = field
                .selection_set
                .as_ref()
                .map(|s| selection_cost(s, weights))
                .unwrap_or(0);
            // Saturating arithmetic: an absurd paging argument must reject,
            // not wrap around to a passing score.
            own.saturating_add(field.list_size.unwrap_or(1).saturating_mul(children))
        })
        .fold(0u64, u64::saturating_add)
}

/// The query safety gate: both rules composed sequentially.
///
/// Rejects a request before any business logic executes if its query shape
/// violates the configured ceilings.
#[derive(Debug, Clone, Default)]
pub struct QueryGate {
    limits: QueryLimits,
}

impl QueryGate {
    /// Create a gate with the given limits.
    pub fn new(limits: QueryLimits) -> Self {
        Self { limits }
    }

    /// The configured limits.
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Validate a document against both ceilings.
    ///
    /// Returns the measured [`QueryShape`] on success. Depth is checked
    /// first; exactly one rejection is surfaced per request.
    ///
    /// # Errors
    ///
    /// [`GateError::QueryTooDeep`] or [`GateError::QueryTooComplex`].
    pub fn check(&self, document: &QueryDocument) -> Result<QueryShape, GateError> {
        let depth = check_depth(document, self.limits.max_depth)?;
        let complexity =
            check_complexity(document, &self.limits.field_weights, self.limits.max_complexity)?;

        tracing::debug!(depth, complexity, "query shape within limits");
        Ok(QueryShape { depth, complexity })
    }
}
