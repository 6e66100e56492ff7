//! Structural model of a requested query.
//!
//! The gateway never executes a query; it only inspects its shape. The types
//! here are the parsed structural form the safety rules in [`limits`] are
//! evaluated against, recomputed for every request and never cached.

pub mod limits;
pub mod parser;

/// Kind of operation a document requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A read operation.
    Query,
    /// A write operation.
    Mutation,
    /// A streaming operation.
    Subscription,
}

impl OperationKind {
    /// Keyword form of the operation kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

/// A single operation: kind, optional name, and its root selection set.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation kind (anonymous shorthand documents are queries).
    pub kind: OperationKind,
    /// Operation name, if the document names one.
    pub name: Option<String>,
    /// Root selection set.
    pub selection_set: SelectionSet,
}

/// A parsed query document.
///
/// One document per request. Documents with more than one operation are
/// rejected at parse time; the gateway admits exactly one operation per
/// request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    /// The single operation this document requests.
    pub operation: Operation,
}

impl QueryDocument {
    /// Root selection set of the document's operation.
    pub fn root(&self) -> &SelectionSet {
        &self.operation.selection_set
    }
}

/// An ordered set of field selections at one nesting level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    /// Selected fields, in document order. Fields reached through inline
    /// fragments are flattened into the enclosing set.
    pub fields: Vec<Field>,
}

impl SelectionSet {
    /// Whether the set selects no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name as it appears in the schema.
    pub name: String,
    /// Response alias, if one was given.
    pub alias: Option<String>,
    /// Estimated result multiplicity, taken from a paging argument
    /// (`first`, `last`, `limit`) when the document supplies an integer
    /// literal for one. `None` when no estimate is available.
    pub list_size: Option<u64>,
    /// Nested selection set, absent for leaf fields.
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// Create a leaf field with no alias and no multiplicity estimate.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            list_size: None,
            selection_set: None,
        }
    }

    /// The key this field's result would be returned under.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
