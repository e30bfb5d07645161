//! Geometry Index - Spatial Index for Georeferenced Documents
//!
//! This library maps integer document ids to geometric shapes and answers
//! bounding-box range queries refined by exact geometric predicates (intersects,
//! within, contains, touches, crosses, overlaps, equals).
//!
//! # Architecture
//!
//! - **[`BoundsStore`]**: R-tree over document bounding boxes, the coarse prefilter
//! - **[`GeometryIndex`]**: Forward map (id → WKT) plus the bounds store; owns the
//!   index/reindex/remove lifecycle and the two-phase query
//! - **[`Predicate`]**: Closed set of DE-9IM predicates used for refinement
//! - **[`GeometryProvider`]**: Capability through which objects expose a geometry
//! - **[`SharedGeometryIndex`]**: Reader/writer handle for concurrent hosts
//!
//! # Performance Characteristics
//!
//! - **Index/Remove**: O(log N) amortized bounds-store update plus one WKT parse
//! - **Query Time**: O(log N + K) prefilter, then one relate per candidate K
//! - **Memory**: O(N) WKT strings + O(N) boxes

mod bounds;
mod config;
pub mod geometry;
mod index;
pub mod loader;
mod predicate;
mod shared;

// Public API exports
pub use bounds::{BoundsStore, DEFAULT_MAX_NODE_ENTRIES};
pub use config::IndexConfig;
pub use geometry::{GeometryProvider, NoGeometry, PreparedGeometry};
pub use index::{GeometryIndex, QueryRequest, parse_bbox};
pub use predicate::Predicate;
pub use shared::SharedGeometryIndex;

/// Opaque identifier of an indexed document
pub type DocumentId = u64;

/// Error types for the geometry index
///
/// Request-validation errors are distinguishable by kind so callers can answer
/// "bad request" and "not implemented" differently.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Operator not valid: {0}")]
    InvalidOperator(String),

    #[error("Operator {0} not supported yet")]
    UnsupportedOperator(Predicate),

    #[error("Query request carries no bounding box")]
    MissingQuery,

    #[error("WKT parsing error: {0}")]
    WktParse(String),

    #[error("Malformed document at line {line}: {reason}")]
    MalformedDocument { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether the error rejects the caller's request as invalid
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            IndexError::MalformedQuery(_) | IndexError::InvalidOperator(_) | IndexError::MissingQuery
        )
    }

    /// Whether the request is valid but asks for something not implemented
    pub fn is_not_supported(&self) -> bool {
        matches!(self, IndexError::UnsupportedOperator(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
