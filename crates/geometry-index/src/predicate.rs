//! Geometric predicates supported by the query engine
//!
//! Predicates are a closed set. Each one is evaluated from the DE-9IM matrix of the
//! candidate geometry against the query geometry, following the OGC simple-features
//! definitions.

use crate::IndexError;
use geo::dimensions::{Dimensions, HasDimensions};
use geo::relate::IntersectionMatrix;
use geo::{Geometry, Relate};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Named relation between a candidate geometry and the query geometry
///
/// Always read as "candidate *predicate* query": `Within` keeps documents lying
/// inside the query box, `Contains` keeps documents that enclose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Predicate {
    Equals,
    Disjoint,
    Intersects,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
}

impl Predicate {
    /// Every predicate name accepted at the request boundary
    pub const ALL: [Predicate; 8] = [
        Predicate::Equals,
        Predicate::Disjoint,
        Predicate::Intersects,
        Predicate::Touches,
        Predicate::Crosses,
        Predicate::Within,
        Predicate::Contains,
        Predicate::Overlaps,
    ];

    /// Lowercase request name
    pub fn name(self) -> &'static str {
        match self {
            Predicate::Equals => "equals",
            Predicate::Disjoint => "disjoint",
            Predicate::Intersects => "intersects",
            Predicate::Touches => "touches",
            Predicate::Crosses => "crosses",
            Predicate::Within => "within",
            Predicate::Contains => "contains",
            Predicate::Overlaps => "overlaps",
        }
    }

    /// Whether the query engine can answer this predicate
    ///
    /// `Disjoint` documents never overlap the query box, so a bounding-box
    /// prefilter cannot produce them.
    #[inline]
    pub fn is_supported(self) -> bool {
        self != Predicate::Disjoint
    }

    /// Evaluate `candidate <predicate> query`
    pub fn evaluate(self, candidate: &Geometry<f64>, query: &Geometry<f64>) -> bool {
        let matrix = candidate.relate(query);
        match self {
            Predicate::Equals => matrix.is_equal_topo(),
            Predicate::Disjoint => matrix.is_disjoint(),
            Predicate::Intersects => matrix.is_intersects(),
            Predicate::Within => matrix.is_within(),
            Predicate::Contains => matrix.is_contains(),
            Predicate::Touches => touches(&matrix, candidate, query),
            Predicate::Crosses => crosses(&matrix, candidate, query),
            Predicate::Overlaps => overlaps(&matrix, candidate, query),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Predicate {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::ALL
            .into_iter()
            .find(|predicate| predicate.name() == s)
            .ok_or_else(|| IndexError::InvalidOperator(s.to_string()))
    }
}

/// Topological dimension as an integer, -1 for empty geometries
fn rank(geometry: &Geometry<f64>) -> i8 {
    match geometry.dimensions() {
        Dimensions::Empty => -1,
        Dimensions::ZeroDimensional => 0,
        Dimensions::OneDimensional => 1,
        Dimensions::TwoDimensional => 2,
    }
}

#[inline]
fn matches(matrix: &IntersectionMatrix, pattern: &str) -> bool {
    matrix.matches(pattern).unwrap_or(false)
}

fn touches(matrix: &IntersectionMatrix, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    // Points have no boundary, so two puntal geometries can never touch
    if rank(a) == 0 && rank(b) == 0 {
        return false;
    }
    matches(matrix, "FT*******") || matches(matrix, "F**T*****") || matches(matrix, "F***T****")
}

fn crosses(matrix: &IntersectionMatrix, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    match (rank(a), rank(b)) {
        (1, 1) => matches(matrix, "0********"),
        (da, db) if da < 0 || db < 0 => false,
        (da, db) if da < db => matches(matrix, "T*T******"),
        (da, db) if da > db => matches(matrix, "T*****T**"),
        _ => false,
    }
}

fn overlaps(matrix: &IntersectionMatrix, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    match (rank(a), rank(b)) {
        (0, 0) | (2, 2) => matches(matrix, "T*T***T**"),
        (1, 1) => matches(matrix, "1*T***T**"),
        _ => false,
    }
}
