//! Geometry extraction, WKT serialization and envelopes
//!
//! The index stores geometries as canonical WKT strings. This module is the single
//! place where geometries are parsed, serialized and reduced to bounding boxes, and
//! it defines the capability through which indexable objects hand their geometry to
//! the index.

use crate::{IndexError, Result};
use geo::{BoundingRect, Coord, Geometry, LineString, Point, Rect};
use wkt::{ToWkt, TryFromWkt};

/// Why an object produced no indexable geometry
///
/// Any of these outcomes makes the index treat the object as "not indexed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoGeometry {
    /// The object does not provide a georeference
    #[error("object provides no geometry")]
    Declined,
    /// The geometry exists but has no coordinates (e.g. `MULTIPOINT EMPTY`)
    #[error("geometry is empty")]
    Empty,
    /// The geometry could not be parsed
    #[error("malformed geometry: {0}")]
    Malformed(String),
}

/// Capability of an object to provide its georeference
///
/// Implemented for geometries, WKT strings and optional providers. Host objects
/// implement it to expose whatever geometry they carry.
pub trait GeometryProvider {
    /// Return the object's geometry, or the reason there is none
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry>;
}

impl GeometryProvider for Geometry<f64> {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        Ok(self.clone())
    }
}

impl GeometryProvider for Point<f64> {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        Ok(Geometry::Point(*self))
    }
}

impl GeometryProvider for str {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            return Err(NoGeometry::Declined);
        }
        parse_wkt(trimmed).map_err(|e| NoGeometry::Malformed(e.to_string()))
    }
}

impl GeometryProvider for String {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        self.as_str().geometry()
    }
}

impl<T: GeometryProvider + ?Sized> GeometryProvider for &T {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        (**self).geometry()
    }
}

impl<T: GeometryProvider> GeometryProvider for Option<T> {
    fn geometry(&self) -> std::result::Result<Geometry<f64>, NoGeometry> {
        match self {
            Some(inner) => inner.geometry(),
            None => Err(NoGeometry::Declined),
        }
    }
}

/// A geometry ready to be stored: canonical WKT plus its envelope
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedGeometry {
    /// Canonical WKT serialization (the forward map value)
    pub wkt: String,
    /// Envelope of the geometry (the bounds store key)
    pub bounds: Rect<f64>,
}

impl PreparedGeometry {
    /// Extract, serialize and bound the geometry offered by `provider`
    pub fn from_provider<P: GeometryProvider + ?Sized>(
        provider: &P,
    ) -> std::result::Result<Self, NoGeometry> {
        let geometry = provider.geometry()?;
        let bounds = envelope(&geometry).ok_or(NoGeometry::Empty)?;
        Ok(Self {
            wkt: geometry.wkt_string(),
            bounds,
        })
    }
}

/// Parse a WKT string into a geometry
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(wkt).map_err(|e| IndexError::WktParse(format!("{e:?}")))
}

/// Canonical WKT serialization of a geometry
#[inline]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Axis-aligned envelope of a geometry, `None` for empty geometries
///
/// A point yields a degenerate box with `min == max`.
#[inline]
pub fn envelope(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    let bounds = geometry.bounding_rect()?;
    let finite = [bounds.min(), bounds.max()]
        .iter()
        .all(|c| c.x.is_finite() && c.y.is_finite());
    finite.then_some(bounds)
}

/// Envelope of the stored WKT of a document
pub fn envelope_of_wkt(wkt: &str) -> Result<Rect<f64>> {
    let geometry = parse_wkt(wkt)?;
    envelope(&geometry).ok_or_else(|| IndexError::WktParse(format!("empty geometry: {wkt}")))
}

/// Geometry of the envelope spanned by two corner points
///
/// Mirrors how an envelope is materialized as a geometry: a point when both
/// corners coincide, a line when the box is flat along one axis, a polygon
/// otherwise. Predicates are evaluated against this geometry.
pub fn corner_envelope(first: Coord<f64>, second: Coord<f64>) -> Geometry<f64> {
    let rect = Rect::new(first, second);
    let (min, max) = (rect.min(), rect.max());

    if min == max {
        Geometry::Point(Point::from(min))
    } else if min.x == max.x || min.y == max.y {
        Geometry::LineString(LineString::from(vec![min, max]))
    } else {
        Geometry::Polygon(rect.to_polygon())
    }
}
