//! GeometryIndex - Top-level manager for indexed geometries and queries
//!
//! This module owns the forward map (document id → canonical WKT) and the bounds
//! store, keeps the two in lockstep through index/reindex/remove, and answers
//! queries in two phases: a bounding-box prefilter through the R-tree followed by
//! exact predicate refinement of the candidates.

use crate::geometry::{self, GeometryProvider, NoGeometry, PreparedGeometry};
use crate::{BoundsStore, DocumentId, IndexConfig, IndexError, Predicate, Result};

use geo::{Coord, Rect};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// A catalog query against the index
///
/// Mirrors the request record handed over by the host: one or more raw bounding
/// box keys (`"minx,miny,maxx,maxy"`) plus an optional `geometry_operator`.
/// Only the first key is honoured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// Raw bounding box strings
    pub keys: Vec<String>,
    /// Predicate name; `None` selects the configured default
    pub operator: Option<String>,
}

impl QueryRequest {
    /// Create a request for a single bounding box
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            keys: vec![key.into()],
            operator: None,
        }
    }

    /// Set the predicate name
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// Spatial index over document geometries
#[derive(Debug, Clone)]
pub struct GeometryIndex {
    /// Authoritative content: document id → canonical WKT
    forward: HashMap<DocumentId, String>,
    /// Bounding boxes of every document in `forward`
    bounds: BoundsStore,
    /// Configuration settings
    config: IndexConfig,
}

impl Default for GeometryIndex {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeometryIndex {
    /// Create an empty index with the given configuration
    pub fn new(config: IndexConfig) -> Self {
        Self {
            forward: HashMap::new(),
            bounds: BoundsStore::new(config.max_node_entries),
            config,
        }
    }

    /// Index (or reindex) the geometry provided by `object` under `id`
    ///
    /// Objects without a usable geometry are omitted: if `id` was indexed before,
    /// it is removed. Returns whether the stored geometry changed; reindexing an
    /// unchanged geometry and omissions both report `false`.
    pub fn index<P: GeometryProvider + ?Sized>(&mut self, id: DocumentId, object: &P) -> bool {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::index");

        match PreparedGeometry::from_provider(object) {
            Ok(prepared) => self.store(id, prepared),
            Err(reason) => {
                self.omit(id, &reason);
                false
            }
        }
    }

    /// Index many documents, preparing their geometries in parallel
    ///
    /// Geometry extraction, serialization and envelopes are computed on the rayon
    /// pool; the results are applied sequentially in input order. Returns the
    /// number of documents whose stored geometry changed.
    pub fn index_parallel<P: GeometryProvider + Sync>(
        &mut self,
        documents: &[(DocumentId, P)],
    ) -> usize {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::index_parallel");

        let prepared: Vec<(DocumentId, std::result::Result<PreparedGeometry, NoGeometry>)> =
            documents
                .par_iter()
                .map(|(id, object)| (*id, PreparedGeometry::from_provider(object)))
                .collect();

        let mut changed = 0;
        for (id, outcome) in prepared {
            match outcome {
                Ok(geometry) => {
                    if self.store(id, geometry) {
                        changed += 1;
                    }
                }
                Err(reason) => self.omit(id, &reason),
            }
        }

        tracing::debug!(
            "Bulk indexed {} documents into '{}', {} changed",
            documents.len(),
            self.config.name,
            changed
        );
        changed
    }

    /// Remove `id` from the index
    ///
    /// Removing an id that is not indexed is a no-op. Returns whether something
    /// was removed.
    pub fn remove(&mut self, id: DocumentId) -> bool {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::remove");

        let Some(wkt) = self.forward.remove(&id) else {
            return false;
        };
        self.release_bounds(id, &wkt);
        true
    }

    /// Run a query for a raw bounding box string
    ///
    /// `operator` names the predicate; `None` selects the configured default.
    /// Returns the ids whose geometry satisfies `geometry <operator> box`.
    pub fn query(&self, raw_bbox: &str, operator: Option<&str>) -> Result<BTreeSet<DocumentId>> {
        let bbox = parse_bbox(raw_bbox)?;
        let predicate = self.resolve_operator(operator)?;
        self.query_rect(bbox, predicate)
    }

    /// Run a catalog query request
    ///
    /// Only the first key is used; further keys are ignored.
    pub fn apply(&self, request: &QueryRequest) -> Result<BTreeSet<DocumentId>> {
        let key = request.keys.first().ok_or(IndexError::MissingQuery)?;
        if request.keys.len() > 1 {
            tracing::debug!(
                "Query on '{}' carries {} keys, only the first is used",
                self.config.name,
                request.keys.len()
            );
        }
        self.query(key, request.operator.as_deref())
    }

    /// Two-phase query with an already parsed box and predicate
    ///
    /// `Predicate::Disjoint` cannot be answered from a bounding-box prefilter and
    /// is rejected with [`IndexError::UnsupportedOperator`].
    pub fn query_rect(&self, bbox: Rect<f64>, predicate: Predicate) -> Result<BTreeSet<DocumentId>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::query_rect");

        if !predicate.is_supported() {
            return Err(IndexError::UnsupportedOperator(predicate));
        }

        let mut results = BTreeSet::new();

        tracing::debug!("Operator: {}", predicate);

        let candidates = self.bounds.intersection(bbox);
        let query_geometry = geometry::corner_envelope(bbox.min(), bbox.max());

        for id in candidates {
            let Some(wkt) = self.forward.get(&id) else {
                tracing::warn!(
                    "Document {} is in the bounds store of '{}' but not in its forward map",
                    id,
                    self.config.name
                );
                continue;
            };

            let candidate = match geometry::parse_wkt(wkt) {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!("Stored geometry of document {} does not parse: {}", id, e);
                    continue;
                }
            };

            if predicate.evaluate(&candidate, &query_geometry) {
                results.insert(id);
            }
        }

        Ok(results)
    }

    /// Remove every document
    pub fn clear(&mut self) {
        self.forward.clear();
        self.bounds.clear();
    }

    /// Stored WKT of a document, `None` when not indexed
    #[inline]
    pub fn get_geometry(&self, id: DocumentId) -> Option<&str> {
        self.forward.get(&id).map(String::as_str)
    }

    /// Check whether a document is indexed
    #[inline]
    pub fn contains(&self, id: DocumentId) -> bool {
        self.forward.contains_key(&id)
    }

    /// Ids of all indexed documents, in no particular order
    pub fn document_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.forward.keys().copied()
    }

    /// Get number of indexed documents
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Check if the index is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Name of the index
    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Get a reference to the bounds store
    #[inline]
    pub fn bounds_store(&self) -> &BoundsStore {
        &self.bounds
    }

    /// Verify that the forward map and the bounds store describe the same documents
    ///
    /// Returns one message per violation; an empty list means the index is consistent.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.forward.len() != self.bounds.len() {
            problems.push(format!(
                "forward map holds {} documents but bounds store holds {}",
                self.forward.len(),
                self.bounds.len()
            ));
        }

        for (id, wkt) in &self.forward {
            match geometry::envelope_of_wkt(wkt) {
                Ok(bounds) if self.bounds.contains(*id, bounds) => {}
                Ok(_) => problems.push(format!("document {id} has no matching bounding box")),
                Err(e) => problems.push(format!("document {id} stores unparseable WKT: {e}")),
            }
        }

        for (id, _) in self.bounds.iter() {
            if !self.forward.contains_key(&id) {
                problems.push(format!("bounding box of document {id} has no forward entry"));
            }
        }

        problems
    }

    /// Resolve a requested operator name, falling back to the configured default
    fn resolve_operator(&self, operator: Option<&str>) -> Result<Predicate> {
        match operator {
            Some(name) => name.parse::<Predicate>(),
            None => Ok(self.config.default_operator),
        }
    }

    /// Store a prepared geometry, replacing any previous one
    fn store(&mut self, id: DocumentId, prepared: PreparedGeometry) -> bool {
        if let Some(old) = self.forward.get(&id) {
            if *old == prepared.wkt {
                return false;
            }
            let old = old.clone();
            self.release_bounds(id, &old);
        }

        self.bounds.insert(id, prepared.bounds);
        self.forward.insert(id, prepared.wkt);
        true
    }

    /// Apply the omission rule for an object without geometry
    fn omit(&mut self, id: DocumentId, reason: &NoGeometry) {
        tracing::debug!("Document {} omitted from '{}': {}", id, self.config.name, reason);
        self.remove(id);
    }

    /// Delete the bounding box stored for `id` under the envelope of `wkt`
    fn release_bounds(&mut self, id: DocumentId, wkt: &str) {
        match geometry::envelope_of_wkt(wkt) {
            Ok(bounds) => {
                if !self.bounds.delete(id, bounds) {
                    tracing::warn!(
                        "Attempt to unindex document {} with no bounding box in '{}'",
                        id,
                        self.config.name
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Stored geometry of document {} does not parse: {}", id, e);
                // Fall back to locating the entry by id
                let stale = self
                    .bounds
                    .iter()
                    .find(|(entry_id, _)| *entry_id == id)
                    .map(|(_, bounds)| bounds);
                if let Some(bounds) = stale {
                    self.bounds.delete(id, bounds);
                }
            }
        }
    }
}

/// Parse a raw `"minx,miny,maxx,maxy"` bounding box
///
/// Exactly four comma separated finite numbers are required. The corners may be
/// given in any order.
pub fn parse_bbox(raw: &str) -> Result<Rect<f64>> {
    let values = raw
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| IndexError::MalformedQuery(format!("'{token}' is not a number")))
        })
        .collect::<Result<Vec<f64>>>()?;

    let [x1, y1, x2, y2] = values[..] else {
        return Err(IndexError::MalformedQuery(format!(
            "expected 4 coordinates, got {} in '{}'",
            values.len(),
            raw
        )));
    };

    Ok(Rect::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 }))
}
