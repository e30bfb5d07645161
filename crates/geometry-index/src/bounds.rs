//! Bounds store: R-tree over document bounding boxes
//!
//! This module provides the coarse spatial prefilter of the index. Every indexed
//! document contributes one axis-aligned bounding box; the tree groups those boxes
//! into progressively coarser rectangles so that an intersection query only visits
//! the branches whose envelope overlaps the query box.
//!
//! Nodes are split with Guttman's quadratic algorithm. Deletion locates the entry
//! through the box it was inserted under, removes under-filled nodes and reinserts
//! their remaining entries.

use crate::DocumentId;
use geo::{Coord, Rect};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default maximum number of entries per node
pub const DEFAULT_MAX_NODE_ENTRIES: usize = 16;

/// Smallest fan-out accepted; below this the quadratic split degenerates
const MIN_FAN_OUT: usize = 4;

/// A single (document, box) association stored in a leaf
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Entry {
    id: DocumentId,
    bounds: Rect<f64>,
}

/// Contents of a node: leaves hold entries, internal nodes hold child nodes
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum NodeKind {
    Leaf(Vec<Entry>),
    Internal(Vec<Node>),
}

/// A node of the R-tree
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node {
    /// Envelope of everything stored below this node (meaningless while empty)
    bounding_box: Rect<f64>,
    kind: NodeKind,
}

/// Spatial structure mapping document ids to bounding boxes
///
/// Inserting an id that is already present is a logic error: callers must
/// [`delete`](Self::delete) the old association before inserting a changed box.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundsStore {
    root: Node,
    len: usize,
    max_entries: usize,
    min_entries: usize,
}

impl Default for BoundsStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODE_ENTRIES)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl BoundsStore {
    /// Create an empty store with the given node fan-out
    ///
    /// The fan-out is clamped to a minimum of 4; the minimum fill of a node is
    /// 40% of the maximum.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(MIN_FAN_OUT);
        let min_entries = (max_entries * 2 / 5).max(2);
        Self {
            root: Node::empty_leaf(),
            len: 0,
            max_entries,
            min_entries,
        }
    }

    /// Add an association between `id` and `bounds`
    pub fn insert(&mut self, id: DocumentId, bounds: Rect<f64>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("bounds::insert");

        self.insert_entry(Entry { id, bounds });
        self.len += 1;
    }

    /// Remove the association between `id` and `bounds`
    ///
    /// The box must be the one `id` was inserted under. Returns `false` (and
    /// leaves the store untouched) when no such association exists.
    pub fn delete(&mut self, id: DocumentId, bounds: Rect<f64>) -> bool {
        #[cfg(feature = "profiling")]
        profiling::scope!("bounds::delete");

        if self.len == 0 {
            return false;
        }

        let mut orphans = Vec::new();
        if !self
            .root
            .remove(id, &bounds, self.min_entries, &mut orphans)
        {
            return false;
        }
        self.len -= 1;

        self.shrink_root();

        // Entries of dissolved nodes go back in from the top
        for entry in orphans {
            self.insert_entry(entry);
        }

        true
    }

    /// Return every id whose stored box overlaps `query` (boundaries included)
    ///
    /// No ordering is guaranteed. The result is a superset of the documents whose
    /// exact geometry satisfies any predicate against `query`.
    pub fn intersection(&self, query: Rect<f64>) -> Vec<DocumentId> {
        #[cfg(feature = "profiling")]
        profiling::scope!("bounds::intersection");

        let mut results = Vec::new();
        if self.len == 0 {
            return results;
        }

        let mut stack: SmallVec<[&Node; 32]> = SmallVec::new();
        stack.push(&self.root);

        while let Some(node) = stack.pop() {
            // Prune whole branches whose envelope misses the query
            if !rects_intersect(&node.bounding_box, &query) {
                continue;
            }

            match &node.kind {
                NodeKind::Leaf(entries) => results.extend(
                    entries
                        .iter()
                        .filter(|entry| rects_intersect(&entry.bounds, &query))
                        .map(|entry| entry.id),
                ),
                NodeKind::Internal(children) => stack.extend(children.iter()),
            }
        }

        results
    }

    /// Check whether the exact association `(id, bounds)` is stored
    pub fn contains(&self, id: DocumentId, bounds: Rect<f64>) -> bool {
        self.len > 0 && self.root.contains_entry(id, &bounds)
    }

    /// Iterate over every stored `(id, box)` pair, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, Rect<f64>)> + '_ {
        let mut entries = Vec::with_capacity(self.len);
        if self.len > 0 {
            self.root.collect_refs(&mut entries);
        }
        entries.into_iter().map(|entry| (entry.id, entry.bounds))
    }

    /// Envelope of all stored boxes, `None` when empty
    pub fn bounds(&self) -> Option<Rect<f64>> {
        (self.len > 0).then_some(self.root.bounding_box)
    }

    /// Number of stored associations
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the store is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree (1 for a single leaf)
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = &self.root;
        while let NodeKind::Internal(children) = &node.kind {
            match children.first() {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        depth
    }

    /// Maximum number of entries per node
    #[inline]
    pub fn max_node_entries(&self) -> usize {
        self.max_entries
    }

    /// Remove every association
    pub fn clear(&mut self) {
        self.root = Node::empty_leaf();
        self.len = 0;
    }

    /// Insert without touching the length counter (shared by insert and reinsertion)
    fn insert_entry(&mut self, entry: Entry) {
        if let Some(sibling) = self
            .root
            .insert(entry, self.max_entries, self.min_entries)
        {
            // Root split: grow the tree by one level
            let old_root = std::mem::replace(&mut self.root, Node::empty_leaf());
            self.root = Node::internal(vec![old_root, sibling]);
        }
    }

    /// Collapse chains of single-child roots left behind by deletions
    fn shrink_root(&mut self) {
        loop {
            match &mut self.root.kind {
                NodeKind::Internal(children) if children.len() == 1 => {
                    if let Some(child) = children.pop() {
                        self.root = child;
                    }
                }
                NodeKind::Internal(children) if children.is_empty() => {
                    self.root = Node::empty_leaf();
                }
                _ => break,
            }
        }
    }
}

impl Node {
    fn empty_leaf() -> Self {
        Self {
            bounding_box: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }),
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    /// Build a leaf from a non-empty set of entries
    fn leaf(entries: Vec<Entry>) -> Self {
        let mut node = Self {
            bounding_box: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }),
            kind: NodeKind::Leaf(entries),
        };
        node.recompute_bounds();
        node
    }

    /// Build an internal node from a non-empty set of children
    fn internal(children: Vec<Node>) -> Self {
        let mut node = Self {
            bounding_box: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }),
            kind: NodeKind::Internal(children),
        };
        node.recompute_bounds();
        node
    }

    /// Number of direct children or entries
    fn fill(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Internal(children) => children.len(),
        }
    }

    /// Insert an entry below this node
    ///
    /// Returns the new sibling when this node had to be split.
    fn insert(&mut self, entry: Entry, max: usize, min: usize) -> Option<Node> {
        self.bounding_box = if self.fill() == 0 {
            entry.bounds
        } else {
            union(&self.bounding_box, &entry.bounds)
        };

        match &mut self.kind {
            NodeKind::Leaf(entries) => {
                entries.push(entry);
                if entries.len() > max {
                    return Some(self.split(min));
                }
            }
            NodeKind::Internal(children) => {
                let index = choose_subtree(children, &entry.bounds);
                if let Some(sibling) = children[index].insert(entry, max, min) {
                    children.push(sibling);
                    if children.len() > max {
                        return Some(self.split(min));
                    }
                }
            }
        }

        None
    }

    /// Split an overfull node in two, keeping one half here and returning the other
    fn split(&mut self, min: usize) -> Node {
        match &mut self.kind {
            NodeKind::Leaf(entries) => {
                let (kept, moved) =
                    quadratic_split(std::mem::take(entries), |entry| entry.bounds, min);
                *self = Node::leaf(kept);
                Node::leaf(moved)
            }
            NodeKind::Internal(children) => {
                let (kept, moved) =
                    quadratic_split(std::mem::take(children), |child| child.bounding_box, min);
                *self = Node::internal(kept);
                Node::internal(moved)
            }
        }
    }

    /// Remove `(id, bounds)` from this subtree
    ///
    /// Children that drop below the minimum fill are detached and their entries
    /// pushed to `orphans` for reinsertion.
    fn remove(
        &mut self,
        id: DocumentId,
        bounds: &Rect<f64>,
        min: usize,
        orphans: &mut Vec<Entry>,
    ) -> bool {
        if self.fill() == 0 || !rect_covers(&self.bounding_box, bounds) {
            return false;
        }

        match &mut self.kind {
            NodeKind::Leaf(entries) => {
                let Some(position) = entries
                    .iter()
                    .position(|entry| entry.id == id && entry.bounds == *bounds)
                else {
                    return false;
                };
                entries.swap_remove(position);
            }
            NodeKind::Internal(children) => {
                let Some(index) = children
                    .iter_mut()
                    .position(|child| child.remove(id, bounds, min, orphans))
                else {
                    return false;
                };
                if children[index].fill() < min {
                    let underfull = children.swap_remove(index);
                    underfull.collect_entries(orphans);
                }
            }
        }

        self.recompute_bounds();
        true
    }

    fn contains_entry(&self, id: DocumentId, bounds: &Rect<f64>) -> bool {
        if self.fill() == 0 || !rect_covers(&self.bounding_box, bounds) {
            return false;
        }
        match &self.kind {
            NodeKind::Leaf(entries) => entries
                .iter()
                .any(|entry| entry.id == id && entry.bounds == *bounds),
            NodeKind::Internal(children) => {
                children.iter().any(|child| child.contains_entry(id, bounds))
            }
        }
    }

    /// Move every entry of this subtree into `out`
    fn collect_entries(self, out: &mut Vec<Entry>) {
        match self.kind {
            NodeKind::Leaf(entries) => out.extend(entries),
            NodeKind::Internal(children) => {
                for child in children {
                    child.collect_entries(out);
                }
            }
        }
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Entry>) {
        match &self.kind {
            NodeKind::Leaf(entries) => out.extend(entries.iter()),
            NodeKind::Internal(children) => {
                for child in children {
                    child.collect_refs(out);
                }
            }
        }
    }

    /// Recompute the envelope from the direct contents (no-op when empty)
    fn recompute_bounds(&mut self) {
        let envelope = match &self.kind {
            NodeKind::Leaf(entries) => envelope_of(entries.iter().map(|entry| &entry.bounds)),
            NodeKind::Internal(children) => {
                envelope_of(children.iter().map(|child| &child.bounding_box))
            }
        };
        if let Some(envelope) = envelope {
            self.bounding_box = envelope;
        }
    }
}

/// Pick the child needing the least area enlargement to hold `bounds`
///
/// Ties go to the smaller child.
fn choose_subtree(children: &[Node], bounds: &Rect<f64>) -> usize {
    let mut best = 0;
    let mut best_cost = (f64::INFINITY, f64::INFINITY);

    for (index, child) in children.iter().enumerate() {
        let cost = (
            enlargement(&child.bounding_box, bounds),
            area(&child.bounding_box),
        );
        if cost < best_cost {
            best = index;
            best_cost = cost;
        }
    }

    best
}

/// Guttman's quadratic split
///
/// Seeds the two groups with the pair wasting the most area, then repeatedly
/// assigns the item with the strongest preference. Each group ends up with at
/// least `min` items.
fn quadratic_split<T>(
    mut items: Vec<T>,
    bounds_of: impl Fn(&T) -> Rect<f64>,
    min: usize,
) -> (Vec<T>, Vec<T>) {
    let (seed_a, seed_b) = pick_seeds(&items, &bounds_of);

    // Remove the higher index first so the lower one stays valid
    let item_b = items.swap_remove(seed_b);
    let item_a = items.swap_remove(seed_a);

    let mut box_a = bounds_of(&item_a);
    let mut box_b = bounds_of(&item_b);
    let mut group_a = vec![item_a];
    let mut group_b = vec![item_b];

    while !items.is_empty() {
        // One group must take all the rest to reach the minimum fill
        if group_a.len() + items.len() <= min {
            group_a.append(&mut items);
            break;
        }
        if group_b.len() + items.len() <= min {
            group_b.append(&mut items);
            break;
        }

        let preference = |item: &T| {
            let bounds = bounds_of(item);
            enlargement(&box_a, &bounds) - enlargement(&box_b, &bounds)
        };
        let mut next = 0;
        let mut strongest = f64::NEG_INFINITY;
        for (index, item) in items.iter().enumerate() {
            let strength = preference(item).abs();
            if strength > strongest {
                next = index;
                strongest = strength;
            }
        }

        let item = items.swap_remove(next);
        let bounds = bounds_of(&item);
        let grow_a = (enlargement(&box_a, &bounds), margin_growth(&box_a, &bounds));
        let grow_b = (enlargement(&box_b, &bounds), margin_growth(&box_b, &bounds));

        let to_a = match grow_a.partial_cmp(&grow_b) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Greater) => false,
            _ => group_a.len() <= group_b.len(),
        };

        if to_a {
            box_a = union(&box_a, &bounds);
            group_a.push(item);
        } else {
            box_b = union(&box_b, &bounds);
            group_b.push(item);
        }
    }

    (group_a, group_b)
}

/// Find the pair of items whose combined envelope wastes the most space
///
/// Returns `(lower, higher)` indices. Zero-area boxes (points) fall back to the
/// margin of the combined envelope so that distant points still seed apart.
fn pick_seeds<T>(items: &[T], bounds_of: &impl Fn(&T) -> Rect<f64>) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut worst = (f64::NEG_INFINITY, f64::NEG_INFINITY);

    for i in 0..items.len() {
        let a = bounds_of(&items[i]);
        for (j, item_b) in items.iter().enumerate().skip(i + 1) {
            let b = bounds_of(item_b);
            let combined = union(&a, &b);
            let waste = (
                area(&combined) - area(&a) - area(&b),
                margin(&combined) - margin(&a) - margin(&b),
            );
            if waste > worst {
                seeds = (i, j);
                worst = waste;
            }
        }
    }

    seeds
}

/// Check whether two closed rectangles share at least one point
#[inline]
pub(crate) fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    !(a.max().x < b.min().x || a.min().x > b.max().x || a.max().y < b.min().y || a.min().y > b.max().y)
}

/// Check whether `outer` fully covers `inner`
#[inline]
fn rect_covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

#[inline]
fn union(a: &Rect<f64>, b: &Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[inline]
fn area(rect: &Rect<f64>) -> f64 {
    rect.width() * rect.height()
}

/// Half perimeter
#[inline]
fn margin(rect: &Rect<f64>) -> f64 {
    rect.width() + rect.height()
}

#[inline]
fn enlargement(rect: &Rect<f64>, added: &Rect<f64>) -> f64 {
    area(&union(rect, added)) - area(rect)
}

#[inline]
fn margin_growth(rect: &Rect<f64>, added: &Rect<f64>) -> f64 {
    margin(&union(rect, added)) - margin(rect)
}

fn envelope_of<'a>(mut boxes: impl Iterator<Item = &'a Rect<f64>>) -> Option<Rect<f64>> {
    let first = *boxes.next()?;
    Some(boxes.fold(first, |acc, rect| union(&acc, rect)))
}
