//! Quadtree spatial index over region bounding boxes
//!
//! This module provides the prefilter used before exact (and costlier) geometric tests.
//! Each bounding box is stored at the deepest node that fully contains it, so a query only
//! visits the nodes that overlap the query rectangle.

use geo::{Coord, Rect};

/// Maximum depth of the quadtree to prevent unbounded subdivision
const MAX_DEPTH: u32 = 16;

/// Root bounds in degrees: wide enough for both the -180..180 and the 0..360 conventions
const ROOT_MIN_LON: f64 = -180.0;
const ROOT_MAX_LON: f64 = 360.0;
const ROOT_MIN_LAT: f64 = -90.0;
const ROOT_MAX_LAT: f64 = 90.0;

/// An indexed bounding box
#[derive(Clone, Copy, Debug)]
struct Entry {
    /// Position of the region in the owning store
    index: usize,
    /// Region bounding box in degrees
    envelope: Rect<f64>,
}

/// Root container for the quadtree spatial index
#[derive(Debug, Clone)]
pub struct Quadtree {
    /// Root node covering the whole longitude/latitude domain
    root: QuadtreeNode,
    /// Number of stored entries
    len: usize,
}

/// A single node in the quadtree
#[derive(Debug, Clone)]
struct QuadtreeNode {
    /// Bounding box in degrees
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    depth: u32,
    /// Entries that fit in this node but in none of its children
    entries: Vec<Entry>,
    /// Child nodes (NW, NE, SW, SE) if subdivided
    children: Option<Box<[QuadtreeNode; 4]>>,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new()
    }
}

impl Quadtree {
    /// Create a new empty quadtree covering the whole domain
    pub fn new() -> Self {
        Self {
            root: QuadtreeNode::new_root(),
            len: 0,
        }
    }

    /// Build a quadtree from `(index, envelope)` pairs
    pub fn build(envelopes: impl IntoIterator<Item = (usize, Rect<f64>)>) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("quadtree::build");

        let mut quadtree = Self::new();
        for (index, envelope) in envelopes {
            quadtree.insert(index, envelope);
        }
        quadtree
    }

    /// Insert a bounding box for the region at `index`
    pub fn insert(&mut self, index: usize, envelope: Rect<f64>) {
        self.root.insert(Entry { index, envelope });
        self.len += 1;
    }

    /// Indices of all entries whose bounding box intersects `area`
    ///
    /// The result is sorted ascending, i.e. in insertion order for sequentially built trees.
    pub fn query(&self, area: Rect<f64>) -> Vec<usize> {
        #[cfg(feature = "profiling")]
        profiling::scope!("quadtree::query");

        let mut results = Vec::new();
        self.root.query(area, &mut results);
        results.sort_unstable();
        results
    }

    /// Number of stored entries
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth of the deepest subdivided node
    pub fn depth(&self) -> u32 {
        self.root.max_depth()
    }
}

impl QuadtreeNode {
    /// Create the root node covering the whole domain
    fn new_root() -> Self {
        let bounding_box = Rect::new(
            Coord {
                x: ROOT_MIN_LON,
                y: ROOT_MIN_LAT,
            },
            Coord {
                x: ROOT_MAX_LON,
                y: ROOT_MAX_LAT,
            },
        );
        Self::new_child(bounding_box, 0)
    }

    /// Create a child node with the given bounding box and depth
    fn new_child(bounding_box: Rect<f64>, depth: u32) -> Self {
        Self {
            bounding_box,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    /// Bounding boxes of the four quadrants (NW, NE, SW, SE)
    fn quadrants(&self) -> [Rect<f64>; 4] {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;

        [
            Rect::new(Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            Rect::new(Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            Rect::new(Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
        ]
    }

    /// Subdivide this node into 4 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return; // Already subdivided
        }

        let [nw, ne, sw, se] = self.quadrants();
        let child_depth = self.depth + 1;
        self.children = Some(Box::new([
            QuadtreeNode::new_child(nw, child_depth),
            QuadtreeNode::new_child(ne, child_depth),
            QuadtreeNode::new_child(sw, child_depth),
            QuadtreeNode::new_child(se, child_depth),
        ]));
    }

    /// Insert an entry at the deepest node that fully contains it
    fn insert(&mut self, entry: Entry) {
        if self.depth < MAX_DEPTH {
            let target = self
                .quadrants()
                .iter()
                .position(|quadrant| rect_contains(*quadrant, entry.envelope));

            if let Some(quadrant) = target {
                self.subdivide();
                if let Some(children) = &mut self.children {
                    children[quadrant].insert(entry);
                    return;
                }
            }
        }

        // Spans several quadrants (or lies outside the root): store here
        self.entries.push(entry);
    }

    /// Collect indices of entries intersecting `area` from this node and its children
    fn query(&self, area: Rect<f64>, results: &mut Vec<usize>) {
        // Entries outside the root bounds live at the root, so never cull it
        if self.depth > 0 && !rects_intersect(self.bounding_box, area) {
            return;
        }

        results.extend(
            self.entries
                .iter()
                .filter(|entry| rects_intersect(entry.envelope, area))
                .map(|entry| entry.index),
        );

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(area, results);
            }
        }
    }

    fn max_depth(&self) -> u32 {
        match &self.children {
            Some(children) => children
                .iter()
                .map(QuadtreeNode::max_depth)
                .max()
                .unwrap_or(self.depth),
            None => self.depth,
        }
    }
}

/// Check if `outer` fully contains `inner` (boundaries included)
#[inline]
fn rect_contains(outer: Rect<f64>, inner: Rect<f64>) -> bool {
    inner.min().x >= outer.min().x
        && inner.max().x <= outer.max().x
        && inner.min().y >= outer.min().y
        && inner.max().y <= outer.max().y
}

/// Check if two rectangles intersect (touching counts)
#[inline]
fn rects_intersect(a: Rect<f64>, b: Rect<f64>) -> bool {
    !(a.max().x < b.min().x || a.min().x > b.max().x || a.max().y < b.min().y || a.min().y > b.max().y)
}
