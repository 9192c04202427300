//! Spatial data structures for matching star positions.
//!
//! [`KdTree`] is a static 2D tree built once over a point set. [`SpatialIndex`]
//! wraps it for a set that changes between queries: mutations mark the tree
//! stale and the next query rebuilds it.

#[cfg(test)]
mod tests;

use glam::DVec2;

/// A point found by a tree query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the slice the tree was built from.
    pub index: usize,
    pub dist_sq: f64,
}

/// A 2D k-d tree over star positions.
///
/// Built with median splits, alternating x and y by depth.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<DVec2>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into the points array
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// Split dimension (0 = x, 1 = y)
    split_dim: usize,
}

#[inline]
fn coord(point: DVec2, dim: usize) -> f64 {
    if dim == 0 { point.x } else { point.y }
}

impl KdTree {
    /// Build a tree over `points`. Returns `None` for an empty slice.
    pub fn build(points: &[DVec2]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let points = points.to_vec();
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());

        Self::build_recursive(&points, &mut indices, 0, &mut nodes);

        Some(Self { nodes, points })
    }

    fn build_recursive(
        points: &[DVec2],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 2;
        indices.sort_by(|&a, &b| {
            coord(points[a], split_dim).total_cmp(&coord(points[b], split_dim))
        });

        let median = indices.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx: indices[median],
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let right_indices = &mut right_part[1..];

        let left = Self::build_recursive(points, left_indices, depth + 1, nodes);
        let right = Self::build_recursive(points, right_indices, depth + 1, nodes);

        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    /// The single nearest point to `query`.
    ///
    /// Among points at exactly the same distance, the one with the lowest
    /// index wins, so results do not depend on the tree's internal layout.
    pub fn nearest(&self, query: DVec2) -> Neighbor {
        let mut best = Neighbor {
            index: usize::MAX,
            dist_sq: f64::INFINITY,
        };
        self.nearest_recursive(0, query, &mut best);
        best
    }

    fn nearest_recursive(&self, node_idx: usize, query: DVec2, best: &mut Neighbor) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        let dist_sq = query.distance_squared(point);
        if dist_sq < best.dist_sq || (dist_sq == best.dist_sq && node.point_idx < best.index) {
            *best = Neighbor {
                index: node.point_idx,
                dist_sq,
            };
        }

        let diff = coord(query, node.split_dim) - coord(point, node.split_dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(first_idx) = first {
            self.nearest_recursive(first_idx, query, best);
        }

        // `<=` keeps equal-distance candidates on the far side reachable for the tie-break.
        if let Some(second_idx) = second
            && diff * diff <= best.dist_sq
        {
            self.nearest_recursive(second_idx, query, best);
        }
    }

    /// All points within `radius` of `query`, nearest first.
    pub fn radius_search(&self, query: DVec2, radius: f64) -> Vec<Neighbor> {
        let radius_sq = radius * radius;
        let mut results = Vec::new();
        self.radius_search_recursive(0, query, radius_sq, &mut results);
        results.sort_by(|a, b| a.dist_sq.total_cmp(&b.dist_sq).then(a.index.cmp(&b.index)));
        results
    }

    fn radius_search_recursive(
        &self,
        node_idx: usize,
        query: DVec2,
        radius_sq: f64,
        results: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        let dist_sq = query.distance_squared(point);
        if dist_sq <= radius_sq {
            results.push(Neighbor {
                index: node.point_idx,
                dist_sq,
            });
        }

        let diff = coord(query, node.split_dim) - coord(point, node.split_dim);
        let diff_sq = diff * diff;

        if let Some(left_idx) = node.left
            && (diff <= 0.0 || diff_sq <= radius_sq)
        {
            self.radius_search_recursive(left_idx, query, radius_sq, results);
        }

        if let Some(right_idx) = node.right
            && (diff >= 0.0 || diff_sq <= radius_sq)
        {
            self.radius_search_recursive(right_idx, query, radius_sq, results);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Keyed point set answering nearest-within-tolerance queries.
///
/// Keys are kept in insertion order; ties in distance resolve to the key
/// inserted first. The tree is rebuilt lazily on the first query after a
/// mutation.
#[derive(Debug)]
pub struct SpatialIndex<K> {
    points: Vec<DVec2>,
    keys: Vec<K>,
    tree: Option<KdTree>,
    dirty: bool,
}

impl<K> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            keys: Vec::new(),
            tree: None,
            dirty: false,
        }
    }
}

impl<K: Copy + Eq> SpatialIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` at `position`. The caller keeps keys unique.
    pub fn insert(&mut self, key: K, position: DVec2) {
        debug_assert!(!self.keys.contains(&key));
        self.points.push(position);
        self.keys.push(key);
        self.dirty = true;
    }

    /// Remove `key`. Returns its position, or `None` if it was not present.
    pub fn remove(&mut self, key: K) -> Option<DVec2> {
        let idx = self.keys.iter().position(|&k| k == key)?;
        self.keys.remove(idx);
        let position = self.points.remove(idx);
        self.dirty = true;
        Some(position)
    }

    /// Nearest key within `tolerance` of `query`, with its distance.
    pub fn nearest(&mut self, query: DVec2, tolerance: f64) -> Option<(K, f64)> {
        let tree = self.tree()?;
        let hit = tree.nearest(query);
        (hit.dist_sq <= tolerance * tolerance).then(|| (self.keys[hit.index], hit.dist_sq.sqrt()))
    }

    /// Keys within `radius` of `query`, nearest first.
    pub fn within(&mut self, query: DVec2, radius: f64) -> Vec<(K, f64)> {
        let Some(tree) = self.tree() else {
            return Vec::new();
        };
        let hits = tree.radius_search(query, radius);
        hits.into_iter()
            .map(|n| (self.keys[n.index], n.dist_sq.sqrt()))
            .collect()
    }

    pub fn position(&self, key: K) -> Option<DVec2> {
        let idx = self.keys.iter().position(|&k| k == key)?;
        Some(self.points[idx])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn tree(&mut self) -> Option<&KdTree> {
        if self.dirty {
            self.tree = KdTree::build(&self.points);
            self.dirty = false;
            tracing::trace!(points = self.points.len(), "Rebuilt spatial index");
        }
        debug_assert_eq!(
            self.tree.as_ref().map_or(0, KdTree::len),
            self.points.len()
        );
        self.tree.as_ref()
    }
}
