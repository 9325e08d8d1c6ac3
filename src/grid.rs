//! SpatialIndex — an 8D bucketed hash grid, one bucket map per space.
//!
//! Each space is indexed independently: a token active in
//! L1 and L4 has an entry in both bucket maps, and removal must be exact
//! (no bucket ever retains a stale id after an update or delete).

use crate::coordinates::{discretize, distance, Coord3, CoordinateSpace, NUM_SPACES};
use crate::token::TokenId;
use parking_lot::RwLock;
use std::collections::HashMap;

pub type BucketKey = (i64, i64, i64);

#[derive(Debug, Clone)]
pub struct GridConfig {
    pub bucket_size: f32,
    pub density_threshold: f32,
    pub min_field_nodes: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bucket_size: 10.0,
            density_threshold: 0.1,
            min_field_nodes: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NeighborHit {
    pub token_id: TokenId,
    pub distance: f32,
}

/// Per-space bucket map plus a reverse index (token -> bucket) so removal
/// and re-index are O(1) instead of a full-map scan.
struct SpaceIndex {
    buckets: HashMap<BucketKey, Vec<TokenId>>,
    location: HashMap<TokenId, (BucketKey, Coord3)>,
}

impl SpaceIndex {
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            location: HashMap::new(),
        }
    }

    fn insert(&mut self, id: TokenId, point: Coord3, bucket_size: f32) {
        let key = discretize(point, bucket_size);
        self.buckets.entry(key).or_default().push(id);
        self.location.insert(id, (key, point));
    }

    fn remove(&mut self, id: TokenId) {
        if let Some((key, _)) = self.location.remove(&id) {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.retain(|t| *t != id);
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    fn reinsert(&mut self, id: TokenId, point: Coord3, bucket_size: f32) {
        self.remove(id);
        self.insert(id, point, bucket_size);
    }
}

pub struct SpatialIndex {
    config: GridConfig,
    spaces: [RwLock<SpaceIndex>; NUM_SPACES],
}

impl SpatialIndex {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            spaces: std::array::from_fn(|_| RwLock::new(SpaceIndex::new())),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    fn space(&self, space: CoordinateSpace) -> &RwLock<SpaceIndex> {
        &self.spaces[space.index()]
    }

    pub fn insert(&self, id: TokenId, space: CoordinateSpace, point: Coord3) {
        self.space(space)
            .write()
            .insert(id, point, self.config.bucket_size);
    }

    pub fn remove(&self, id: TokenId, space: CoordinateSpace) {
        self.space(space).write().remove(id);
    }

    pub fn update(&self, id: TokenId, space: CoordinateSpace, point: Coord3) {
        self.space(space)
            .write()
            .reinsert(id, point, self.config.bucket_size);
    }

    /// Remove a token from every space it might be indexed in. Safe to call
    /// even if the token was never indexed in a given space.
    pub fn remove_all(&self, id: TokenId) {
        for space in CoordinateSpace::ALL {
            self.remove(id, space);
        }
    }

    /// Candidate ids in buckets touching a sphere of `radius` around `center`.
    fn candidates(&self, space: CoordinateSpace, center: Coord3, radius: f32) -> Vec<(TokenId, Coord3)> {
        let idx = self.space(space).read();
        let bucket_size = self.config.bucket_size;
        let reach = (radius / bucket_size).ceil() as i64;
        let (cx, cy, cz) = discretize(center, bucket_size);
        let mut out = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let key = (cx + dx, cy + dy, cz + dz);
                    if let Some(bucket) = idx.buckets.get(&key) {
                        for &id in bucket {
                            if let Some((_, point)) = idx.location.get(&id) {
                                out.push((id, *point));
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Nearest neighbors of `origin_id` in `space`, within `radius`, self
    /// excluded, sorted ascending by distance then by ascending id.
    pub fn find_neighbors(
        &self,
        origin_id: TokenId,
        space: CoordinateSpace,
        origin_point: Coord3,
        radius: f32,
        max_results: usize,
    ) -> Vec<NeighborHit> {
        if radius <= 0.0 || max_results == 0 {
            return Vec::new();
        }
        let mut hits: Vec<NeighborHit> = self
            .candidates(space, origin_point, radius)
            .into_iter()
            .filter(|(id, _)| *id != origin_id)
            .filter_map(|(id, point)| {
                let d = distance(origin_point, point);
                (d <= radius).then_some(NeighborHit { token_id: id, distance: d })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.token_id.cmp(&b.token_id))
        });
        hits.truncate(max_results);
        hits
    }

    /// Same as `find_neighbors` but without excluding any particular id.
    pub fn range_query(&self, space: CoordinateSpace, center: Coord3, radius: f32) -> Vec<NeighborHit> {
        if radius <= 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<NeighborHit> = self
            .candidates(space, center, radius)
            .into_iter()
            .filter_map(|(id, point)| {
                let d = distance(center, point);
                (d <= radius).then_some(NeighborHit { token_id: id, distance: d })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.token_id.cmp(&b.token_id))
        });
        hits
    }

    /// Field influence at `point`: sum over tokens within `radius` of
    /// `field_strength * max(0, 1 - d/field_radius)`, clamped to [0,1].
    /// Caller supplies a lookup for each candidate's (field_radius,
    /// field_strength) since the grid only stores ids and points.
    pub fn field_influence(
        &self,
        space: CoordinateSpace,
        point: Coord3,
        radius: f32,
        lookup: impl Fn(TokenId) -> Option<(f32, f32)>,
    ) -> f32 {
        let mut sum = 0.0f32;
        for hit in self.range_query(space, point, radius) {
            if let Some((field_radius, field_strength)) = lookup(hit.token_id) {
                if field_radius > 0.0 {
                    sum += field_strength * (1.0 - hit.distance / field_radius).max(0.0);
                }
            }
        }
        sum.clamp(0.0, 1.0)
    }

    /// Dimensionless density: |tokens within radius| / volume of the sphere.
    pub fn density(&self, space: CoordinateSpace, point: Coord3, radius: f32) -> f32 {
        if radius <= 0.0 {
            return 0.0;
        }
        let count = self.range_query(space, point, radius).len() as f32;
        let volume = (4.0 / 3.0) * std::f32::consts::PI * radius.powi(3);
        count / volume
    }

    pub fn bucket_count(&self, space: CoordinateSpace) -> usize {
        self.space(space).read().buckets.len()
    }

    pub fn indexed_count(&self, space: CoordinateSpace) -> usize {
        self.space(space).read().location.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_neighbor_scenario() {
        let grid = SpatialIndex::new(GridConfig::default());
        grid.insert(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0]);
        grid.insert(2, CoordinateSpace::L1Physical, [5.0, 0.0, 0.0]);
        let hits = grid.find_neighbors(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 10.0, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].token_id, 2);
        assert_eq!(hits[0].distance, 5.0);
    }

    #[test]
    fn zero_radius_is_empty() {
        let grid = SpatialIndex::new(GridConfig::default());
        grid.insert(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0]);
        let hits = grid.find_neighbors(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 0.0, 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn zero_max_results_is_empty() {
        let grid = SpatialIndex::new(GridConfig::default());
        grid.insert(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0]);
        grid.insert(2, CoordinateSpace::L1Physical, [1.0, 0.0, 0.0]);
        let hits = grid.find_neighbors(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 10.0, 0);
        assert!(hits.is_empty());
    }

    #[test]
    fn update_moves_token_exactly() {
        let grid = SpatialIndex::new(GridConfig::default());
        grid.insert(1, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0]);
        grid.update(1, CoordinateSpace::L1Physical, [100.0, 0.0, 0.0]);
        let old_hits = grid.range_query(CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 1.0);
        assert!(old_hits.is_empty());
        let new_hits = grid.range_query(CoordinateSpace::L1Physical, [100.0, 0.0, 0.0], 1.0);
        assert_eq!(new_hits.len(), 1);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let grid = SpatialIndex::new(GridConfig::default());
        grid.insert(2, CoordinateSpace::L1Physical, [1.0, 0.0, 0.0]);
        grid.insert(1, CoordinateSpace::L1Physical, [1.0, 0.0, 0.0]);
        grid.insert(3, CoordinateSpace::L1Physical, [1.0, 0.0, 0.0]);
        let hits = grid.find_neighbors(99, CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 10.0, 10);
        assert_eq!(hits.iter().map(|h| h.token_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
