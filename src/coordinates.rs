//! The eight semantic coordinate spaces every [`crate::token::Token`] lives in.
//!
//! L1 and L4 and L8 carry meaning the core understands (physical, emotional
//! VAD, abstract); L2, L3, L5, L6, L7 are opaque to the core — same shape,
//! no special-cased behavior (spec open question, resolved in SPEC_FULL.md §4).

use serde::{Deserialize, Serialize};

pub const NUM_SPACES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoordinateSpace {
    L1Physical = 0,
    L2 = 1,
    L3 = 2,
    L4Emotional = 3,
    L5 = 4,
    L6 = 5,
    L7 = 6,
    L8Abstract = 7,
}

impl CoordinateSpace {
    pub const ALL: [CoordinateSpace; NUM_SPACES] = [
        CoordinateSpace::L1Physical,
        CoordinateSpace::L2,
        CoordinateSpace::L3,
        CoordinateSpace::L4Emotional,
        CoordinateSpace::L5,
        CoordinateSpace::L6,
        CoordinateSpace::L7,
        CoordinateSpace::L8Abstract,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

/// A point in one of the eight 3-scalar spaces.
pub type Coord3 = [f32; 3];

/// The full 8×3 coordinate block carried by a Token.
pub type Coords8 = [Coord3; NUM_SPACES];

pub fn coords8_finite(coords: &Coords8) -> bool {
    coords.iter().all(|c| c.iter().all(|v| v.is_finite()))
}

/// Euclidean distance between two points in a single space.
pub fn distance(a: Coord3, b: Coord3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Discretize a point to a bucket cell given a bucket size, matching the
/// scheme shared by [`crate::grid::SpatialIndex`] and the curiosity trackers.
pub fn discretize(point: Coord3, bucket_size: f32) -> (i64, i64, i64) {
    (
        (point[0] / bucket_size).floor() as i64,
        (point[1] / bucket_size).floor() as i64,
        (point[2] / bucket_size).floor() as i64,
    )
}

/// Extension trait used by callers who only have a flat 8-f32 vector (as
/// `SignalEvent::semantic_vector` is) and want it read as three-at-a-time
/// coordinate-space points for distance/discretization purposes. The core
/// treats an 8-f32 vector as 8 independent scalars, one per space, rather
/// than 8 triplets — `CoordinateExt` projects such a vector onto the
/// L1-shaped triplet space used by curiosity cell discretization.
pub trait CoordinateExt {
    fn as_cell_key(&self, bucket_size: f32) -> CoordinateIndex;
}

/// A discretized key over all 8 dimensions, used by CuriosityEngine's maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateIndex(pub [i64; NUM_SPACES]);

impl CoordinateExt for [f32; NUM_SPACES] {
    fn as_cell_key(&self, bucket_size: f32) -> CoordinateIndex {
        let mut cell = [0i64; NUM_SPACES];
        for (i, v) in self.iter().enumerate() {
            cell[i] = (v / bucket_size).floor() as i64;
        }
        CoordinateIndex(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]), 5.0);
    }

    #[test]
    fn discretize_floors_toward_negative_infinity() {
        assert_eq!(discretize([-0.5, 0.0, 0.0], 10.0), (-1, 0, 0));
        assert_eq!(discretize([9.9, 0.0, 0.0], 10.0), (0, 0, 0));
    }

    #[test]
    fn cell_key_covers_all_dims() {
        let v = [0.0f32; NUM_SPACES];
        let key = v.as_cell_key(10.0);
        assert_eq!(key.0.len(), NUM_SPACES);
    }
}
