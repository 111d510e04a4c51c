//! Spatial chunks: fixed-size buckets of world space holding the identities
//! of the entities currently located inside them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SpatialConfig;
use crate::entity::EntityId;
use crate::geometry::Rect;

/// Integer grid coordinate of a chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to `other`.
    pub fn chebyshev_distance(self, other: ChunkCoord) -> u32 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dy = (self.y as i64 - other.y as i64).unsigned_abs();
        dx.max(dy) as u32
    }

    /// Every coordinate within `radius` (inclusive, Chebyshev) of `self`, in
    /// row-major order.
    pub fn neighbourhood(self, radius: u32) -> impl Iterator<Item = ChunkCoord> {
        let r = radius as i32;
        (self.y - r..=self.y + r)
            .flat_map(move |y| (self.x - r..=self.x + r).map(move |x| ChunkCoord::new(x, y)))
    }
}

impl fmt::Debug for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkCoord({}, {})", self.x, self.y)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

/// A spatial bucket and the set of entities resident in it.
///
/// Residency is maintained by the [`World`](crate::world::World); an entity
/// identity appears in exactly one chunk at a time.
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    area: Rect,
    residents: BTreeSet<EntityId>,
}

impl Chunk {
    /// Create an empty chunk covering its grid cell under `config`.
    pub fn new(coord: ChunkCoord, config: &SpatialConfig) -> Self {
        let w = config.chunk_pixel_width() as f32;
        let h = config.chunk_pixel_height() as f32;
        Self {
            coord,
            area: Rect::new(coord.x as f32 * w, coord.y as f32 * h, w, h),
            residents: BTreeSet::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World-space area covered by this chunk.
    pub fn area(&self) -> Rect {
        self.area
    }

    /// Resident entity identities, in ascending order.
    pub fn residents(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.residents.iter().copied()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.residents.contains(&entity)
    }

    pub fn resident_count(&self) -> usize {
        self.residents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    pub(crate) fn insert(&mut self, entity: EntityId) -> bool {
        self.residents.insert(entity)
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> bool {
        self.residents.remove(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn area_matches_grid_cell() {
        let config = SpatialConfig::default();
        let chunk = Chunk::new(ChunkCoord::new(-1, 2), &config);
        assert_eq!(chunk.area(), Rect::new(-256.0, 512.0, 256.0, 256.0));
        assert_eq!(config.chunk_coord_for(chunk.area().center()), chunk.coord());
        assert!(chunk.area().contains(Vec2::new(-256.0, 512.0)));
    }

    #[test]
    fn residents_are_a_set() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), &SpatialConfig::default());
        let e = EntityId::from_raw(7);
        assert!(chunk.insert(e));
        assert!(!chunk.insert(e));
        assert_eq!(chunk.resident_count(), 1);
        assert!(chunk.remove(e));
        assert!(chunk.is_empty());
    }

    #[test]
    fn neighbourhood_covers_square() {
        let cells: Vec<_> = ChunkCoord::new(0, 0).neighbourhood(1).collect();
        assert_eq!(cells.len(), 9);
        assert!(cells
            .iter()
            .all(|c| c.chebyshev_distance(ChunkCoord::new(0, 0)) <= 1));
        assert_eq!(ChunkCoord::new(3, 3).neighbourhood(0).count(), 1);
    }
}
