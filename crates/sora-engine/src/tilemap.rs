//! Chunked tile map.
//!
//! [`TileMap`] is a world-level aspect: it has no target component and
//! processes no entities. Tiles are stored per chunk, and each frame the
//! aspect emits a [`DrawCall::Tile`] for every tile in an active chunk.

use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use sora_ecs::aspect::{Aspect, AspectCore};
use sora_ecs::behavior::DrawCall;
use sora_ecs::chunk::ChunkCoord;
use sora_ecs::component::ComponentTypeId;
use sora_ecs::config::SpatialConfig;
use sora_ecs::world::World;
use sora_ecs::EcsError;

/// Tile maps draw underneath sprites.
pub const TILEMAP_PRIORITY: i32 = 1;

/// One placed tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub texture: String,
    /// World-space top-left corner.
    pub top_left: Vec2,
}

#[derive(Debug)]
pub struct TileMap {
    core: AspectCore,
    config: SpatialConfig,
    /// Chunk -> (tile x, tile y) within the chunk -> tile.
    chunks: HashMap<ChunkCoord, BTreeMap<(i32, i32), Tile>>,
    draws: Vec<DrawCall>,
}

impl TileMap {
    /// Empty tile map laid out under `config`. The layout is re-read from
    /// the world's configuration when the map is added to a world.
    pub fn new(config: &SpatialConfig) -> Self {
        Self {
            core: AspectCore::untargeted(TILEMAP_PRIORITY),
            config: *config,
            chunks: HashMap::new(),
            draws: Vec::new(),
        }
    }

    fn chunk_tiles(&self) -> (i32, i32) {
        (
            self.config.chunk_tile_width as i32,
            self.config.chunk_tile_height as i32,
        )
    }

    /// Place a tile at `(tx, ty)` relative to chunk `(cx, cy)`. Tile
    /// coordinates beyond the chunk's extent spill into the neighbouring
    /// chunks. Replaces any tile already there.
    pub fn add_tile_to_chunk(&mut self, cx: i32, cy: i32, texture: impl Into<String>, tx: i32, ty: i32) {
        let (w, h) = self.chunk_tiles();
        let coord = ChunkCoord::new(cx + tx.div_euclid(w), cy + ty.div_euclid(h));
        let (lx, ly) = (tx.rem_euclid(w), ty.rem_euclid(h));

        let chunk_origin = Vec2::new(
            coord.x as f32 * self.config.chunk_pixel_width() as f32,
            coord.y as f32 * self.config.chunk_pixel_height() as f32,
        );
        let tile = Tile {
            texture: texture.into(),
            top_left: chunk_origin + Vec2::new(lx as f32, ly as f32) * self.config.tile_size(),
        };
        self.chunks.entry(coord).or_default().insert((lx, ly), tile);
    }

    /// Place a tile at global tile coordinates.
    pub fn add_tile_global(&mut self, texture: impl Into<String>, tx: i32, ty: i32) {
        self.add_tile_to_chunk(0, 0, texture, tx, ty);
    }

    /// Tile at local `(tx, ty)` of chunk `coord`.
    pub fn tile(&self, coord: ChunkCoord, tx: i32, ty: i32) -> Option<&Tile> {
        self.chunks.get(&coord)?.get(&(tx, ty))
    }

    pub fn tiles_in_chunk(&self, coord: ChunkCoord) -> impl Iterator<Item = &Tile> + '_ {
        self.chunks.get(&coord).into_iter().flat_map(|tiles| tiles.values())
    }

    pub fn tile_count(&self) -> usize {
        self.chunks.values().map(BTreeMap::len).sum()
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }
}

impl Aspect for TileMap {
    fn target(&self) -> Option<ComponentTypeId> {
        self.core.target()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn name(&self) -> &str {
        "tilemap"
    }

    fn on_add(&mut self, world: &World) {
        if *world.config() != self.config && !self.chunks.is_empty() {
            tracing::warn!("tile map config differs from the world config; placed tiles keep their positions");
        }
        self.config = *world.config();
    }

    fn handle(&mut self, world: &mut World, _dt: f32) -> Result<(), EcsError> {
        self.draws.clear();
        let size = self.config.tile_size();
        for coord in world.active_chunks() {
            let Some(tiles) = self.chunks.get(&coord) else {
                continue;
            };
            self.draws.extend(tiles.values().map(|tile| DrawCall::Tile {
                texture: tile.texture.clone(),
                top_left: tile.top_left,
                size,
            }));
        }
        Ok(())
    }
}
