//! Spatial configuration: tile and chunk extents.
//!
//! A chunk is `chunk_tile_width × chunk_tile_height` tiles, each tile being
//! `tile_pixel_width × tile_pixel_height` pixels. Chunk pixel extents are
//! always derived from those four values and cannot be set directly.
//!
//! On disk the configuration is a flat JSON object using the short keys
//! `tilepixw`, `tilepixh`, `chunktilew`, `chunktileh` and, for information
//! only, the derived `chunkpixw` / `chunkpixh`.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkCoord;
use crate::EcsError;

/// Key for tile width in pixels.
pub const KEY_TILE_PIXEL_WIDTH: &str = "tilepixw";
/// Key for tile height in pixels.
pub const KEY_TILE_PIXEL_HEIGHT: &str = "tilepixh";
/// Key for chunk width in tiles.
pub const KEY_CHUNK_TILE_WIDTH: &str = "chunktilew";
/// Key for chunk height in tiles.
pub const KEY_CHUNK_TILE_HEIGHT: &str = "chunktileh";
/// Derived key for chunk width in pixels (read-only).
pub const KEY_CHUNK_PIXEL_WIDTH: &str = "chunkpixw";
/// Derived key for chunk height in pixels (read-only).
pub const KEY_CHUNK_PIXEL_HEIGHT: &str = "chunkpixh";

/// Tile and chunk extents for one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialConfig {
    pub tile_pixel_width: u32,
    pub tile_pixel_height: u32,
    pub chunk_tile_width: u32,
    pub chunk_tile_height: u32,
}

impl Default for SpatialConfig {
    /// 16×16 pixel tiles, 16×16 tiles per chunk (256×256 pixel chunks).
    fn default() -> Self {
        Self {
            tile_pixel_width: 16,
            tile_pixel_height: 16,
            chunk_tile_width: 16,
            chunk_tile_height: 16,
        }
    }
}

impl SpatialConfig {
    /// Build a configuration, validating that every extent is positive.
    pub fn new(
        tile_pixel_width: u32,
        tile_pixel_height: u32,
        chunk_tile_width: u32,
        chunk_tile_height: u32,
    ) -> Result<Self, EcsError> {
        let config = Self {
            tile_pixel_width,
            tile_pixel_height,
            chunk_tile_width,
            chunk_tile_height,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from loosely typed key/value options.
    ///
    /// Unknown keys are ignored. The derived `chunkpixw` / `chunkpixh` keys
    /// are ignored, with a warning if they disagree with the derived extent.
    /// Absent keys keep their defaults. Every recognised value must be an
    /// integer greater than zero, and the derived chunk extents must fit in
    /// a `u32`.
    pub fn from_options(options: &HashMap<String, serde_json::Value>) -> Result<Self, EcsError> {
        let mut config = Self::default();
        for (key, value) in options {
            let slot = match key.as_str() {
                KEY_TILE_PIXEL_WIDTH => &mut config.tile_pixel_width,
                KEY_TILE_PIXEL_HEIGHT => &mut config.tile_pixel_height,
                KEY_CHUNK_TILE_WIDTH => &mut config.chunk_tile_width,
                KEY_CHUNK_TILE_HEIGHT => &mut config.chunk_tile_height,
                KEY_CHUNK_PIXEL_WIDTH | KEY_CHUNK_PIXEL_HEIGHT => continue,
                _ => {
                    tracing::debug!(key = %key, "ignoring unknown spatial config key");
                    continue;
                }
            };
            *slot = positive_integer(key, value)?;
        }
        config.validate()?;
        for key in config.conflicting_derived_keys(options) {
            tracing::warn!(key, "chunk pixel extents are derived; ignoring");
        }
        Ok(config)
    }

    /// Derived keys in `options` whose value differs from the extent this
    /// configuration derives.
    fn conflicting_derived_keys(&self, options: &HashMap<String, serde_json::Value>) -> Vec<&'static str> {
        [
            (KEY_CHUNK_PIXEL_WIDTH, self.chunk_pixel_width()),
            (KEY_CHUNK_PIXEL_HEIGHT, self.chunk_pixel_height()),
        ]
        .into_iter()
        .filter(|(key, derived)| {
            options
                .get(*key)
                .is_some_and(|v| v.as_u64() != Some(u64::from(*derived)))
        })
        .map(|(key, _)| key)
        .collect()
    }

    /// Parse a JSON object of options. See [`from_options`](Self::from_options).
    pub fn from_json_str(json: &str) -> Result<Self, EcsError> {
        let options: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;
        Self::from_options(&options)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EcsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialise to the flat JSON object form, derived keys included.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            KEY_TILE_PIXEL_WIDTH: self.tile_pixel_width,
            KEY_TILE_PIXEL_HEIGHT: self.tile_pixel_height,
            KEY_CHUNK_TILE_WIDTH: self.chunk_tile_width,
            KEY_CHUNK_TILE_HEIGHT: self.chunk_tile_height,
            KEY_CHUNK_PIXEL_WIDTH: self.chunk_pixel_width(),
            KEY_CHUNK_PIXEL_HEIGHT: self.chunk_pixel_height(),
        })
    }

    /// Write the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EcsError> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check that every extent is positive and that chunk pixel extents do
    /// not overflow.
    pub fn validate(&self) -> Result<(), EcsError> {
        let fields = [
            (KEY_TILE_PIXEL_WIDTH, self.tile_pixel_width),
            (KEY_TILE_PIXEL_HEIGHT, self.tile_pixel_height),
            (KEY_CHUNK_TILE_WIDTH, self.chunk_tile_width),
            (KEY_CHUNK_TILE_HEIGHT, self.chunk_tile_height),
        ];
        for (key, value) in fields {
            if value == 0 {
                return Err(EcsError::InvalidConfig {
                    key: key.to_owned(),
                    reason: "must be greater than zero".to_owned(),
                });
            }
        }
        let derived = [
            (KEY_CHUNK_PIXEL_WIDTH, self.chunk_tile_width, self.tile_pixel_width),
            (KEY_CHUNK_PIXEL_HEIGHT, self.chunk_tile_height, self.tile_pixel_height),
        ];
        for (key, tiles, pixels) in derived {
            if tiles.checked_mul(pixels).is_none() {
                return Err(EcsError::InvalidConfig {
                    key: key.to_owned(),
                    reason: format!("{tiles} tiles of {pixels} pixels overflows a u32"),
                });
            }
        }
        Ok(())
    }

    /// Chunk width in pixels.
    pub fn chunk_pixel_width(&self) -> u32 {
        self.chunk_tile_width * self.tile_pixel_width
    }

    /// Chunk height in pixels.
    pub fn chunk_pixel_height(&self) -> u32 {
        self.chunk_tile_height * self.tile_pixel_height
    }

    /// Tile extents as a vector.
    pub fn tile_size(&self) -> Vec2 {
        Vec2::new(self.tile_pixel_width as f32, self.tile_pixel_height as f32)
    }

    /// Chunk containing the world-space point `p` (floor division).
    pub fn chunk_coord_for(&self, p: Vec2) -> ChunkCoord {
        ChunkCoord::new(
            (p.x / self.chunk_pixel_width() as f32).floor() as i32,
            (p.y / self.chunk_pixel_height() as f32).floor() as i32,
        )
    }
}

fn positive_integer(key: &str, value: &serde_json::Value) -> Result<u32, EcsError> {
    value
        .as_u64()
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| EcsError::InvalidConfig {
            key: key.to_owned(),
            reason: format!("expected an integer greater than zero, got {value}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
