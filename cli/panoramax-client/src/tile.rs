//! Vector map tiles.
//!
//! The `/map/{z}/{x}/{y}.mvt` endpoint serves Mapbox vector tiles.
//! Decoding them is left to a [TileDecoder] supplied by the caller.

use std::f64::consts::PI;

use crate::types::PicturePoint;

pub type TileDecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Turns the bytes of a vector tile into the picture points it contains.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, tile: &[u8]) -> Result<Vec<PicturePoint>, TileDecodeError>;
}

impl<F> TileDecoder for F
where
    F: Fn(&[u8]) -> Result<Vec<PicturePoint>, TileDecodeError> + Send + Sync,
{
    fn decode(&self, tile: &[u8]) -> Result<Vec<PicturePoint>, TileDecodeError> {
        self(tile)
    }
}

/// Web mercator tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinates {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoordinates {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// The tile at zoom `z` covering `(lon, lat)`.
    ///
    /// Latitudes beyond the mercator limit are clamped to the edge tiles.
    pub fn containing(lon: f64, lat: f64, z: u32) -> Self {
        let tiles = 2f64.powi(z as i32);
        let max_index = tiles - 1.0;
        let lat = lat.to_radians();
        let x = ((lon + 180.0) / 360.0 * tiles).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * tiles).floor();
        Self {
            z,
            x: x.clamp(0.0, max_index) as u32,
            y: if y.is_nan() {
                0
            } else {
                y.clamp(0.0, max_index) as u32
            },
        }
    }
}
