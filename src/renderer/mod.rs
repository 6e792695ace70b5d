//! Rasterizer seam.
//!
//! *The engine never touches a pixel buffer.*  It walks the BSP, decides
//! what is visible and hands per-column wall pieces, floor/ceiling spans
//! and sky columns to a type implementing [`Rasterizer`], front to back.
//!
//! * Any `FnMut(&WallColumn)` is a rasterizer that ignores planes.
//! * [`FrameLog`] records everything, for tools and tests.

use crate::math::Fixed;
use crate::world::{FlatId, TextureId};

/// Which part of a wall a column piece belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClipKind {
    /// Middle texture of a one-sided wall.
    Solid,
    /// Upper texture of a two-sided wall (front ceiling above back ceiling).
    Upper,
    /// Lower texture of a two-sided wall (back floor above front floor).
    Lower,
}

/// One vertical strip of wall, `y_top ..= y_bottom` in column `x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WallColumn {
    pub x: i32,
    pub y_top: i32,
    pub y_bottom: i32,
    pub kind: ClipKind,
    pub texture: TextureId,
    /// Texel column, before wrapping to the texture width.
    pub texture_column: i32,
    /// Texture row at the screen centre line.
    pub texture_mid: Fixed,
    /// Texels per screen pixel (`0xffff_ffff / scale`).
    pub iscale: u32,
    pub colormap: u8,
}

/// One horizontal run of a floor or ceiling on row `y`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaneSpan {
    pub y: i32,
    pub x1: i32,
    pub x2: i32,
    pub flat: FlatId,
    /// Map position of the texel under `x1`.
    pub x_frac: Fixed,
    pub y_frac: Fixed,
    /// Map step per screen pixel.
    pub x_step: Fixed,
    pub y_step: Fixed,
    pub colormap: u8,
}

/// One column of sky, `y_top ..= y_bottom`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkyColumn {
    pub x: i32,
    pub y_top: i32,
    pub y_bottom: i32,
    /// Column of the sky texture (view angle in 1024ths of a turn).
    pub texture_column: i32,
}

/// Consumer of the engine's per-frame output.
pub trait Rasterizer {
    fn wall_column(&mut self, col: &WallColumn);

    fn plane_span(&mut self, _span: &PlaneSpan) {}

    fn sky_column(&mut self, _col: &SkyColumn) {}
}

impl<F: FnMut(&WallColumn)> Rasterizer for F {
    fn wall_column(&mut self, col: &WallColumn) {
        self(col)
    }
}

/// Rasterizer that keeps every piece it is given.
#[derive(Debug, Default)]
pub struct FrameLog {
    pub walls: Vec<WallColumn>,
    pub spans: Vec<PlaneSpan>,
    pub sky: Vec<SkyColumn>,
}

impl FrameLog {
    pub fn clear(&mut self) {
        self.walls.clear();
        self.spans.clear();
        self.sky.clear();
    }

    /// Columns that received at least one wall piece.
    pub fn wall_coverage(&self, width: usize) -> Vec<bool> {
        let mut seen = vec![false; width];
        for c in &self.walls {
            if let Some(s) = seen.get_mut(c.x as usize) {
                *s = true;
            }
        }
        seen
    }
}

impl Rasterizer for FrameLog {
    fn wall_column(&mut self, col: &WallColumn) {
        self.walls.push(col.clone());
    }

    fn plane_span(&mut self, span: &PlaneSpan) {
        self.spans.push(span.clone());
    }

    fn sky_column(&mut self, col: &SkyColumn) {
        self.sky.push(col.clone());
    }
}
