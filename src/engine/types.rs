use bitflags::bitflags;

use crate::math::Fixed;
use crate::world::SegId;

/// Inclusive range of screen columns already covered by solid walls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRange {
    pub first: i32,
    pub last: i32,
}

bitflags! {
    /// Which sides of a wall range occlude things behind it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Silhouette: u8 {
        const BOTTOM = 0x1;
        const TOP    = 0x2;
    }
}

/// One stored wall range, kept for clipping whatever is drawn after the
/// walls.
#[derive(Clone, Debug)]
pub struct DrawSeg {
    pub seg: SegId,
    pub x1: i32,
    pub x2: i32,
    pub scale1: Fixed,
    pub scale2: Fixed,
    pub scale_step: Fixed,
    pub silhouette: Silhouette,
    /// Do not clip things below this height.
    pub bsil_height: Fixed,
    /// Do not clip things above this height.
    pub tsil_height: Fixed,
}

/// Counters for one `render_player_view` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub nodes_visited: usize,
    pub bbox_rejects: usize,
    pub subsectors: usize,
    pub segs_checked: usize,
    pub wall_ranges: usize,
    pub wall_columns: usize,
    pub visplanes: usize,
    pub plane_spans: usize,
    pub sky_columns: usize,
}
