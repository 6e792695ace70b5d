use crate::math::{Angle, Fixed, fine_angle, fine_cosine, fine_sine, fixed_mul, to_fixed};
use crate::world::geometry::{Level, Thing};

/// Eye height above the floor of the sector the viewer stands in.
pub const VIEW_HEIGHT: Fixed = to_fixed(41);

/// Player view-point in map space.
///
/// * Only the **yaw** is simulated; Doom never tilts up/down.
/// * `z` is the absolute eye height, not relative to the floor.
/// * Angles wrap: `0` = east, counter-clockwise positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewpoint {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    /// Added to every light level (gun flashes).
    pub extra_light: i32,
    /// Forces one colormap for the whole view (invulnerability, goggles).
    pub fixed_colormap: Option<u8>,
}

impl Viewpoint {
    pub fn new(x: Fixed, y: Fixed, z: Fixed, angle: Angle) -> Self {
        Self {
            x,
            y,
            z,
            angle,
            extra_light: 0,
            fixed_colormap: None,
        }
    }

    /// Stand on `thing`, eyes `VIEW_HEIGHT` above its sector's floor.
    pub fn at_thing(level: &Level, thing: &Thing) -> Self {
        let floor = level
            .sectors
            .get(thing.sector as usize)
            .map_or(0, |s| s.floor_height);
        Self::new(thing.x, thing.y, floor.wrapping_add(VIEW_HEIGHT), thing.angle)
    }

    #[inline(always)]
    pub fn sin(&self) -> Fixed {
        fine_sine(fine_angle(self.angle))
    }

    #[inline(always)]
    pub fn cos(&self) -> Fixed {
        fine_cosine(fine_angle(self.angle))
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Rotate around Z (positive = turn left).
    pub fn turn(&mut self, delta: Angle) {
        self.angle = self.angle.wrapping_add(delta);
    }

    /// Move `forward` map units (fixed point) along the facing direction.
    pub fn step(&mut self, forward: Fixed) {
        self.x = self.x.wrapping_add(fixed_mul(forward, self.cos()));
        self.y = self.y.wrapping_add(fixed_mul(forward, self.sin()));
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
