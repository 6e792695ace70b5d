//! Viewpoint-relative angles and distances, the column ↔ angle tables and
//! the per-column wall scale.  All integer, all wrapping where angles are
//! concerned.

use crate::{
    engine::context::{HALF_FINE, RenderError, RendererContext},
    math::{
        ANG90, ANG180, ANG270, ANGLETOFINESHIFT, Angle, DBITS, FINEANGLES, FRACBITS, FRACUNIT, Fixed,
        fine_sine, fine_tangent, fixed_div, fixed_mul, slope_div, tan_to_angle,
    },
};

/// Horizontal field of view in fine angles (90°).
pub const FIELD_OF_VIEW: usize = 2048;

const MIN_SCALE: Fixed = 256;
const MAX_SCALE: Fixed = 64 * FRACUNIT;

/// Angle of `(x, y)` seen from `(vx, vy)`.
///
/// Reduces to the first octant, looks the slope up in `tan_to_angle` and
/// maps the result back.  `0` when the points coincide.
pub fn angle_between(vx: Fixed, vy: Fixed, x: Fixed, y: Fixed) -> Angle {
    let x = x.wrapping_sub(vx);
    let y = y.wrapping_sub(vy);
    if x == 0 && y == 0 {
        return 0;
    }

    let (ax, ay) = (x.unsigned_abs(), y.unsigned_abs());
    let tta = |num: u32, den: u32| tan_to_angle(slope_div(num, den));

    match (x >= 0, y >= 0, ax > ay) {
        // octant 0
        (true, true, true) => tta(ay, ax),
        // octant 1
        (true, true, false) => (ANG90 - 1).wrapping_sub(tta(ax, ay)),
        // octant 8
        (true, false, true) => tta(ay, ax).wrapping_neg(),
        // octant 7
        (true, false, false) => ANG270.wrapping_add(tta(ax, ay)),
        // octant 3
        (false, true, true) => (ANG180 - 1).wrapping_sub(tta(ay, ax)),
        // octant 2
        (false, true, false) => ANG90.wrapping_add(tta(ax, ay)),
        // octant 4
        (false, false, true) => ANG180.wrapping_add(tta(ay, ax)),
        // octant 5
        (false, false, false) => (ANG270 - 1).wrapping_sub(tta(ax, ay)),
    }
}

/// Angle from `(x1, y1)` to `(x2, y2)`, independent of the viewpoint.
#[inline]
pub fn point_to_angle2(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Angle {
    angle_between(x1, y1, x2, y2)
}

impl RendererContext {
    /// Angle of `(x, y)` as seen from the current viewpoint.
    #[inline]
    pub fn point_to_angle(&self, x: Fixed, y: Fixed) -> Angle {
        angle_between(self.view.x, self.view.y, x, y)
    }

    /// Distance from the viewpoint to `(x, y)` without a square root:
    /// `dx / sin(atan(dy/dx) + 90°)` with `dx >= dy`.
    pub fn point_to_dist(&self, x: Fixed, y: Fixed) -> Fixed {
        let mut dx = x.wrapping_sub(self.view.x).wrapping_abs();
        let mut dy = y.wrapping_sub(self.view.y).wrapping_abs();
        if dy > dx {
            std::mem::swap(&mut dx, &mut dy);
        }
        if dx == 0 {
            return 0;
        }

        // dy <= dx, so the slope is at most one
        let slope = fixed_div(dy, dx).unwrap_or(FRACUNIT);
        let angle = tan_to_angle((slope >> DBITS) as usize).wrapping_add(ANG90) >> ANGLETOFINESHIFT;
        // sine of 90°..135° is never zero
        fixed_div(dx, fine_sine(angle as usize)).unwrap_or(Fixed::MAX)
    }

    /// Texture scale of the screen column at `vis_angle` on a wall whose
    /// normal is `normal_angle` and whose perpendicular distance from the
    /// viewer is `distance`.
    ///
    /// Clamped to `[256, 64 * FRACUNIT]`; when the wall is seen nearly edge
    /// on the division is skipped and the upper bound is returned.
    pub fn scale_from_global_angle(&self, vis_angle: Angle, normal_angle: Angle, distance: Fixed) -> Fixed {
        let angle_a = ANG90.wrapping_add(vis_angle.wrapping_sub(self.view.angle));
        let angle_b = ANG90.wrapping_add(vis_angle.wrapping_sub(normal_angle));

        // both sines are always positive
        let sine_a = fine_sine((angle_a >> ANGLETOFINESHIFT) as usize);
        let sine_b = fine_sine((angle_b >> ANGLETOFINESHIFT) as usize);
        let num = fixed_mul(self.projection, sine_b) << self.detail_shift;
        let den = fixed_mul(distance, sine_a);

        if den > num >> FRACBITS {
            match fixed_div(num, den) {
                Ok(scale) => scale.clamp(MIN_SCALE, MAX_SCALE),
                Err(_) => MAX_SCALE,
            }
        } else {
            MAX_SCALE
        }
    }

    /// Build `view_angle_to_x`, `x_to_view_angle` and `clip_angle` for the
    /// current view width.
    pub(crate) fn init_texture_mapping(&mut self) -> Result<(), RenderError> {
        let width = self.view_width;

        // Use tangent table to generate viewangletox: the screen column
        // each fine angle of the forward half circle lands on.
        let focal = fixed_div(self.center_x_frac, fine_tangent(FINEANGLES / 4 + FIELD_OF_VIEW / 2))?;

        self.view_angle_to_x = (0..HALF_FINE)
            .map(|i| {
                let tan = fine_tangent(i);
                if tan > FRACUNIT * 2 {
                    -1
                } else if tan < -FRACUNIT * 2 {
                    width + 1
                } else {
                    let t = fixed_mul(tan, focal);
                    let t = (self.center_x_frac - t + FRACUNIT - 1) >> FRACBITS;
                    t.clamp(-1, width + 1)
                }
            })
            .collect();

        // Scan viewangletox[] to generate xtoviewangle[]: the smallest
        // view angle that maps to each column.
        self.x_to_view_angle = (0..=width)
            .map(|x| {
                let i = self
                    .view_angle_to_x
                    .iter()
                    .position(|&t| t <= x)
                    .unwrap_or(HALF_FINE - 1);
                ((i as Angle) << ANGLETOFINESHIFT).wrapping_sub(ANG90)
            })
            .collect();

        // Take out the fencepost cases from viewangletox.
        for t in self.view_angle_to_x.iter_mut() {
            if *t == -1 {
                *t = 0;
            } else if *t == width + 1 {
                *t = width;
            }
        }

        self.clip_angle = self.x_to_view_angle[0];
        Ok(())
    }

    /// Screen column of a view-relative angle already clipped to
    /// `±clip_angle`.
    #[inline(always)]
    pub(crate) fn angle_to_x(&self, relative: Angle) -> i32 {
        self.view_angle_to_x[(relative.wrapping_add(ANG90) >> ANGLETOFINESHIFT) as usize & (HALF_FINE - 1)]
    }
}
