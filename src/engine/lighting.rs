//! Diminishing light.
//!
//! Light never reaches the pixels as a number: every lookup ends in a
//! colormap index `0 ..= 31` (0 = full bright) that the rasterizer uses to
//! pick a row of its colormap.  Walls are shaded by their projected scale,
//! floors and ceilings by their distance along the view direction.

use crate::{
    engine::context::{RenderError, RendererContext},
    math::{FRACUNIT, Fixed, fixed_div},
    world::Vertex,
};

pub const NUMCOLORMAPS: i32 = 32;

/// Sector light levels are bucketed into this many steps.
pub const LIGHTLEVELS: usize = 16;
pub const LIGHTSEGSHIFT: i32 = 4;

pub const MAXLIGHTSCALE: usize = 48;
pub const LIGHTSCALESHIFT: i32 = 12;

pub const MAXLIGHTZ: usize = 128;
pub const LIGHTZSHIFT: i32 = 20;

/// Distance divisor applied to both tables.
const DISTMAP: i32 = 2;

/// Width the light falloff is calibrated for.  Both tables scale against
/// this constant rather than the configured width, so a wall or floor at a
/// given distance gets the same colormap at every resolution.
pub const LIGHT_SCREEN_WIDTH: i32 = 320;

pub type ScaleLights = [u8; MAXLIGHTSCALE];
pub type ZLights = [u8; MAXLIGHTZ];

/// Colormap index tables for the current view size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LightTables {
    /// `[light level][distance bucket]`, floors and ceilings.
    pub z_light: Vec<ZLights>,
    /// `[light level][scale bucket]`, walls.
    pub scale_light: Vec<ScaleLights>,
}

#[inline]
fn start_map(level: usize) -> i32 {
    ((LIGHTLEVELS - 1 - level) as i32 * 2) * NUMCOLORMAPS / LIGHTLEVELS as i32
}

#[inline]
fn clamp_map(level: i32) -> u8 {
    level.clamp(0, NUMCOLORMAPS - 1) as u8
}

impl LightTables {
    /// `view_width << detail_shift` is the width actually covered by the
    /// 3D view.
    pub fn build(view_width: i32, detail_shift: u32) -> Result<Self, RenderError> {
        let half = (LIGHT_SCREEN_WIDTH / 2) * FRACUNIT;
        let covered = (view_width << detail_shift).max(1);

        let mut z_light = vec![[0u8; MAXLIGHTZ]; LIGHTLEVELS];
        let mut scale_light = vec![[0u8; MAXLIGHTSCALE]; LIGHTLEVELS];

        for (i, (zrow, srow)) in z_light.iter_mut().zip(scale_light.iter_mut()).enumerate() {
            let start = start_map(i);

            for (j, slot) in zrow.iter_mut().enumerate() {
                let scale = fixed_div(half, ((j + 1) as Fixed) << LIGHTZSHIFT)? >> LIGHTSCALESHIFT;
                *slot = clamp_map(start - scale / DISTMAP);
            }

            for (j, slot) in srow.iter_mut().enumerate() {
                let fade = j as i32 * LIGHT_SCREEN_WIDTH / covered / DISTMAP;
                *slot = clamp_map(start - fade);
            }
        }

        Ok(Self { z_light, scale_light })
    }

    fn row(level: i32) -> usize {
        level.clamp(0, LIGHTLEVELS as i32 - 1) as usize
    }
}

/// Scale-light bucket of a wall column's scale.
#[inline(always)]
pub fn scale_light_index(scale: Fixed) -> usize {
    ((scale >> LIGHTSCALESHIFT).max(0) as usize).min(MAXLIGHTSCALE - 1)
}

/// Z-light bucket of a plane row's distance.
#[inline(always)]
pub fn z_light_index(distance: Fixed) -> usize {
    ((distance >> LIGHTZSHIFT).max(0) as usize).min(MAXLIGHTZ - 1)
}

impl RendererContext {
    pub fn light_tables(&self) -> &LightTables {
        &self.lights
    }

    /// Scale-light row for a wall of a sector lit at `light_level`.
    ///
    /// Walls running exactly east-west are one level darker and walls
    /// running exactly north-south one level brighter, so corners read on
    /// otherwise evenly lit rooms.
    pub fn wall_lights(&self, light_level: i16, v1: &Vertex, v2: &Vertex) -> &ScaleLights {
        let mut level = (light_level as i32 >> LIGHTSEGSHIFT) + self.view.extra_light;
        if v1.y == v2.y {
            level -= 1;
        } else if v1.x == v2.x {
            level += 1;
        }
        &self.lights.scale_light[LightTables::row(level)]
    }

    /// Z-light row for a floor or ceiling lit at `light_level`.
    pub fn plane_lights(&self, light_level: i16) -> &ZLights {
        let level = (light_level as i32 >> LIGHTSEGSHIFT) + self.view.extra_light;
        &self.lights.z_light[LightTables::row(level)]
    }

    /// `fixed_colormap` wins over any table lookup.
    #[inline(always)]
    pub(crate) fn colormap(&self, looked_up: u8) -> u8 {
        self.view.fixed_colormap.unwrap_or(looked_up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ViewConfig;
    use crate::math::to_fixed;
    use crate::world::Viewpoint;

    fn tables() -> LightTables {
        LightTables::build(320, 0).unwrap()
    }

    fn vtx(x: i32, y: i32) -> Vertex {
        Vertex { x: to_fixed(x), y: to_fixed(y) }
    }

    #[test]
    fn z_light_reference_values() {
        let t = tables();
        assert_eq!(t.z_light.len(), LIGHTLEVELS);
        assert_eq!(t.z_light[0][0], 0);
        assert_eq!(t.z_light[0][127], 31);
        assert_eq!(t.z_light[8][127], 28);
        assert_eq!(t.z_light[8][40], 27);
        assert!(t.z_light[15].iter().all(|&m| m == 0));
    }

    #[test]
    fn scale_light_reference_values() {
        let t = tables();
        assert_eq!(t.scale_light[15][0], 0);
        assert_eq!(t.scale_light[0][0], 31);
        assert_eq!(t.scale_light[8][47], 5);
        assert_eq!(t.scale_light[10][6], 17);
    }

    #[test]
    fn tables_darken_with_distance() {
        let t = tables();
        for row in &t.z_light {
            // larger bucket = farther away = darker (higher index)
            assert!(row.windows(2).all(|w| w[0] <= w[1]));
        }
        for row in &t.scale_light {
            // larger scale = nearer = brighter
            assert!(row.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn low_detail_uses_the_covered_width() {
        assert_eq!(LightTables::build(160, 1).unwrap(), tables());
    }

    #[test]
    fn z_light_ignores_the_view_width() {
        let wide = LightTables::build(640, 0).unwrap();
        assert_eq!(wide.z_light, tables().z_light);
        // walls project twice as large at 640 columns, so the same bucket
        // fades half as fast
        assert_eq!(wide.scale_light[8][47], clamp_map(start_map(8) - 47 * 320 / 640 / DISTMAP));
        assert_eq!(wide.scale_light[10][6], tables().scale_light[10][3]);
    }

    #[test]
    fn context_tables_follow_the_light_width() {
        let ctx = RendererContext::with_view(ViewConfig { width: 640, height: 400, detail_shift: 0 }).unwrap();
        assert_eq!(ctx.light_tables().z_light, tables().z_light);
    }

    #[test]
    fn buckets_saturate() {
        assert_eq!(scale_light_index(0), 0);
        assert_eq!(scale_light_index(FRACUNIT), 16);
        assert_eq!(scale_light_index(64 * FRACUNIT), MAXLIGHTSCALE - 1);
        assert_eq!(z_light_index(to_fixed(16)), 1);
        assert_eq!(z_light_index(Fixed::MAX), MAXLIGHTZ - 1);
        assert_eq!(z_light_index(-5), 0);
    }

    #[test]
    fn fake_contrast() {
        let ctx = RendererContext::with_view(ViewConfig::default()).unwrap();
        let t = ctx.light_tables().clone();
        // 160 >> 4 = row 10
        assert_eq!(ctx.wall_lights(160, &vtx(0, 0), &vtx(64, 0)), &t.scale_light[9]);
        assert_eq!(ctx.wall_lights(160, &vtx(0, 0), &vtx(0, 64)), &t.scale_light[11]);
        assert_eq!(ctx.wall_lights(160, &vtx(0, 0), &vtx(64, 64)), &t.scale_light[10]);
        // clamped at both ends
        assert_eq!(ctx.wall_lights(255, &vtx(0, 0), &vtx(0, 64)), &t.scale_light[15]);
        assert_eq!(ctx.wall_lights(0, &vtx(0, 0), &vtx(64, 0)), &t.scale_light[0]);
    }

    #[test]
    fn extra_light_and_fixed_colormap() {
        let mut ctx = RendererContext::with_view(ViewConfig::default()).unwrap();
        let t = ctx.light_tables().clone();
        let mut view = Viewpoint::new(0, 0, 0, 0);
        view.extra_light = 2;
        ctx.setup_frame(&view);
        assert_eq!(ctx.plane_lights(100), &t.z_light[8]);
        assert_eq!(ctx.plane_lights(250), &t.z_light[15]);
        assert_eq!(ctx.colormap(7), 7);

        view.fixed_colormap = Some(0);
        ctx.setup_frame(&view);
        assert_eq!(ctx.colormap(7), 0);
    }
}
