//! ----------------------------------------------------------------------------
//!  Visplanes
//!
//!  ▸ During the BSP walk, every subsector whose floor or ceiling can be seen
//!    asks for a plane keyed by (height, flat, light).  The wall code then
//!    records, per screen column, the rows of that plane left uncovered.
//!  ▸ After the walk the column ranges are turned into horizontal spans with
//!    perspective-correct texture steps and fed to the [`Rasterizer`].
//! ----------------------------------------------------------------------------

use std::collections::HashMap;

use crate::{
    engine::{context::RendererContext, lighting::{ZLights, z_light_index}},
    math::{ANGLETOFINESHIFT, Fixed, fine_cosine, fine_sine, fixed_mul},
    renderer::{PlaneSpan, Rasterizer, SkyColumn},
    world::{FlatId, TextureTable},
};

pub type VisplaneId = u16;

/// Column not touched by this plane.
pub const UNUSED: u16 = u16::MAX;

/// Sky columns index a 256-wide texture by view angle.
const ANGLETOSKYSHIFT: u32 = 22;

/// One floor or ceiling surface visible somewhere on screen.
#[derive(Clone, Debug)]
pub struct Visplane {
    pub height: Fixed,
    pub flat: FlatId,
    pub light: i16,

    /// Inclusive horizontal range; `min_x > max_x` while empty.
    pub min_x: i32,
    pub max_x: i32,

    /// Uncovered rows per column, `top[x] == UNUSED` when untouched.
    pub top: Vec<u16>,
    pub bottom: Vec<u16>,
}

impl Visplane {
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    /// `(top, bottom)` of column `x`, untouched outside the plane's range.
    #[inline]
    fn column(&self, x: i32) -> (i32, i32) {
        if x < self.min_x || x > self.max_x {
            (UNUSED as i32, 0)
        } else {
            (self.top[x as usize] as i32, self.bottom[x as usize] as i32)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlaneKey {
    height: Fixed,
    flat: FlatId,
    light: i16,
}

/// Every plane of the current frame, in creation order.
#[derive(Debug, Default)]
pub struct PlaneMap {
    map: HashMap<PlaneKey, Vec<VisplaneId>>,
    planes: Vec<Visplane>,
    width: usize,
}

impl PlaneMap {
    pub(crate) fn resize(&mut self, width: usize) {
        self.width = width;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.planes.clear();
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn get(&self, id: VisplaneId) -> Option<&Visplane> {
        self.planes.get(id as usize)
    }

    pub fn get_mut(&mut self, id: VisplaneId) -> Option<&mut Visplane> {
        self.planes.get_mut(id as usize)
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Visplane> + '_ {
        self.planes.iter()
    }

    fn push(&mut self, key: PlaneKey, min_x: i32, max_x: i32) -> VisplaneId {
        let id = self.planes.len() as VisplaneId;
        self.planes.push(Visplane {
            height: key.height,
            flat: key.flat,
            light: key.light,
            min_x,
            max_x,
            top: vec![UNUSED; self.width],
            bottom: vec![0; self.width],
        });
        self.map.entry(key).or_default().push(id);
        id
    }

    /// Plane for a surface at `height` with `flat` lit at `light`.  The sky
    /// is a single plane whatever its height or light.
    pub fn find_plane(&mut self, height: Fixed, flat: FlatId, light: i16, is_sky: bool) -> VisplaneId {
        let key = if is_sky {
            PlaneKey { height: 0, flat, light: 0 }
        } else {
            PlaneKey { height, flat, light }
        };

        if let Some(&id) = self.map.get(&key).and_then(|ids| ids.first()) {
            return id;
        }
        self.push(key, self.width as i32, -1)
    }

    /// Make plane `id` cover columns `start ..= stop`.
    ///
    /// Widens the plane in place when none of the overlapping columns have
    /// been marked yet; otherwise starts a new plane with the same key and
    /// returns its id.
    pub fn check_plane(&mut self, id: VisplaneId, start: i32, stop: i32) -> VisplaneId {
        let Some(pl) = self.planes.get_mut(id as usize) else {
            return id;
        };

        let (intrl, unionl) = if start < pl.min_x { (pl.min_x, start) } else { (start, pl.min_x) };
        let (intrh, unionh) = if stop > pl.max_x { (pl.max_x, stop) } else { (stop, pl.max_x) };

        let overlap = (intrl..=intrh).any(|x| pl.top[x as usize] != UNUSED);
        if !overlap {
            pl.min_x = unionl;
            pl.max_x = unionh;
            // use the same one
            return id;
        }

        let key = PlaneKey { height: pl.height, flat: pl.flat, light: pl.light };
        self.push(key, start, stop)
    }
}

/*──────────────────── After BSP traversal ────────────────────*/

/// Per-plane constants of the span mapper.
struct SpanSetup {
    flat: FlatId,
    plane_height: Fixed,
    lights: ZLights,
}

impl RendererContext {
    /// Emit every visplane as sky columns or flat spans.
    pub(crate) fn draw_planes<R: Rasterizer + ?Sized>(&mut self, textures: &TextureTable, sink: &mut R) {
        let planes = std::mem::take(&mut self.planes);
        let mut span_start = vec![0i32; self.view_height as usize];

        for pl in planes.iter().filter(|pl| !pl.is_empty()) {
            if textures.is_sky(pl.flat) {
                self.draw_sky(pl, sink);
                continue;
            }

            let setup = SpanSetup {
                flat: pl.flat,
                plane_height: pl.height.wrapping_sub(self.view.z).wrapping_abs(),
                lights: *self.plane_lights(pl.light),
            };

            for x in pl.min_x..=pl.max_x + 1 {
                let (t1, b1) = pl.column(x - 1);
                let (t2, b2) = pl.column(x);
                self.make_spans(&setup, &mut span_start, x, (t1, b1), (t2, b2), sink);
            }
        }

        self.planes = planes;
    }

    fn draw_sky<R: Rasterizer + ?Sized>(&mut self, pl: &Visplane, sink: &mut R) {
        for x in pl.min_x..=pl.max_x {
            let (y_top, y_bottom) = pl.column(x);
            if y_top > y_bottom {
                continue;
            }
            let angle = self.view.angle.wrapping_add(self.x_to_view_angle[x as usize]);
            sink.sky_column(&SkyColumn {
                x,
                y_top,
                y_bottom,
                texture_column: (angle >> ANGLETOSKYSHIFT) as i32,
            });
            self.stats.sky_columns += 1;
        }
    }

    /// Close the spans that end before column `x` and open the ones that
    /// start at it.
    fn make_spans<R: Rasterizer + ?Sized>(
        &mut self,
        setup: &SpanSetup,
        span_start: &mut [i32],
        x: i32,
        (mut t1, mut b1): (i32, i32),
        (mut t2, mut b2): (i32, i32),
        sink: &mut R,
    ) {
        while t1 < t2 && t1 <= b1 {
            self.map_plane(setup, t1, span_start[t1 as usize], x - 1, sink);
            t1 += 1;
        }
        while b1 > b2 && b1 >= t1 {
            self.map_plane(setup, b1, span_start[b1 as usize], x - 1, sink);
            b1 -= 1;
        }
        while t2 < t1 && t2 <= b2 {
            span_start[t2 as usize] = x;
            t2 += 1;
        }
        while b2 > b1 && b2 >= t2 {
            span_start[b2 as usize] = x;
            b2 -= 1;
        }
    }

    /// One span of row `y` from `x1` to `x2`.
    fn map_plane<R: Rasterizer + ?Sized>(&mut self, setup: &SpanSetup, y: i32, x1: i32, x2: i32, sink: &mut R) {
        let distance = fixed_mul(setup.plane_height, self.y_slope[y as usize]);
        let length = fixed_mul(distance, self.dist_scale[x1 as usize]);
        let angle = (self.view.angle.wrapping_add(self.x_to_view_angle[x1 as usize]) >> ANGLETOFINESHIFT) as usize;

        sink.plane_span(&PlaneSpan {
            y,
            x1,
            x2,
            flat: setup.flat,
            x_frac: self.view.x.wrapping_add(fixed_mul(fine_cosine(angle), length)),
            y_frac: self.view.y.wrapping_neg().wrapping_sub(fixed_mul(fine_sine(angle), length)),
            x_step: fixed_mul(distance, self.base_x_scale),
            y_step: fixed_mul(distance, self.base_y_scale),
            colormap: self.colormap(setup.lights[z_light_index(distance)]),
        });
        self.stats.plane_spans += 1;
    }
}
