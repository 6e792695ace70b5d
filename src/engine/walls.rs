//! Wall ranges: from a clipped column range of one seg to per-column wall
//! pieces, floor/ceiling marks and updated clip arrays.

use crate::{
    engine::{
        bsp::SubsectorPlanes,
        context::RendererContext,
        lighting::{MAXLIGHTSCALE, ScaleLights, scale_light_index},
        types::{DrawSeg, Silhouette},
        visplane::VisplaneId,
    },
    math::{ANG90, ANG180, ANGLETOFINESHIFT, Angle, FRACBITS, Fixed, fine_sine, fine_tangent, fixed_mul},
    renderer::{ClipKind, Rasterizer, WallColumn},
    world::{Level, LineFlags, NO_TEXTURE, Sector, Seg, SegId, TextureId, TextureTable},
};

/// Wall heights are kept with four fewer fraction bits so the per-column
/// steps do not overflow.
const HEIGHTBITS: i32 = 12;
const HEIGHTUNIT: Fixed = 1 << HEIGHTBITS;
const HEIGHTSHIFT: i32 = FRACBITS - HEIGHTBITS;

/// The seg `add_line` is clipping, with the angle of its first vertex.
pub(crate) struct CurrentSeg<'a> {
    pub level: &'a Level,
    pub textures: &'a TextureTable,
    pub id: SegId,
    pub seg: &'a Seg,
    pub angle1: Angle,
}

/// Upper or lower piece of a two-sided wall.
#[derive(Clone, Copy, Debug)]
struct Tier {
    texture: TextureId,
    texture_mid: Fixed,
    /// Screen row of the edge toward the back sector (`HEIGHTBITS` fraction).
    pix: Fixed,
    pix_step: Fixed,
}

/// Per-range state of `render_seg_loop`.
struct WallRange {
    start: i32,
    stop: i32,

    scale: Fixed,
    scale_step: Fixed,
    top_frac: Fixed,
    top_step: Fixed,
    bottom_frac: Fixed,
    bottom_step: Fixed,

    mid: Option<(TextureId, Fixed)>,
    upper: Option<Tier>,
    lower: Option<Tier>,

    textured: bool,
    offset: Fixed,
    center_angle: Angle,
    distance: Fixed,
    lights: ScaleLights,

    floor: Option<VisplaneId>,
    ceiling: Option<VisplaneId>,
}

impl RendererContext {
    /// Set up texture mapping, lighting and plane marking for columns
    /// `start ..= stop` of `cur`, draw them, and record a `DrawSeg`.
    pub(crate) fn store_wall_range<R: Rasterizer + ?Sized>(
        &mut self,
        cur: &CurrentSeg,
        planes: &mut SubsectorPlanes,
        start: i32,
        stop: i32,
        sink: &mut R,
    ) {
        let (level, textures, seg) = (cur.level, cur.textures, cur.seg);
        if start > stop || start < 0 || stop >= self.view_width {
            return;
        }
        let (Some(side), Some(line), Some(front)) = (
            level.sides.get(seg.side as usize),
            level.lines.get(seg.line as usize),
            level.sectors.get(seg.front_sector as usize),
        ) else {
            return;
        };
        let back: Option<&Sector> = seg.back_sector.and_then(|b| level.sectors.get(b as usize));
        self.stats.wall_ranges += 1;

        // calculate rw_distance for scale calculation
        let normal = seg.angle.wrapping_add(ANG90);
        let offset_angle = (normal.wrapping_sub(cur.angle1) as i32).unsigned_abs().min(ANG90);
        let dist_angle = ANG90 - offset_angle;
        let (v1, v2) = level.seg_vertices(seg);
        let hyp = self.point_to_dist(v1.x, v1.y);
        let distance = fixed_mul(hyp, fine_sine((dist_angle >> ANGLETOFINESHIFT) as usize));

        // calculate scale at both ends and step
        let scale1 = self.scale_from_global_angle(
            self.view.angle.wrapping_add(self.x_to_view_angle[start as usize]),
            normal,
            distance,
        );
        let (scale2, scale_step) = if stop > start {
            let scale2 = self.scale_from_global_angle(
                self.view.angle.wrapping_add(self.x_to_view_angle[stop as usize]),
                normal,
                distance,
            );
            (scale2, scale2.wrapping_sub(scale1) / (stop - start))
        } else {
            (scale1, 0)
        };

        // calculate texture boundaries and decide if floor / ceiling marks
        // are needed
        let view_z = self.view.z;
        let mut world_top = front.ceiling_height.wrapping_sub(view_z);
        let world_bottom = front.floor_height.wrapping_sub(view_z);
        let front_sky = textures.is_sky(front.ceiling_pic);

        let mut mid = None;
        let mut top_texture = NO_TEXTURE;
        let mut bottom_texture = NO_TEXTURE;
        let (mut top_mid, mut bottom_mid) = (0, 0);
        let (mut world_high, mut world_low) = (0, 0);

        let mut silhouette = Silhouette::empty();
        let mut bsil_height = 0;
        let mut tsil_height = 0;

        let (mut mark_floor, mut mark_ceiling) = match back {
            None => {
                // single sided line
                let texture_mid = if line.flags.contains(LineFlags::LOWER_UNPEGGED) {
                    // bottom of texture at bottom
                    front
                        .floor_height
                        .wrapping_add(textures.texture_height(side.mid_texture))
                        .wrapping_sub(view_z)
                } else {
                    // top of texture at top
                    world_top
                };
                mid = Some((side.mid_texture, texture_mid.wrapping_add(side.row_offset)));

                silhouette = Silhouette::all();
                bsil_height = Fixed::MAX;
                tsil_height = Fixed::MIN;
                (true, true)
            }
            Some(back) => {
                if front.floor_height > back.floor_height {
                    silhouette |= Silhouette::BOTTOM;
                    bsil_height = front.floor_height;
                } else if back.floor_height > view_z {
                    silhouette |= Silhouette::BOTTOM;
                    bsil_height = Fixed::MAX;
                }

                if front.ceiling_height < back.ceiling_height {
                    silhouette |= Silhouette::TOP;
                    tsil_height = front.ceiling_height;
                } else if back.ceiling_height < view_z {
                    silhouette |= Silhouette::TOP;
                    tsil_height = Fixed::MIN;
                }

                let closed = back.ceiling_height <= front.floor_height || back.floor_height >= front.ceiling_height;
                if back.ceiling_height <= front.floor_height {
                    bsil_height = Fixed::MAX;
                    silhouette |= Silhouette::BOTTOM;
                }
                if back.floor_height >= front.ceiling_height {
                    tsil_height = Fixed::MIN;
                    silhouette |= Silhouette::TOP;
                }

                world_high = back.ceiling_height.wrapping_sub(view_z);
                world_low = back.floor_height.wrapping_sub(view_z);

                // hack to allow height changes in outdoor areas
                if front_sky && textures.is_sky(back.ceiling_pic) {
                    world_top = world_high;
                }

                let same_light = back.light_level == front.light_level;
                let mark_floor =
                    closed || world_low != world_bottom || back.floor_pic != front.floor_pic || !same_light;
                let mark_ceiling =
                    closed || world_high != world_top || back.ceiling_pic != front.ceiling_pic || !same_light;

                if world_high < world_top {
                    // top texture visible
                    top_texture = side.top_texture;
                    top_mid = if line.flags.contains(LineFlags::UPPER_UNPEGGED) {
                        world_top
                    } else {
                        // bottom of texture
                        back
                            .ceiling_height
                            .wrapping_add(textures.texture_height(side.top_texture))
                            .wrapping_sub(view_z)
                    };
                }
                if world_low > world_bottom {
                    // bottom texture visible
                    bottom_texture = side.bottom_texture;
                    bottom_mid = if line.flags.contains(LineFlags::LOWER_UNPEGGED) {
                        // bottom of texture at bottom, top of texture at top
                        world_top
                    } else {
                        world_low
                    };
                }
                top_mid = top_mid.wrapping_add(side.row_offset);
                bottom_mid = bottom_mid.wrapping_add(side.row_offset);

                (mark_floor, mark_ceiling)
            }
        };

        let textured = mid.is_some_and(|(t, _)| t != NO_TEXTURE)
            || top_texture != NO_TEXTURE
            || bottom_texture != NO_TEXTURE;

        let mut offset = 0;
        let mut center_angle = 0;
        let mut lights = [0u8; MAXLIGHTSCALE];
        if textured {
            let rel = normal.wrapping_sub(cur.angle1);
            let angle = if rel > ANG180 { rel.wrapping_neg() } else { rel }.min(ANG90);
            offset = fixed_mul(hyp, fine_sine((angle >> ANGLETOFINESHIFT) as usize));
            if rel < ANG180 {
                offset = -offset;
            }
            offset = offset.wrapping_add(side.texture_offset).wrapping_add(seg.offset);
            center_angle = ANG90.wrapping_add(self.view.angle).wrapping_sub(normal);
            lights = *self.wall_lights(front.light_level, v1, v2);
        }

        // if a floor / ceiling plane is on the wrong side of the view
        // plane, it is definitely invisible and doesn't need to be marked
        if front.floor_height >= view_z {
            // above view plane
            mark_floor = false;
        }
        if front.ceiling_height <= view_z && !front_sky {
            // below view plane
            mark_ceiling = false;
        }

        // calculate incremental stepping values for texture edges
        let center = self.center_y_frac >> HEIGHTSHIFT;
        let world_top = world_top >> HEIGHTSHIFT;
        let world_bottom = world_bottom >> HEIGHTSHIFT;

        let tier = |texture: TextureId, texture_mid: Fixed, world: Fixed| Tier {
            texture,
            texture_mid,
            pix: center.wrapping_sub(fixed_mul(world >> HEIGHTSHIFT, scale1)),
            pix_step: fixed_mul(scale_step, world >> HEIGHTSHIFT).wrapping_neg(),
        };
        let upper = (top_texture != NO_TEXTURE).then(|| tier(top_texture, top_mid, world_high));
        let lower = (bottom_texture != NO_TEXTURE).then(|| tier(bottom_texture, bottom_mid, world_low));

        // render it
        if mark_ceiling {
            if let Some(id) = planes.ceiling {
                planes.ceiling = Some(self.planes.check_plane(id, start, stop));
            }
        }
        if mark_floor {
            if let Some(id) = planes.floor {
                planes.floor = Some(self.planes.check_plane(id, start, stop));
            }
        }

        let mut range = WallRange {
            start,
            stop,
            scale: scale1,
            scale_step,
            top_frac: center.wrapping_sub(fixed_mul(world_top, scale1)),
            top_step: fixed_mul(scale_step, world_top).wrapping_neg(),
            bottom_frac: center.wrapping_sub(fixed_mul(world_bottom, scale1)),
            bottom_step: fixed_mul(scale_step, world_bottom).wrapping_neg(),
            mid: mid.filter(|&(t, _)| t != NO_TEXTURE),
            upper,
            lower,
            textured,
            offset,
            center_angle,
            distance,
            lights,
            floor: planes.floor.filter(|_| mark_floor),
            ceiling: planes.ceiling.filter(|_| mark_ceiling),
        };
        self.render_seg_loop(&mut range, sink);

        self.draw_segs.push(DrawSeg {
            seg: cur.id,
            x1: start,
            x2: stop,
            scale1,
            scale2,
            scale_step,
            silhouette,
            bsil_height,
            tsil_height,
        });
    }

    /// Draw one wall range column by column.
    ///
    /// Each column marks the rows of the floor/ceiling planes left open
    /// between the clip arrays and the wall, emits the wall pieces, then
    /// narrows the clip arrays.  A middle texture closes the column.
    fn render_seg_loop<R: Rasterizer + ?Sized>(&mut self, r: &mut WallRange, sink: &mut R) {
        for x in r.start..=r.stop {
            let col = x as usize;
            let ceiling_clip = self.ceiling_clip[col];
            let floor_clip = self.floor_clip[col];

            // mark floor / ceiling areas
            // no space above wall?
            let yl = (r.top_frac.wrapping_add(HEIGHTUNIT - 1) >> HEIGHTBITS).max(ceiling_clip + 1);

            if let Some(pl) = r.ceiling.and_then(|id| self.planes.get_mut(id)) {
                let top = ceiling_clip + 1;
                let bottom = (yl - 1).min(floor_clip - 1);
                if top <= bottom {
                    pl.top[col] = top as u16;
                    pl.bottom[col] = bottom as u16;
                }
            }

            let yh = (r.bottom_frac >> HEIGHTBITS).min(floor_clip - 1);

            if let Some(pl) = r.floor.and_then(|id| self.planes.get_mut(id)) {
                let top = (yh + 1).max(ceiling_clip + 1);
                let bottom = floor_clip - 1;
                if top <= bottom {
                    pl.top[col] = top as u16;
                    pl.bottom[col] = bottom as u16;
                }
            }

            // texturecolumn and lighting are independent of wall tiers
            let mut piece = WallColumn {
                x,
                y_top: yl,
                y_bottom: yh,
                kind: ClipKind::Solid,
                texture: NO_TEXTURE,
                texture_column: 0,
                texture_mid: 0,
                iscale: 0,
                colormap: 0,
            };
            if r.textured {
                let angle = r.center_angle.wrapping_add(self.x_to_view_angle[col]) >> ANGLETOFINESHIFT;
                let column = r.offset.wrapping_sub(fixed_mul(fine_tangent(angle as usize), r.distance));
                piece.texture_column = column >> FRACBITS;
                piece.colormap = self.colormap(r.lights[scale_light_index(r.scale)]);
                piece.iscale = 0xffff_ffff / (r.scale.max(1) as u32);
            }

            if let Some((texture, texture_mid)) = r.mid {
                // single sided line
                if yl <= yh {
                    self.emit(sink, &WallColumn { texture, texture_mid, ..piece });
                }
                self.ceiling_clip[col] = self.view_height;
                self.floor_clip[col] = -1;
            } else {
                // two sided line
                match r.upper.as_mut() {
                    Some(upper) => {
                        let mid = (upper.pix >> HEIGHTBITS).min(floor_clip - 1);
                        upper.pix = upper.pix.wrapping_add(upper.pix_step);
                        if mid >= yl {
                            self.emit(sink, &WallColumn {
                                y_bottom: mid,
                                kind: ClipKind::Upper,
                                texture: upper.texture,
                                texture_mid: upper.texture_mid,
                                ..piece
                            });
                            self.ceiling_clip[col] = mid;
                        } else {
                            self.ceiling_clip[col] = yl - 1;
                        }
                    }
                    // no top wall
                    None if r.ceiling.is_some() => self.ceiling_clip[col] = yl - 1,
                    None => {}
                }

                let ceiling_clip = self.ceiling_clip[col];
                match r.lower.as_mut() {
                    Some(lower) => {
                        let mid = (lower.pix.wrapping_add(HEIGHTUNIT - 1) >> HEIGHTBITS).max(ceiling_clip + 1);
                        lower.pix = lower.pix.wrapping_add(lower.pix_step);
                        if mid <= yh {
                            self.emit(sink, &WallColumn {
                                y_top: mid,
                                kind: ClipKind::Lower,
                                texture: lower.texture,
                                texture_mid: lower.texture_mid,
                                ..piece
                            });
                            self.floor_clip[col] = mid;
                        } else {
                            self.floor_clip[col] = yh + 1;
                        }
                    }
                    // no bottom wall
                    None if r.floor.is_some() => self.floor_clip[col] = yh + 1,
                    None => {}
                }
            }

            r.scale = r.scale.wrapping_add(r.scale_step);
            r.top_frac = r.top_frac.wrapping_add(r.top_step);
            r.bottom_frac = r.bottom_frac.wrapping_add(r.bottom_step);
        }
    }

    #[inline(always)]
    fn emit<R: Rasterizer + ?Sized>(&mut self, sink: &mut R, col: &WallColumn) {
        sink.wall_column(col);
        self.stats.wall_columns += 1;
    }
}
