//! ----------------------------------------------------------------------------
//! **BSP front-to-back traversal**
//!
//! Responsible for
//! * walking the node tree nearest child first, skipping far children whose
//!   bounding box is off screen or already hidden behind solid walls
//! * back-face culling segs and mapping the survivors to screen columns
//! * keeping `solid_segs`, the sorted list of column ranges fully covered by
//!   one-sided walls or closed doors
//!
//! Every column range that is still visible goes to
//! `RendererContext::store_wall_range` in `walls`.
//! ----------------------------------------------------------------------------

use crate::{
    engine::{
        context::RendererContext,
        types::ClipRange,
        visplane::VisplaneId,
        walls::CurrentSeg,
    },
    math::{ANG180, Angle},
    renderer::Rasterizer,
    world::{BBox, BOXBOTTOM, BOXLEFT, BOXRIGHT, BOXTOP, Child, Level, SegId, SubsectorId, TextureTable},
};

/// Corners of a bounding box (indices into `BBox`) that bound it
/// angularly, for each position of the viewer relative to the box.
const CHECKCOORD: [[usize; 4]; 11] = [
    [3, 0, 2, 1],
    [3, 0, 2, 0],
    [3, 1, 2, 0],
    [0, 0, 0, 0],
    [2, 0, 2, 1],
    [0, 0, 0, 0],
    [3, 1, 3, 0],
    [0, 0, 0, 0],
    [2, 0, 3, 1],
    [2, 1, 3, 1],
    [2, 1, 3, 0],
];

/// Floor and ceiling planes of the subsector being drawn.  A split in
/// `check_plane` replaces them for the remaining segs.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SubsectorPlanes {
    pub floor: Option<VisplaneId>,
    pub ceiling: Option<VisplaneId>,
}

impl RendererContext {
    /// Two sentinels that cover everything off screen, so the list walks
    /// never run off either end.
    pub(crate) fn clear_clip_segs(&mut self) {
        self.solid_segs.clear();
        self.solid_segs.push(ClipRange { first: -0x7fff_ffff, last: -1 });
        self.solid_segs.push(ClipRange { first: self.view_width, last: 0x7fff_ffff });
    }

    /// Walk `child`, nearest side first.
    pub(crate) fn render_bsp_node<R: Rasterizer + ?Sized>(
        &mut self,
        level: &Level,
        textures: &TextureTable,
        child: Child,
        sink: &mut R,
    ) {
        let id = match child {
            Child::Subsector(ss) => return self.render_subsector(level, textures, ss, sink),
            Child::Node(id) => id,
        };
        let Some(node) = level.nodes.get(id as usize) else {
            return;
        };
        self.stats.nodes_visited += 1;

        // Decide which side the view point is on.
        let side = node.point_on_side(self.view.x, self.view.y).index();

        // Recursively divide front space.
        self.render_bsp_node(level, textures, node.children[side], sink);

        // Possibly divide back space.
        if self.check_bbox(&node.bbox[side ^ 1]) {
            self.render_bsp_node(level, textures, node.children[side ^ 1], sink);
        } else {
            self.stats.bbox_rejects += 1;
        }
    }

    /// Open the subsector's planes and clip each of its segs.
    fn render_subsector<R: Rasterizer + ?Sized>(
        &mut self,
        level: &Level,
        textures: &TextureTable,
        id: SubsectorId,
        sink: &mut R,
    ) {
        let Some(sub) = level.subsectors.get(id as usize) else {
            return;
        };
        let Some(front) = level.sectors.get(sub.sector as usize) else {
            return;
        };
        self.stats.subsectors += 1;

        let floor = (front.floor_height < self.view.z).then(|| {
            self.planes.find_plane(
                front.floor_height,
                front.floor_pic,
                front.light_level,
                textures.is_sky(front.floor_pic),
            )
        });

        let ceiling_sky = textures.is_sky(front.ceiling_pic);
        let ceiling = (front.ceiling_height > self.view.z || ceiling_sky).then(|| {
            self.planes.find_plane(front.ceiling_height, front.ceiling_pic, front.light_level, ceiling_sky)
        });

        let mut planes = SubsectorPlanes { floor, ceiling };
        for seg in sub.seg_range() {
            self.add_line(level, textures, seg as SegId, &mut planes, sink);
        }
    }

    /// Clip a view-relative angle pair to `±clip_angle`.
    ///
    /// `None` when the whole span lies outside the field of view.
    fn clip_to_view(&self, mut angle1: Angle, mut angle2: Angle, span: Angle) -> Option<(Angle, Angle)> {
        let clip = self.clip_angle;
        let double = clip.wrapping_mul(2);

        let tspan = angle1.wrapping_add(clip);
        if tspan > double {
            // totally off the left edge?
            if tspan - double >= span {
                return None;
            }
            angle1 = clip;
        }

        let tspan = clip.wrapping_sub(angle2);
        if tspan > double {
            // totally off the right edge?
            if tspan - double >= span {
                return None;
            }
            angle2 = clip.wrapping_neg();
        }
        Some((angle1, angle2))
    }

    /// `true` if some part of `bbox` may be visible.
    pub(crate) fn check_bbox(&self, bbox: &BBox) -> bool {
        let (vx, vy) = (self.view.x, self.view.y);

        // Find the corners of the box that define the edges from current
        // viewpoint.
        let boxx = if vx <= bbox[BOXLEFT] {
            0
        } else if vx < bbox[BOXRIGHT] {
            1
        } else {
            2
        };
        let boxy = if vy >= bbox[BOXTOP] {
            0
        } else if vy > bbox[BOXBOTTOM] {
            1
        } else {
            2
        };

        let boxpos = (boxy << 2) + boxx;
        if boxpos == 5 {
            // inside the box
            return true;
        }

        let [a, b, c, d] = CHECKCOORD[boxpos];
        let angle1 = self.point_to_angle(bbox[a], bbox[b]).wrapping_sub(self.view.angle);
        let angle2 = self.point_to_angle(bbox[c], bbox[d]).wrapping_sub(self.view.angle);

        // Sitting on a line?
        let span = angle1.wrapping_sub(angle2);
        if span >= ANG180 {
            return true;
        }

        let Some((angle1, angle2)) = self.clip_to_view(angle1, angle2, span) else {
            return false;
        };

        // Find the first clippost that touches the source post (adjacent
        // pixels are touching).
        let sx1 = self.angle_to_x(angle1);
        let sx2 = self.angle_to_x(angle2);

        // Does not cross a pixel.
        if sx1 == sx2 {
            return false;
        }
        let sx2 = sx2 - 1;

        match self.solid_segs.iter().find(|s| s.last >= sx2) {
            // The clippost contains the new span.
            Some(s) => !(sx1 >= s.first && sx2 <= s.last),
            None => true,
        }
    }

    /// Back-face cull `seg`, map it to columns and hand the columns that
    /// are not already covered to the wall code.
    fn add_line<R: Rasterizer + ?Sized>(
        &mut self,
        level: &Level,
        textures: &TextureTable,
        id: SegId,
        planes: &mut SubsectorPlanes,
        sink: &mut R,
    ) {
        let Some(seg) = level.segs.get(id as usize) else {
            return;
        };
        self.stats.segs_checked += 1;

        let (v1, v2) = level.seg_vertices(seg);
        let angle1 = self.point_to_angle(v1.x, v1.y);
        let angle2 = self.point_to_angle(v2.x, v2.y);

        // Back side? I.e. backface culling?
        let span = angle1.wrapping_sub(angle2);
        if span >= ANG180 {
            return;
        }

        let cur = CurrentSeg { level, textures, id, seg, angle1 };

        let rel1 = angle1.wrapping_sub(self.view.angle);
        let rel2 = angle2.wrapping_sub(self.view.angle);
        let Some((rel1, rel2)) = self.clip_to_view(rel1, rel2, span) else {
            return;
        };

        let x1 = self.angle_to_x(rel1);
        let x2 = self.angle_to_x(rel2);

        // Does not cross a pixel?
        if x1 == x2 {
            return;
        }

        let front = &level.sectors[seg.front_sector as usize];
        let back = match seg.back_sector.and_then(|b| level.sectors.get(b as usize)) {
            // Single sided line?
            None => return self.clip_solid_wall_segment(&cur, planes, x1, x2 - 1, sink),
            Some(back) => back,
        };

        // Closed door.
        if back.ceiling_height <= front.floor_height || back.floor_height >= front.ceiling_height {
            return self.clip_solid_wall_segment(&cur, planes, x1, x2 - 1, sink);
        }

        // Window.
        if back.ceiling_height != front.ceiling_height || back.floor_height != front.floor_height {
            return self.clip_pass_wall_segment(&cur, planes, x1, x2 - 1, sink);
        }

        // Reject empty lines used for triggers and special events: identical
        // floor and ceiling on both sides, identical light levels on both
        // sides, and no middle texture.
        let mid = level.sides.get(seg.side as usize).map_or(0, |s| s.mid_texture);
        if back.ceiling_pic == front.ceiling_pic
            && back.floor_pic == front.floor_pic
            && back.light_level == front.light_level
            && mid == 0
        {
            return;
        }

        self.clip_pass_wall_segment(&cur, planes, x1, x2 - 1, sink);
    }

    /// Draw the parts of `first ..= last` not yet covered and mark the
    /// whole range solid.
    pub(crate) fn clip_solid_wall_segment<R: Rasterizer + ?Sized>(
        &mut self,
        cur: &CurrentSeg,
        planes: &mut SubsectorPlanes,
        first: i32,
        last: i32,
        sink: &mut R,
    ) {
        // Find the first range that touches the range (adjacent pixels are
        // touching).
        let start = self.solid_segs.iter().position(|s| s.last >= first - 1).unwrap_or(0);

        if first < self.solid_segs[start].first {
            if last < self.solid_segs[start].first - 1 {
                // Post is entirely visible (above start), so insert a new
                // clippost.
                self.store_wall_range(cur, planes, first, last, sink);
                self.solid_segs.insert(start, ClipRange { first, last });
                return;
            }

            // There is a fragment above *start.
            let upto = self.solid_segs[start].first - 1;
            self.store_wall_range(cur, planes, first, upto, sink);
            // Now adjust the clip size.
            self.solid_segs[start].first = first;
        }

        // Bottom contained in start?
        if last <= self.solid_segs[start].last {
            return;
        }

        let mut next = start;
        loop {
            let following = self.solid_segs[next + 1];
            if last < following.first - 1 {
                break;
            }
            // There is a fragment between two posts.
            let from = self.solid_segs[next].last + 1;
            self.store_wall_range(cur, planes, from, following.first - 1, sink);
            next += 1;

            if last <= self.solid_segs[next].last {
                // Bottom is contained in next.  Adjust the clip size.
                self.solid_segs[start].last = self.solid_segs[next].last;
                self.crunch(start, next);
                return;
            }
        }

        // There is a fragment after *next.
        let from = self.solid_segs[next].last + 1;
        self.store_wall_range(cur, planes, from, last, sink);
        // Adjust the clip size.
        self.solid_segs[start].last = last;
        self.crunch(start, next);
    }

    /// Remove the posts swallowed by `start`.
    fn crunch(&mut self, start: usize, next: usize) {
        if next > start {
            self.solid_segs.drain(start + 1..=next);
        }
    }

    /// Draw the parts of `first ..= last` not yet covered; the range stays
    /// open for whatever lies behind (windows, steps).
    pub(crate) fn clip_pass_wall_segment<R: Rasterizer + ?Sized>(
        &mut self,
        cur: &CurrentSeg,
        planes: &mut SubsectorPlanes,
        first: i32,
        last: i32,
        sink: &mut R,
    ) {
        let mut start = self.solid_segs.iter().position(|s| s.last >= first - 1).unwrap_or(0);

        if first < self.solid_segs[start].first {
            if last < self.solid_segs[start].first - 1 {
                // Post is entirely visible (above start).
                self.store_wall_range(cur, planes, first, last, sink);
                return;
            }

            // There is a fragment above *start.
            let upto = self.solid_segs[start].first - 1;
            self.store_wall_range(cur, planes, first, upto, sink);
        }

        // Bottom contained in start?
        if last <= self.solid_segs[start].last {
            return;
        }

        while last >= self.solid_segs[start + 1].first - 1 {
            // There is a fragment between two posts.
            let from = self.solid_segs[start].last + 1;
            let upto = self.solid_segs[start + 1].first - 1;
            self.store_wall_range(cur, planes, from, upto, sink);
            start += 1;

            if last <= self.solid_segs[start].last {
                return;
            }
        }

        // There is a fragment after *next.
        let from = self.solid_segs[start].last + 1;
        self.store_wall_range(cur, planes, from, last, sink);
    }
}
