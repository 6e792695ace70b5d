//! The geometry core: BSP walk, wall projection, visplanes and lighting.
//!
//! Everything mutable lives in [`RendererContext`]; its methods are spread
//! over the submodules by concern.

mod bsp;
mod context;
mod lighting;
mod projection;
mod types;
mod visplane;
mod walls;

pub use context::{RenderError, RenderPhase, RendererContext, ViewConfig};
pub use lighting::{
    LIGHT_SCREEN_WIDTH, LIGHTLEVELS, LightTables, MAXLIGHTSCALE, MAXLIGHTZ, NUMCOLORMAPS, ScaleLights, ZLights,
    scale_light_index, z_light_index,
};
pub use projection::{FIELD_OF_VIEW, angle_between, point_to_angle2};
pub use types::{ClipRange, DrawSeg, FrameStats, Silhouette};
pub use visplane::{PlaneMap, UNUSED, Visplane, VisplaneId};

/*====================================================================*/
/*                          Frame tests                                */
/*====================================================================*/
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::math::{ANG180, to_fixed};
    use crate::renderer::{ClipKind, FrameLog};
    use crate::wad::{Wad, level::testmap, load_level_by_name, raw::testwad};
    use crate::world::{Level, LineFlags, Viewpoint, sample_table};

    fn load(map: &testmap::MapBytes) -> Level {
        let tmp = testwad::write(b"IWAD", &map.lumps("E1M1"));
        let wad = Wad::from_file(tmp.path()).unwrap();
        load_level_by_name(&wad, "E1M1", &sample_table()).unwrap()
    }

    /// 256×256 room, single subsector, no nodes.
    pub(crate) fn square_level() -> Level {
        load(&testmap::square_room())
    }

    /// Room A (x 0..256) and a raised, sky-lit room B (x 256..512).
    pub(crate) fn two_rooms_level() -> Level {
        load(&testmap::two_rooms())
    }

    /// `square_level` stretched from -32000 to 32000: wall heights no
    /// longer fit in 16.16 relative to the eye.
    pub(crate) fn tall_level() -> Level {
        load(&testmap::square_room_spanning(-32000, 32000))
    }

    fn render(level: &Level, view: Viewpoint, config: ViewConfig) -> (RendererContext, FrameLog, FrameStats) {
        let mut ctx = RendererContext::with_view(config).unwrap();
        let mut log = FrameLog::default();
        let stats = ctx.render_player_view(level, &sample_table(), &view, &mut log).unwrap();
        (ctx, log, stats)
    }

    fn eye(x: i32, y: i32, floor: i32, angle: u32) -> Viewpoint {
        Viewpoint::new(to_fixed(x), to_fixed(y), to_fixed(floor + 41), angle)
    }

    #[test]
    fn square_room_fills_every_column() {
        let level = square_level();
        let (ctx, log, stats) = render(&level, eye(128, 128, 0, 0), ViewConfig::default());

        assert!(log.wall_coverage(320).iter().all(|&c| c));
        assert!(log.walls.iter().all(|w| w.kind == ClipKind::Solid && w.texture == 1));
        // everything is behind one solid range now
        assert_eq!(ctx.solid_segs(), &[ClipRange { first: -0x7fff_ffff, last: 0x7fff_ffff }]);
        assert_eq!(ctx.phase(), RenderPhase::TablesBuilt);

        assert_eq!(stats.nodes_visited, 0);
        assert_eq!(stats.subsectors, 1);
        assert_eq!(stats.wall_columns, log.walls.len());
        assert_eq!(stats.wall_ranges, ctx.draw_segs().len());
        assert!(ctx.draw_segs().iter().all(|d| d.silhouette == Silhouette::all()));
    }

    #[test]
    fn square_room_wall_and_floor_rows() {
        let level = square_level();
        let (_, log, stats) = render(&level, eye(128, 128, 0, 0), ViewConfig::default());

        // the east wall is 128 units ahead: scale 1.25, ceiling 87 above
        // the eye and the floor 41 below
        let mid = log.walls.iter().find(|w| w.x == 160).unwrap();
        assert_eq!((mid.y_top, mid.y_bottom), (0, 151));
        assert_eq!(mid.texture_mid, to_fixed(87));

        // ceiling is hidden above the wall top, the floor takes rows
        // 152..200 across the whole width
        assert_eq!(stats.visplanes, 2);
        assert_eq!(log.spans.len(), 48);
        assert!(log.spans.iter().all(|s| (s.x1, s.x2) == (0, 319) && s.flat == 0));
        assert!(log.sky.is_empty());
    }

    #[test]
    fn extreme_heights_wrap_instead_of_panicking() {
        let level = tall_level();
        for z in [-32000, 32000 - 41 - 41] {
            let (ctx, _, stats) = render(&level, eye(128, 128, z, 0), ViewConfig::default());
            assert_eq!(stats.subsectors, 1);
            assert!(stats.wall_ranges >= 1);
            assert_eq!(ctx.solid_segs(), &[ClipRange { first: -0x7fff_ffff, last: 0x7fff_ffff }]);
            assert_eq!(ctx.phase(), RenderPhase::TablesBuilt);
        }
    }

    #[test]
    fn two_rooms_step_and_sky() {
        let level = two_rooms_level();
        let (_, log, stats) = render(&level, eye(64, 128, 0, 0), ViewConfig::default());

        assert!(log.wall_coverage(320).iter().all(|&c| c));
        assert_eq!(stats.nodes_visited, 1);
        assert_eq!(stats.subsectors, 2);
        assert_eq!(stats.bbox_rejects, 0);

        let upper: Vec<_> = log.walls.iter().filter(|w| w.kind == ClipKind::Upper).collect();
        let lower: Vec<_> = log.walls.iter().filter(|w| w.kind == ClipKind::Lower).collect();
        assert!(!upper.is_empty() && upper.iter().all(|w| w.texture == 1));
        assert!(!lower.is_empty() && lower.iter().all(|w| w.texture == 2));
        // the step sits between the two pieces in every column
        for (u, l) in upper.iter().zip(&lower) {
            assert_eq!(u.x, l.x);
            assert!(u.y_bottom < l.y_top);
        }

        // room B's ceiling is sky
        assert!(!log.sky.is_empty());
        assert_eq!(stats.sky_columns, log.sky.len());
        assert!(log.sky.iter().all(|s| s.y_top <= s.y_bottom));
    }

    #[test]
    fn far_room_behind_the_viewer_is_culled() {
        let level = two_rooms_level();
        let (_, log, stats) = render(&level, eye(64, 128, 0, ANG180), ViewConfig::default());

        assert!(log.wall_coverage(320).iter().all(|&c| c));
        assert_eq!(stats.subsectors, 1);
        assert_eq!(stats.bbox_rejects, 1);
        assert!(log.sky.is_empty());
    }

    #[test]
    fn low_detail_covers_half_the_columns() {
        let level = square_level();
        let config = ViewConfig { detail_shift: 1, ..ViewConfig::default() };
        let (ctx, log, _) = render(&level, eye(128, 128, 0, 0), config);
        assert_eq!(ctx.view_width(), 160);
        assert!(log.wall_coverage(160).iter().all(|&c| c));
        assert!(log.walls.iter().all(|w| w.x < 160));
    }

    #[test]
    fn frames_are_repeatable_and_leave_the_level_alone() {
        let level = two_rooms_level();
        let table = sample_table();
        let view = eye(100, 100, 0, 0x1234_5678);

        let mut ctx = RendererContext::with_view(ViewConfig::default()).unwrap();
        let mut first = FrameLog::default();
        let mut second = FrameLog::default();
        let a = ctx.render_player_view(&level, &table, &view, &mut first).unwrap();
        let b = ctx.render_player_view(&level, &table, &view, &mut second).unwrap();

        assert_eq!(a, b);
        assert_eq!(first.walls, second.walls);
        assert_eq!(first.spans, second.spans);
        assert_eq!(first.sky, second.sky);
        assert_eq!(ctx.framecount(), 2);

        assert!(level.lines.iter().all(|l| !l.flags.contains(LineFlags::MAPPED) && l.validcount == 0));
        assert!(level.sectors.iter().all(|s| s.validcount == 0));
    }

    #[test]
    fn fixed_colormap_overrides_lighting() {
        let level = square_level();
        let mut view = eye(128, 128, 0, 0);
        view.fixed_colormap = Some(0);
        let (_, log, _) = render(&level, view, ViewConfig::default());
        assert!(log.walls.iter().all(|w| w.colormap == 0));
        assert!(log.spans.iter().all(|s| s.colormap == 0));
    }

    #[test]
    fn closures_are_rasterizers() {
        let level = square_level();
        let mut ctx = RendererContext::with_view(ViewConfig::default()).unwrap();
        let mut columns = 0;
        let mut count = |_: &crate::renderer::WallColumn| columns += 1;
        let stats = ctx
            .render_player_view(&level, &sample_table(), &eye(128, 128, 0, 0), &mut count)
            .unwrap();
        assert_eq!(columns, stats.wall_columns);
    }
}
