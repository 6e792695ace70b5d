// ──────────────────────────────────────────────────────────────────────────
// wad/loader.rs
//
//  *   RawLevel   (wad::level)           ──╮
//  *   TextureTable (names → handles)      │   --->  world::Level
//                                          ╯         (fixed point, grouped)
// ──────────────────────────────────────────────────────────────────────────

use log::{debug, info};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    math::{ANG45, Angle, FRACBITS, Fixed, fixed_div, to_fixed},
    wad::level::{self as raw_level, RawLevel},
    wad::raw::{Wad, WadError},
    world::{
        BBox, BOXBOTTOM, BOXLEFT, BOXRIGHT, BOXTOP, BlockmapOrigin, Child, Level, Line, LineFlags,
        Node, Sector, Seg, Side, SlopeType, Subsector, TextureTable, Thing, Vertex,
    },
};

/// Largest thing radius; sector block boxes are grown by it.
const MAXRADIUS: Fixed = to_fixed(32);
/// Blockmap cells are 128 units wide.
const MAPBLOCKSHIFT: i32 = FRACBITS + 7;

/*──────────────────────────── Error type ───────────────────────────*/

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Wad(#[from] WadError),

    #[error(transparent)]
    Level(#[from] raw_level::LevelError),

    #[error("{kind} {index} references {target} {value}, which does not exist")]
    BadReference {
        kind: &'static str,
        index: usize,
        target: &'static str,
        value: i32,
    },

    #[error("map `{0}` has no subsectors")]
    NoSubsectors(String),
}

/// Range-check a raw reference and narrow it to a table id.
fn check_ref(
    kind: &'static str,
    index: usize,
    target: &'static str,
    value: i32,
    len: usize,
) -> Result<u16, LoadError> {
    match usize::try_from(value) {
        Ok(v) if v < len => Ok(v as u16),
        _ => Err(LoadError::BadReference {
            kind,
            index,
            target,
            value,
        }),
    }
}

#[inline(always)]
fn fixed(v: i16) -> Fixed {
    to_fixed(v as i32)
}

/*====================================================================*/
/*                       Public API                                   */
/*====================================================================*/

/// Load the map at directory index `marker` into a runtime `Level`.
/// Texture and flat names are resolved through `textures`; unknown names
/// become handle 0.
pub fn load_level(wad: &Wad, marker: usize, textures: &TextureTable) -> Result<Level, LoadError> {
    let raw = wad.parse_level(marker)?;
    build_level(raw, textures)
}

/// Same as [`load_level`], addressed by marker name (`E1M1`, `MAP01`).
pub fn load_level_by_name(wad: &Wad, name: &str, textures: &TextureTable) -> Result<Level, LoadError> {
    load_level(wad, wad.require(name)?, textures)
}

/// Convert decoded lumps, in the order the tables depend on each other.
pub fn build_level(raw: RawLevel, textures: &TextureTable) -> Result<Level, LoadError> {
    let vertices: Vec<Vertex> = raw
        .vertices
        .iter()
        .map(|v| Vertex {
            x: fixed(v.x),
            y: fixed(v.y),
        })
        .collect();

    let mut sectors: Vec<Sector> = raw
        .sectors
        .iter()
        .map(|s| Sector {
            floor_height: fixed(s.floor_h),
            ceiling_height: fixed(s.ceil_h),
            floor_pic: textures.flat_num(Wad::lump_name_str(&s.floor_tex)),
            ceiling_pic: textures.flat_num(Wad::lump_name_str(&s.ceil_tex)),
            light_level: s.light,
            special: s.special,
            tag: s.tag,
            sound_traversed: 0,
            validcount: 0,
            bbox: BBox::EMPTY,
            blockbox: [0; 4],
            sound_origin: (0, 0),
            lines: SmallVec::new(),
            things: Vec::new(),
        })
        .collect();

    let sides = raw
        .sidedefs
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Ok(Side {
                texture_offset: fixed(s.x_off),
                row_offset: fixed(s.y_off),
                top_texture: textures.texture_num(Wad::lump_name_str(&s.top_tex)),
                bottom_texture: textures.texture_num(Wad::lump_name_str(&s.bottom_tex)),
                mid_texture: textures.texture_num(Wad::lump_name_str(&s.mid_tex)),
                sector: check_ref("sidedef", i, "sector", s.sector as i32, sectors.len())?,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    let lines = raw
        .linedefs
        .iter()
        .enumerate()
        .map(|(i, l)| line_from(i, l, &vertices, &sides))
        .collect::<Result<Vec<_>, LoadError>>()?;

    if raw.subsectors.is_empty() {
        return Err(LoadError::NoSubsectors(raw.name));
    }

    let nodes = raw
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| node_from(i, n, raw.nodes.len(), raw.subsectors.len()))
        .collect::<Result<Vec<_>, LoadError>>()?;

    let segs = raw
        .segs
        .iter()
        .enumerate()
        .map(|(i, s)| seg_from(i, s, vertices.len(), &lines, &sides))
        .collect::<Result<Vec<_>, LoadError>>()?;

    // P_GroupLines: a subsector's sector is the one its first seg faces.
    let subsectors = raw
        .subsectors
        .iter()
        .enumerate()
        .map(|(i, ss)| {
            let first = check_ref("subsector", i, "seg", ss.first_seg as i32, segs.len())?;
            let count = ss.seg_count.max(0) as usize;
            if count == 0 || first as usize + count > segs.len() {
                return Err(LoadError::BadReference {
                    kind: "subsector",
                    index: i,
                    target: "seg run",
                    value: ss.first_seg as i32 + ss.seg_count as i32,
                });
            }
            Ok(Subsector {
                sector: segs[first as usize].front_sector,
                num_segs: count as u16,
                first_seg: first,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    let blockmap = raw.blockmap.map(|b| BlockmapOrigin {
        x: fixed(b.origin_x),
        y: fixed(b.origin_y),
        columns: b.columns as i32,
        rows: b.rows as i32,
    });

    group_lines(&mut sectors, &lines, &vertices, blockmap);

    let mut level = Level {
        name: raw.name,
        things: Vec::new(),
        vertices,
        lines,
        sides,
        sectors,
        subsectors,
        segs,
        nodes,
        blockmap,
    };

    spawn_things(&mut level, &raw.things);

    info!(
        "{}: {} vertices, {} lines, {} sides, {} sectors, {} subsectors, {} segs, {} nodes, {} things",
        level.name,
        level.vertices.len(),
        level.lines.len(),
        level.sides.len(),
        level.sectors.len(),
        level.subsectors.len(),
        level.segs.len(),
        level.nodes.len(),
        level.things.len()
    );
    Ok(level)
}

/*====================================================================*/
/*                  Raw → runtime helpers (local)                     */
/*====================================================================*/

fn line_from(i: usize, r: &raw_level::RawLinedef, vertices: &[Vertex], sides: &[Side]) -> Result<Line, LoadError> {
    let v1 = check_ref("linedef", i, "vertex", r.v1 as i32, vertices.len())?;
    let v2 = check_ref("linedef", i, "vertex", r.v2 as i32, vertices.len())?;
    let (a, b) = (vertices[v1 as usize], vertices[v2 as usize]);
    let dx = b.x.wrapping_sub(a.x);
    let dy = b.y.wrapping_sub(a.y);

    let slope = if dx == 0 {
        SlopeType::Vertical
    } else if dy == 0 {
        SlopeType::Horizontal
    } else if fixed_div(dy, dx).is_ok_and(|s| s > 0) {
        SlopeType::Positive
    } else {
        SlopeType::Negative
    };

    let mut bbox = BBox::EMPTY;
    bbox.add_point(a.x, a.y);
    bbox.add_point(b.x, b.y);

    let front = check_ref("linedef", i, "sidedef", r.sidenum[0] as i32, sides.len())?;
    let back = match r.sidenum[1] {
        -1 => None,
        s => Some(check_ref("linedef", i, "sidedef", s as i32, sides.len())?),
    };

    Ok(Line {
        v1,
        v2,
        dx,
        dy,
        flags: LineFlags::from_bits_truncate(r.flags as u16),
        special: r.special,
        tag: r.tag,
        sides: [Some(front), back],
        bbox,
        slope,
        front_sector: Some(sides[front as usize].sector),
        back_sector: back.map(|s| sides[s as usize].sector),
        validcount: 0,
    })
}

fn node_from(i: usize, r: &raw_level::RawNode, num_nodes: usize, num_subsectors: usize) -> Result<Node, LoadError> {
    let bbox = r.bbox.map(|b| {
        let mut out = [0; 4];
        for k in [BOXTOP, BOXBOTTOM, BOXLEFT, BOXRIGHT] {
            out[k] = fixed(b[k]);
        }
        BBox(out)
    });

    let mut children = [Child::Subsector(0); 2];
    for (slot, &raw_child) in children.iter_mut().zip(r.child.iter()) {
        let child = Child::from_raw(raw_child);
        match child {
            Child::Node(n) => check_ref("node", i, "node", n as i32, num_nodes)?,
            Child::Subsector(s) => check_ref("node", i, "subsector", s as i32, num_subsectors)?,
        };
        *slot = child;
    }

    Ok(Node {
        x: fixed(r.x),
        y: fixed(r.y),
        dx: fixed(r.dx),
        dy: fixed(r.dy),
        bbox,
        children,
    })
}

fn seg_from(i: usize, r: &raw_level::RawSeg, num_vertices: usize, lines: &[Line], sides: &[Side]) -> Result<Seg, LoadError> {
    let v1 = check_ref("seg", i, "vertex", r.v1 as i32, num_vertices)?;
    let v2 = check_ref("seg", i, "vertex", r.v2 as i32, num_vertices)?;
    let line_id = check_ref("seg", i, "linedef", r.linedef as i32, lines.len())?;
    let line = &lines[line_id as usize];

    let dir = check_ref("seg", i, "line side", r.side as i32, 2)? as usize;
    let side = line.sides[dir].ok_or(LoadError::BadReference {
        kind: "seg",
        index: i,
        target: "line side",
        value: r.side as i32,
    })?;

    let back_sector = if line.is_two_sided() {
        line.sides[dir ^ 1].map(|s| sides[s as usize].sector)
    } else {
        None
    };

    Ok(Seg {
        v1,
        v2,
        offset: fixed(r.offset),
        angle: (r.angle as u16 as Angle) << 16,
        side,
        line: line_id,
        front_sector: sides[side as usize].sector,
        back_sector,
    })
}

/// Reverse line lists, bounding boxes, sound origins and block boxes.
fn group_lines(sectors: &mut [Sector], lines: &[Line], vertices: &[Vertex], blockmap: Option<BlockmapOrigin>) {
    for (id, line) in lines.iter().enumerate() {
        let mut touched: SmallVec<[u16; 2]> = SmallVec::new();
        touched.extend(line.front_sector);
        if let Some(back) = line.back_sector.filter(|&b| Some(b) != line.front_sector) {
            touched.push(back);
        }
        for s in touched {
            let sector = &mut sectors[s as usize];
            sector.lines.push(id as u16);
            for v in [line.v1, line.v2] {
                let v = vertices[v as usize];
                sector.bbox.add_point(v.x, v.y);
            }
        }
    }

    for sector in sectors.iter_mut().filter(|s| !s.bbox.is_empty()) {
        let b = sector.bbox;
        sector.sound_origin = (
            ((b[BOXRIGHT] as i64 + b[BOXLEFT] as i64) / 2) as Fixed,
            ((b[BOXTOP] as i64 + b[BOXBOTTOM] as i64) / 2) as Fixed,
        );

        let Some(bm) = blockmap else { continue };
        let cell = |v: Fixed, origin: Fixed, pad: Fixed| {
            ((v as i64 - origin as i64 + pad as i64) >> MAPBLOCKSHIFT) as i32
        };
        sector.blockbox[BOXTOP] = cell(b[BOXTOP], bm.y, MAXRADIUS).min(bm.rows - 1);
        sector.blockbox[BOXBOTTOM] = cell(b[BOXBOTTOM], bm.y, -MAXRADIUS).max(0);
        sector.blockbox[BOXRIGHT] = cell(b[BOXRIGHT], bm.x, MAXRADIUS).min(bm.columns - 1);
        sector.blockbox[BOXLEFT] = cell(b[BOXLEFT], bm.x, -MAXRADIUS).max(0);
    }
}

/// Place things in the sector containing their spawn point.
fn spawn_things(level: &mut Level, raw: &[raw_level::RawThing]) {
    for (id, t) in raw.iter().enumerate() {
        let (x, y) = (fixed(t.x), fixed(t.y));
        let sector = level.sector_at(x, y);
        level.things.push(Thing {
            x,
            y,
            angle: ANG45.wrapping_mul((t.angle as i32 / 45) as u32),
            type_id: t.type_ as u16,
            options: t.options as u16,
            sector,
        });
        level.sectors[sector as usize].things.push(id as u16);
    }
    debug!("{} things placed", level.things.len());
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ANG90, ANG180, ANG270, FRACUNIT};
    use crate::wad::level::testmap;
    use crate::wad::raw::testwad;
    use crate::world::sample_table;

    fn load(map: &testmap::MapBytes) -> Result<Level, LoadError> {
        let tmp = testwad::write(b"IWAD", &map.lumps("E1M1"));
        let wad = Wad::from_file(tmp.path()).unwrap();
        load_level_by_name(&wad, "E1M1", &sample_table())
    }

    #[test]
    fn square_room_tables() {
        let lvl = load(&testmap::square_room()).unwrap();
        assert_eq!(lvl.name, "E1M1");
        assert_eq!(lvl.vertices[2], Vertex { x: 256 * FRACUNIT, y: 256 * FRACUNIT });

        assert_eq!(lvl.lines[0].slope, SlopeType::Vertical);
        assert_eq!(lvl.lines[1].slope, SlopeType::Horizontal);
        assert_eq!(lvl.lines[0].dy, 256 * FRACUNIT);
        assert_eq!(lvl.lines[0].back_sector, None);
        assert_eq!(lvl.lines[3].bbox.0, [0, 0, 0, 256 * FRACUNIT]);

        let angles: Vec<Angle> = lvl.segs.iter().map(|s| s.angle).collect();
        assert_eq!(angles, vec![ANG90, 0, ANG270, ANG180]);
        assert!(lvl.segs.iter().all(|s| s.back_sector.is_none()));

        assert_eq!(lvl.nodes.len(), 0);
        assert_eq!(lvl.bsp_root(), Child::Subsector(0));
        assert_eq!(lvl.subsectors[0].sector, 0);
    }

    #[test]
    fn square_room_grouping() {
        let lvl = load(&testmap::square_room()).unwrap();
        let s = &lvl.sectors[0];
        assert_eq!(s.lines.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(s.bbox.0, [256 * FRACUNIT, 0, 0, 256 * FRACUNIT]);
        assert_eq!(s.sound_origin, (128 * FRACUNIT, 128 * FRACUNIT));
        // (256 + 8 + 32) >> 7 = 2, (0 + 8 - 32) >> 7 < 0
        assert_eq!(s.blockbox, [2, 0, 0, 2]);
        assert_eq!(s.light_level, 160);
        assert_eq!(s.floor_pic, 0);
        assert_eq!(s.ceiling_pic, 1);

        assert_eq!(lvl.things.len(), 1);
        assert_eq!(lvl.things[0].sector, 0);
        assert_eq!(s.things, vec![0]);
        assert_eq!(lvl.sides[0].mid_texture, 1);
        assert_eq!(lvl.sides[0].top_texture, 0);
    }

    #[test]
    fn two_rooms_back_sectors_and_bsp() {
        let lvl = load(&testmap::two_rooms()).unwrap();

        let shared = &lvl.lines[6];
        assert!(shared.is_two_sided());
        assert_eq!(shared.front_sector, Some(0));
        assert_eq!(shared.back_sector, Some(1));

        // seg 2 is the front of the shared line, seg 4 its back
        assert_eq!(lvl.segs[2].front_sector, 0);
        assert_eq!(lvl.segs[2].back_sector, Some(1));
        assert_eq!(lvl.segs[4].front_sector, 1);
        assert_eq!(lvl.segs[4].back_sector, Some(0));

        assert_eq!(lvl.nodes[0].children, [Child::Subsector(1), Child::Subsector(0)]);
        assert_eq!(lvl.subsectors[1].sector, 1);
        assert_eq!(lvl.sector_at(to_fixed(400), to_fixed(100)), 1);
        assert_eq!(lvl.sector_at(to_fixed(10), to_fixed(10)), 0);

        assert_eq!(lvl.sectors[0].lines.as_slice(), &[0, 1, 2, 6]);
        assert_eq!(lvl.sectors[1].lines.as_slice(), &[3, 4, 5, 6]);
        assert_eq!(lvl.sectors[1].ceiling_pic, 2);
        assert_eq!(lvl.sides[6].bottom_texture, 2);
        assert_eq!(lvl.things[0].sector, 0);
        assert_eq!(lvl.sectors[1].floor_height, 24 * FRACUNIT);
    }

    #[test]
    fn thing_angles_snap_to_45() {
        let mut map = testmap::square_room();
        map.thing(32, 32, 100, 3001);
        let lvl = load(&map).unwrap();
        assert_eq!(lvl.things[1].angle, ANG90);
        assert_eq!(lvl.player_start().map(|t| t.type_id), Some(1));
    }

    #[test]
    fn dangling_vertex_is_rejected() {
        let mut map = testmap::square_room();
        map.linedef(0, 99, 1, 0, -1);
        let err = load(&map).unwrap_err();
        assert!(matches!(
            err,
            LoadError::BadReference { kind: "linedef", index: 4, target: "vertex", value: 99 }
        ));
    }

    #[test]
    fn dangling_sector_is_rejected() {
        let mut map = testmap::square_room();
        map.sidedef("-", "-", "-", 5);
        let err = load(&map).unwrap_err();
        assert!(matches!(err, LoadError::BadReference { target: "sector", .. }));
    }

    #[test]
    fn seg_on_missing_back_side_is_rejected() {
        let mut map = testmap::square_room();
        map.seg(1, 0, 0, 0, 1, 0);
        let err = load(&map).unwrap_err();
        assert!(matches!(err, LoadError::BadReference { kind: "seg", index: 4, .. }));
    }
}
