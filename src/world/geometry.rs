use std::ops::Index;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::math::{Angle, Fixed};
use crate::world::texture::{FlatId, TextureId};

pub type VertexId = u16;
pub type LineId = u16;
pub type SideId = u16;
pub type SectorId = u16;
pub type SubsectorId = u16;
pub type SegId = u16;
pub type NodeId = u16;
pub type ThingId = u16;

/// Runtime snapshot of one map, in fixed point.
///
/// Tables are built once by `wad::load_level`; only the small per-line and
/// per-sector bookkeeping fields change afterwards, and never from the
/// renderer.
#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub things: Vec<Thing>,
    pub vertices: Vec<Vertex>,
    pub lines: Vec<Line>,
    pub sides: Vec<Side>,
    pub sectors: Vec<Sector>,
    pub subsectors: Vec<Subsector>,
    pub segs: Vec<Seg>,
    pub nodes: Vec<Node>,
    pub blockmap: Option<BlockmapOrigin>,
}

/*------------------------- bounding boxes ---------------------------*/

pub const BOXTOP: usize = 0;
pub const BOXBOTTOM: usize = 1;
pub const BOXLEFT: usize = 2;
pub const BOXRIGHT: usize = 3;

/// `[top, bottom, left, right]` in map units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BBox(pub [Fixed; 4]);

impl BBox {
    /// Inverted box: the first `add_point` makes it a single point.
    pub const EMPTY: BBox = BBox([Fixed::MIN, Fixed::MAX, Fixed::MAX, Fixed::MIN]);

    pub fn add_point(&mut self, x: Fixed, y: Fixed) {
        let b = &mut self.0;
        b[BOXLEFT] = b[BOXLEFT].min(x);
        b[BOXRIGHT] = b[BOXRIGHT].max(x);
        b[BOXBOTTOM] = b[BOXBOTTOM].min(y);
        b[BOXTOP] = b[BOXTOP].max(y);
    }

    pub fn is_empty(&self) -> bool {
        self.0[BOXLEFT] > self.0[BOXRIGHT]
    }

    #[inline]
    pub fn contains(&self, x: Fixed, y: Fixed) -> bool {
        x >= self.0[BOXLEFT] && x <= self.0[BOXRIGHT] && y >= self.0[BOXBOTTOM] && y <= self.0[BOXTOP]
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Index<usize> for BBox {
    type Output = Fixed;
    fn index(&self, idx: usize) -> &Fixed {
        &self.0[idx]
    }
}

/*------------------------- game objects -----------------------------*/

/// A map thing as placed by the editor.  The renderer only uses player
/// starts; everything else is carried for the simulation layer.
#[derive(Clone, Debug)]
pub struct Thing {
    pub x: Fixed,
    pub y: Fixed,
    pub angle: Angle,
    pub type_id: u16,
    pub options: u16,
    /// Sector containing the spawn point (filled at load).
    pub sector: SectorId,
}

/*----------------------------- lines --------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0008;
        const LOWER_UNPEGGED  = 0x0010;
        const SECRET          = 0x0020;
        const BLOCK_SOUND     = 0x0040;
        const NOT_ON_MAP      = 0x0080;
        const MAPPED          = 0x0100;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlopeType {
    Horizontal,
    Vertical,
    Positive,
    Negative,
}

#[derive(Clone, Debug)]
pub struct Line {
    pub v1: VertexId,
    pub v2: VertexId,
    pub dx: Fixed,
    pub dy: Fixed,
    pub flags: LineFlags,
    pub special: i16,
    pub tag: i16,
    /// Front (right) and back (left) sides; one-sided lines have no back.
    pub sides: [Option<SideId>; 2],
    pub bbox: BBox,
    pub slope: SlopeType,
    pub front_sector: Option<SectorId>,
    pub back_sector: Option<SectorId>,
    /// Search epoch of the last pass that touched this line.
    pub validcount: u32,
}

impl Line {
    /// Stamp the line with `epoch`; `false` if it was already visited in it.
    pub fn visit(&mut self, epoch: u32) -> bool {
        if self.validcount == epoch {
            return false;
        }
        self.validcount = epoch;
        true
    }

    #[inline]
    pub fn is_two_sided(&self) -> bool {
        self.flags.contains(LineFlags::TWO_SIDED)
    }
}

/*----------------------------- sides --------------------------------*/

#[derive(Clone, Debug)]
pub struct Side {
    pub texture_offset: Fixed,
    pub row_offset: Fixed,
    pub top_texture: TextureId,
    pub bottom_texture: TextureId,
    pub mid_texture: TextureId,
    pub sector: SectorId,
}

/*---------------------------- sectors -------------------------------*/

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_height: Fixed,
    pub ceiling_height: Fixed,
    pub floor_pic: FlatId,
    pub ceiling_pic: FlatId,
    pub light_level: i16,
    pub special: i16,
    pub tag: i16,
    /// Sound propagation depth; 0 = not reached.
    pub sound_traversed: i32,
    pub validcount: u32,
    pub bbox: BBox,
    /// `bbox` in blockmap cells, grown by the largest thing radius.
    pub blockbox: [i32; 4],
    pub sound_origin: (Fixed, Fixed),
    pub lines: SmallVec<[LineId; 8]>,
    pub things: Vec<ThingId>,
}

/*----------------------- simple primitives --------------------------*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vertex {
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Clone, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    pub offset: Fixed,
    pub angle: Angle,
    pub side: SideId,
    pub line: LineId,
    pub front_sector: SectorId,
    /// `None` for one-sided walls.
    pub back_sector: Option<SectorId>,
}

#[derive(Clone, Debug)]
pub struct Subsector {
    pub sector: SectorId,
    pub num_segs: u16,
    pub first_seg: SegId,
}

impl Subsector {
    pub fn seg_range(&self) -> std::ops::Range<usize> {
        let first = self.first_seg as usize;
        first..first + self.num_segs as usize
    }
}

/// One child of a BSP node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Subsector(SubsectorId),
}

impl Child {
    pub const SUBSECTOR_BIT: u16 = 0x8000;

    /// Decode the on-disk tagged index.
    pub fn from_raw(raw: u16) -> Self {
        if raw & Self::SUBSECTOR_BIT != 0 {
            Child::Subsector(raw & !Self::SUBSECTOR_BIT)
        } else {
            Child::Node(raw)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
    /// Bounding box of each child, front first.
    pub bbox: [BBox; 2],
    pub children: [Child; 2],
}

/// BLOCKMAP origin and grid size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockmapOrigin {
    pub x: Fixed,
    pub y: Fixed,
    pub columns: i32,
    pub rows: i32,
}

impl Level {
    #[inline(always)]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id as usize]
    }

    #[inline]
    pub fn seg_vertices(&self, seg: &Seg) -> (&Vertex, &Vertex) {
        (self.vertex(seg.v1), self.vertex(seg.v2))
    }

    /// First player start (`type 1`), if the map has one.
    pub fn player_start(&self) -> Option<&Thing> {
        self.things.iter().find(|t| t.type_id == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRACUNIT;

    #[test]
    fn bbox_grows_from_empty() {
        let mut b = BBox::EMPTY;
        assert!(b.is_empty());
        b.add_point(FRACUNIT, -FRACUNIT);
        b.add_point(-3 * FRACUNIT, 2 * FRACUNIT);
        assert_eq!(b.0, [2 * FRACUNIT, -FRACUNIT, -3 * FRACUNIT, FRACUNIT]);
        assert!(b.contains(0, 0));
        assert!(!b.contains(2 * FRACUNIT, 0));
    }

    #[test]
    fn child_tag_bit() {
        assert_eq!(Child::from_raw(0x8003), Child::Subsector(3));
        assert_eq!(Child::from_raw(0x0003), Child::Node(3));
        assert_eq!(Child::from_raw(0xffff), Child::Subsector(0x7fff));
    }

    #[test]
    fn line_visit_once_per_epoch() {
        let mut line = Line {
            v1: 0,
            v2: 1,
            dx: 0,
            dy: FRACUNIT,
            flags: LineFlags::IMPASSABLE,
            special: 0,
            tag: 0,
            sides: [Some(0), None],
            bbox: BBox::EMPTY,
            slope: SlopeType::Vertical,
            front_sector: Some(0),
            back_sector: None,
            validcount: 0,
        };
        assert!(line.visit(1));
        assert!(!line.visit(1));
        assert!(line.visit(2));
        assert!(!line.is_two_sided());
    }
}
