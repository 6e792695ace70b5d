use crate::math::{FRACBITS, Fixed, fixed_mul};
use crate::world::geometry::{Child, Level, Node, Seg, SectorId, SubsectorId};

/// Which side of a partition line a point lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneSide {
    Front = 0,
    Back = 1,
}

impl PlaneSide {
    #[inline(always)]
    fn from_back(back: bool) -> Self {
        if back { PlaneSide::Back } else { PlaneSide::Front }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Classify `(x, y)` against the directed line through `(lx, ly)` with
/// delta `(ldx, ldy)`.  Front is the right-hand side.
///
/// Axis-aligned lines compare coordinates directly, so a point exactly on
/// a vertical line heading north counts as back, and one exactly on a
/// horizontal line heading east counts as front.  Otherwise the sign bits
/// settle most cases; the rest compare two cross products, ties go back.
#[inline]
pub fn point_on_line_side(x: Fixed, y: Fixed, lx: Fixed, ly: Fixed, ldx: Fixed, ldy: Fixed) -> PlaneSide {
    if ldx == 0 {
        return PlaneSide::from_back(if x <= lx { ldy > 0 } else { ldy < 0 });
    }
    if ldy == 0 {
        return PlaneSide::from_back(if y <= ly { ldx < 0 } else { ldx > 0 });
    }

    let dx = x.wrapping_sub(lx);
    let dy = y.wrapping_sub(ly);

    if (ldy ^ ldx ^ dx ^ dy) < 0 {
        // left is negative
        return PlaneSide::from_back((ldy ^ dx) < 0);
    }

    let left = fixed_mul(ldy >> FRACBITS, dx);
    let right = fixed_mul(dy, ldx >> FRACBITS);
    PlaneSide::from_back(right >= left)
}

// ──────────────────────────────────────────────────────────────────────────
//                       Node / seg classification
// ──────────────────────────────────────────────────────────────────────────
impl Node {
    #[inline(always)]
    pub fn point_on_side(&self, x: Fixed, y: Fixed) -> PlaneSide {
        point_on_line_side(x, y, self.x, self.y, self.dx, self.dy)
    }
}

impl Level {
    /// Same test as `Node::point_on_side`, against the seg's own endpoints.
    pub fn point_on_seg_side(&self, x: Fixed, y: Fixed, seg: &Seg) -> PlaneSide {
        let (v1, v2) = self.seg_vertices(seg);
        point_on_line_side(x, y, v1.x, v1.y, v2.x.wrapping_sub(v1.x), v2.y.wrapping_sub(v1.y))
    }

    /// Entry point of every BSP walk.  A map without nodes is a single
    /// subsector.
    #[inline(always)]
    pub fn bsp_root(&self) -> Child {
        match self.nodes.len() {
            0 => Child::Subsector(0),
            n => Child::Node((n - 1) as u16),
        }
    }

    /// Walk the BSP and return the subsector containing `(x, y)`.
    pub fn locate_subsector(&self, x: Fixed, y: Fixed) -> SubsectorId {
        let mut child = self.bsp_root();
        loop {
            match child {
                Child::Subsector(ss) => return ss,
                Child::Node(n) => {
                    let node = &self.nodes[n as usize];
                    child = node.children[node.point_on_side(x, y).index()];
                }
            }
        }
    }

    pub fn sector_at(&self, x: Fixed, y: Fixed) -> SectorId {
        self.subsectors[self.locate_subsector(x, y) as usize].sector
    }
}
