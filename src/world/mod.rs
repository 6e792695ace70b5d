mod bsp;
mod camera;
mod geometry;
mod texture;

pub use geometry::{
    BBox, BOXBOTTOM, BOXLEFT, BOXRIGHT, BOXTOP, BlockmapOrigin, Child, Level, Line, LineFlags,
    LineId, Node, NodeId, Sector, SectorId, Seg, SegId, Side, SideId, SlopeType, Subsector,
    SubsectorId, Thing, ThingId, Vertex, VertexId,
};

pub use bsp::{PlaneSide, point_on_line_side};

pub use camera::{VIEW_HEIGHT, Viewpoint};

pub use texture::{FlatId, NO_TEXTURE, TextureError, TextureId, TextureInfo, TextureTable};

#[cfg(test)]
pub(crate) use texture::sample_table;
