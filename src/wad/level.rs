use crate::wad::{Wad, WadError};
use bincode::Decode;
use byteorder::{LittleEndian as LE, ReadBytesExt};
use once_cell::sync::Lazy;
use regex::Regex;

/*=======================================================================*/
/*                         Raw binary structs                            */
/*=======================================================================*/

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub type_: i16,
    pub options: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawLinedef {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: i16,
    pub tag: i16,
    pub sidenum: [i16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSidedef {
    pub x_off: i16,
    pub y_off: i16,
    pub top_tex: [u8; 8],
    pub bottom_tex: [u8; 8],
    pub mid_tex: [u8; 8],
    pub sector: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawVertex {
    pub x: i16,
    pub y: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSeg {
    pub v1: i16,
    pub v2: i16,
    pub angle: i16,
    pub linedef: i16,
    pub side: i16,
    pub offset: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSubsector {
    pub seg_count: i16,
    pub first_seg: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawNode {
    pub x: i16,
    pub y: i16,
    pub dx: i16,
    pub dy: i16,
    /// top, bottom, left, right for each child
    pub bbox: [[i16; 4]; 2],
    pub child: [u16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSector {
    pub floor_h: i16,
    pub ceil_h: i16,
    pub floor_tex: [u8; 8],
    pub ceil_tex: [u8; 8],
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

/// First four words of the BLOCKMAP lump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawBlockmapHeader {
    pub origin_x: i16,
    pub origin_y: i16,
    pub columns: i16,
    pub rows: i16,
}

/*=======================================================================*/
/*                     Aggregate returned by `parse_level`               */
/*=======================================================================*/
#[derive(Debug)]
pub struct RawLevel {
    pub name: String,
    pub things: Vec<RawThing>,
    pub linedefs: Vec<RawLinedef>,
    pub sidedefs: Vec<RawSidedef>,
    pub vertices: Vec<RawVertex>,
    pub segs: Vec<RawSeg>,
    pub subsectors: Vec<RawSubsector>,
    pub nodes: Vec<RawNode>,
    pub sectors: Vec<RawSector>,
    pub blockmap: Option<RawBlockmapHeader>,
}

/*=======================================================================*/
/*                                Errors                                 */
/*=======================================================================*/

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("marker index {0} out of bounds")]
    MarkerOob(usize),

    #[error("expected lump `{0}` not found after level marker")]
    Missing(&'static str),

    #[error(transparent)]
    Wad(#[from] WadError),
}

/*=======================================================================*/
/*                     Convenience helpers on `Wad`                      */
/*=======================================================================*/
impl Wad {
    /// Return directory indices of every map marker (`E#M#`, `MAP##`).
    pub fn level_indices(&self) -> Vec<usize> {
        static RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^(E[1-4]M[1-9]|MAP[0-3][0-9])$").unwrap());

        self.lumps()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.size == 0 && RE.is_match(Self::lump_name_str(&l.name)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Return the index of the lump `name` **immediately after** `start`.
    fn idx_of(&self, start: usize, name: &'static str) -> Result<usize, LevelError> {
        let l = self.lumps().get(start).ok_or(LevelError::Missing(name))?;
        match Self::lump_name_str(&l.name) == name {
            true => Ok(start),
            false => Err(LevelError::Missing(name)),
        }
    }

    /// Decode the mandatory lumps of a classic map, plus the BLOCKMAP
    /// header when present.
    pub fn parse_level(&self, marker_idx: usize) -> Result<RawLevel, LevelError> {
        if marker_idx >= self.lumps().len() {
            return Err(LevelError::MarkerOob(marker_idx));
        }

        // --- fixed lump order after marker -------------------------------
        let things_idx = self.idx_of(marker_idx + 1, "THINGS")?;
        let linedefs_idx = self.idx_of(marker_idx + 2, "LINEDEFS")?;
        let sidedefs_idx = self.idx_of(marker_idx + 3, "SIDEDEFS")?;
        let vertices_idx = self.idx_of(marker_idx + 4, "VERTEXES")?;
        let segs_idx = self.idx_of(marker_idx + 5, "SEGS")?;
        let ssectors_idx = self.idx_of(marker_idx + 6, "SSECTORS")?;
        let nodes_idx = self.idx_of(marker_idx + 7, "NODES")?;
        let sectors_idx = self.idx_of(marker_idx + 8, "SECTORS")?;
        // REJECT (marker + 9) is a simulation concern
        let blockmap = match self.idx_of(marker_idx + 10, "BLOCKMAP") {
            Ok(idx) => self.blockmap_header(idx)?,
            Err(_) => None,
        };

        Ok(RawLevel {
            name: Self::lump_name_str(&self.lumps()[marker_idx].name).into(),
            things: self.lump_to_vec::<RawThing>(things_idx)?,
            linedefs: self.lump_to_vec::<RawLinedef>(linedefs_idx)?,
            sidedefs: self.lump_to_vec::<RawSidedef>(sidedefs_idx)?,
            vertices: self.lump_to_vec::<RawVertex>(vertices_idx)?,
            segs: self.lump_to_vec::<RawSeg>(segs_idx)?,
            subsectors: self.lump_to_vec::<RawSubsector>(ssectors_idx)?,
            nodes: self.lump_to_vec::<RawNode>(nodes_idx)?,
            sectors: self.lump_to_vec::<RawSector>(sectors_idx)?,
            blockmap,
        })
    }

    /// Decode the map whose marker is named `name` (e.g. `E1M1`).
    pub fn parse_level_by_name(&self, name: &str) -> Result<RawLevel, LevelError> {
        self.parse_level(self.require(name)?)
    }

    fn blockmap_header(&self, idx: usize) -> Result<Option<RawBlockmapHeader>, WadError> {
        let mut bytes = self.cached(idx)?;
        if bytes.len() < 8 {
            return Ok(None);
        }
        Ok(Some(RawBlockmapHeader {
            origin_x: bytes.read_i16::<LE>()?,
            origin_y: bytes.read_i16::<LE>()?,
            columns: bytes.read_i16::<LE>()?,
            rows: bytes.read_i16::<LE>()?,
        }))
    }
}

/*=======================================================================*/
/*                        Test map builder                               */
/*=======================================================================*/

/// Byte encoders for hand-made maps, shared by the loader and engine tests.
#[cfg(test)]
pub(crate) mod testmap {
    pub fn name8(s: &str) -> [u8; 8] {
        let mut n = [0u8; 8];
        n[..s.len()].copy_from_slice(s.as_bytes());
        n
    }

    fn words(ws: &[i16]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[derive(Default)]
    pub struct MapBytes {
        pub things: Vec<u8>,
        pub linedefs: Vec<u8>,
        pub sidedefs: Vec<u8>,
        pub vertexes: Vec<u8>,
        pub segs: Vec<u8>,
        pub ssectors: Vec<u8>,
        pub nodes: Vec<u8>,
        pub sectors: Vec<u8>,
        pub blockmap: Vec<u8>,
    }

    impl MapBytes {
        pub fn thing(&mut self, x: i16, y: i16, angle: i16, type_: i16) -> &mut Self {
            self.things.extend(words(&[x, y, angle, type_, 7]));
            self
        }

        pub fn vertex(&mut self, x: i16, y: i16) -> &mut Self {
            self.vertexes.extend(words(&[x, y]));
            self
        }

        pub fn linedef(&mut self, v1: i16, v2: i16, flags: i16, front: i16, back: i16) -> &mut Self {
            self.linedefs.extend(words(&[v1, v2, flags, 0, 0, front, back]));
            self
        }

        pub fn sidedef(&mut self, top: &str, bottom: &str, mid: &str, sector: i16) -> &mut Self {
            self.sidedefs.extend(words(&[0, 0]));
            self.sidedefs.extend(name8(top));
            self.sidedefs.extend(name8(bottom));
            self.sidedefs.extend(name8(mid));
            self.sidedefs.extend(words(&[sector]));
            self
        }

        pub fn sector(&mut self, floor: i16, ceil: i16, floor_pic: &str, ceil_pic: &str, light: i16) -> &mut Self {
            self.sectors.extend(words(&[floor, ceil]));
            self.sectors.extend(name8(floor_pic));
            self.sectors.extend(name8(ceil_pic));
            self.sectors.extend(words(&[light, 0, 0]));
            self
        }

        pub fn seg(&mut self, v1: i16, v2: i16, angle: i16, linedef: i16, side: i16, offset: i16) -> &mut Self {
            self.segs.extend(words(&[v1, v2, angle, linedef, side, offset]));
            self
        }

        pub fn subsector(&mut self, count: i16, first: i16) -> &mut Self {
            self.ssectors.extend(words(&[count, first]));
            self
        }

        pub fn node(&mut self, xy: [i16; 4], bbox: [[i16; 4]; 2], child: [u16; 2]) -> &mut Self {
            self.nodes.extend(words(&xy));
            self.nodes.extend(words(&bbox[0]));
            self.nodes.extend(words(&bbox[1]));
            self.nodes.extend(child.iter().flat_map(|c| c.to_le_bytes()));
            self
        }

        pub fn blockmap(&mut self, ox: i16, oy: i16, cols: i16, rows: i16) -> &mut Self {
            self.blockmap = words(&[ox, oy, cols, rows]);
            self
        }

        /// Lump list in canonical order, ready for `testwad::build`.
        pub fn lumps<'a>(&'a self, marker: &'a str) -> Vec<(&'a str, &'a [u8])> {
            vec![
                (marker, &[][..]),
                ("THINGS", &self.things[..]),
                ("LINEDEFS", &self.linedefs[..]),
                ("SIDEDEFS", &self.sidedefs[..]),
                ("VERTEXES", &self.vertexes[..]),
                ("SEGS", &self.segs[..]),
                ("SSECTORS", &self.ssectors[..]),
                ("NODES", &self.nodes[..]),
                ("SECTORS", &self.sectors[..]),
                ("REJECT", &[][..]),
                ("BLOCKMAP", &self.blockmap[..]),
            ]
        }
    }

    /// A 256×256 square room: one sector, four one-sided walls, a single
    /// subsector and no nodes.  Player start in the middle facing east.
    pub fn square_room() -> MapBytes {
        square_room_spanning(0, 128)
    }

    /// `square_room` with the floor and ceiling at the given heights.
    pub fn square_room_spanning(floor: i16, ceiling: i16) -> MapBytes {
        let mut m = MapBytes::default();
        m.vertex(0, 0).vertex(0, 256).vertex(256, 256).vertex(256, 0);
        m.sector(floor, ceiling, "FLOOR4_8", "CEIL3_5", 160);
        for _ in 0..4 {
            m.sidedef("-", "-", "STARTAN3", 0);
        }
        // clockwise so the inside is the front (right) side
        m.linedef(0, 1, 1, 0, -1)
            .linedef(1, 2, 1, 1, -1)
            .linedef(2, 3, 1, 2, -1)
            .linedef(3, 0, 1, 3, -1);
        // angles: north, east, south, west (binary angle >> 16)
        m.seg(0, 1, 0x4000, 0, 0, 0)
            .seg(1, 2, 0, 1, 0, 0)
            .seg(2, 3, -0x4000, 2, 0, 0)
            .seg(3, 0, -0x8000, 3, 0, 0);
        m.subsector(4, 0);
        m.thing(128, 128, 0, 1);
        m.blockmap(-8, -8, 3, 3);
        m
    }

    /// Two rooms joined by a raised step: sector 0 is x in 0..256,
    /// sector 1 is x in 256..512 with a higher floor and lower ceiling.
    /// One node splits them along x = 256.
    pub fn two_rooms() -> MapBytes {
        let mut m = MapBytes::default();
        // 0..5: (0,0) (0,256) (256,256) (512,256) (512,0) (256,0)
        m.vertex(0, 0)
            .vertex(0, 256)
            .vertex(256, 256)
            .vertex(512, 256)
            .vertex(512, 0)
            .vertex(256, 0);
        m.sector(0, 128, "FLOOR4_8", "CEIL3_5", 160)
            .sector(24, 104, "FLOOR4_8", "F_SKY1", 255);

        // sides 0..3 room A walls, 3..6 room B walls, 6/7 the shared line
        for _ in 0..3 {
            m.sidedef("-", "-", "STARTAN3", 0);
        }
        for _ in 0..3 {
            m.sidedef("-", "-", "STARTAN3", 1);
        }
        m.sidedef("STARTAN3", "STEP6", "-", 0); // 6: front of shared line
        m.sidedef("-", "-", "-", 1); // 7: back of shared line

        m.linedef(0, 1, 1, 0, -1) // 0 west
            .linedef(1, 2, 1, 1, -1) // 1 north A
            .linedef(5, 0, 1, 2, -1) // 2 south A
            .linedef(2, 3, 1, 3, -1) // 3 north B
            .linedef(3, 4, 1, 4, -1) // 4 east
            .linedef(4, 5, 1, 5, -1) // 5 south B
            .linedef(2, 5, 4, 6, 7); // 6 shared, two-sided, faces west (front = A)

        // subsector 0 (room A): segs 0..4
        m.seg(0, 1, 0x4000, 0, 0, 0)
            .seg(1, 2, 0, 1, 0, 0)
            .seg(2, 5, -0x4000, 6, 0, 0)
            .seg(5, 0, -0x8000, 2, 0, 0);
        // subsector 1 (room B): segs 4..8
        m.seg(5, 2, 0x4000, 6, 1, 0)
            .seg(2, 3, 0, 3, 0, 0)
            .seg(3, 4, -0x4000, 4, 0, 0)
            .seg(4, 5, -0x8000, 5, 0, 0);
        m.subsector(4, 0).subsector(4, 4);

        // partition x = 256 heading north: front (right) = room B
        m.node(
            [256, 0, 0, 256],
            [[256, 0, 256, 512], [256, 0, 0, 256]],
            [0x8001, 0x8000],
        );
        m.thing(64, 128, 0, 1);
        m.blockmap(-8, -8, 5, 3);
        m
    }
}

/*=======================================================================*/
/*                                Tests                                  */
/*=======================================================================*/
