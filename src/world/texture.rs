// Wall texture and flat *metadata*: names, sizes and the handles the map
// tables store.  Pixel data stays in the archive; the rasterizer resolves
// it on its own side.

use std::collections::HashMap;

use byteorder::{LittleEndian as LE, ReadBytesExt};
use log::{info, warn};

use crate::math::{Fixed, to_fixed};
use crate::wad::{Wad, WadError};

/// Index into the wall texture list.  `0` doubles as "no texture".
pub type TextureId = u16;

/// Index into the flat range `F_START .. F_END`.
pub type FlatId = u16;

pub const NO_TEXTURE: TextureId = 0;

const SKY_FLAT_NAME: &str = "F_SKY1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub name: String,
    pub width: i16,
    pub height: i16,
}

/// Things that can go wrong while reading TEXTURE1/TEXTURE2.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error(transparent)]
    Wad(#[from] WadError),

    #[error("{lump}: offset {offset} of texture {index} is past the end")]
    BadOffset { lump: &'static str, index: usize, offset: i32 },

    #[error("{lump}: truncated texture directory")]
    Truncated { lump: &'static str },
}

/// Name → handle tables for wall textures and flats.
///
/// * Texture and flat names are stored upper-case; lookups fold case.
/// * A later entry with the same name wins, as in the archive.
#[derive(Debug, Default)]
pub struct TextureTable {
    textures: Vec<TextureInfo>,
    by_name: HashMap<String, TextureId>,
    flats: Vec<String>,
    flat_by_name: HashMap<String, FlatId>,
    sky_flat: Option<FlatId>,
}

impl TextureTable {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    pub fn new(textures: Vec<TextureInfo>, flats: Vec<String>) -> Self {
        let mut by_name = HashMap::with_capacity(textures.len());
        for (i, t) in textures.iter().enumerate() {
            by_name.insert(t.name.to_ascii_uppercase(), i as TextureId);
        }
        let mut flat_by_name = HashMap::with_capacity(flats.len());
        for (i, f) in flats.iter().enumerate() {
            flat_by_name.insert(f.to_ascii_uppercase(), i as FlatId);
        }
        let sky_flat = flat_by_name.get(SKY_FLAT_NAME).copied();
        Self {
            textures,
            by_name,
            flats,
            flat_by_name,
            sky_flat,
        }
    }

    /// Read TEXTURE1 (required), TEXTURE2 (optional) and the flat range.
    pub fn from_wad(wad: &Wad) -> Result<Self, TextureError> {
        let mut textures = read_texture_lump(wad.cached_by_name("TEXTURE1")?, "TEXTURE1")?;
        if let Some(idx) = wad.find("TEXTURE2") {
            textures.extend(read_texture_lump(wad.cached(idx)?, "TEXTURE2")?);
        }

        let first = wad.require("F_START")? + 1;
        let last = wad.require("F_END")?;
        let flats: Vec<String> = wad
            .lumps()
            .get(first..last)
            .unwrap_or_default()
            .iter()
            .filter(|l| l.size > 0)
            .map(|l| Wad::lump_name_str(&l.name).to_ascii_uppercase())
            .collect();

        info!("{} wall textures, {} flats", textures.len(), flats.len());
        Ok(Self::new(textures, flats))
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn num_flats(&self) -> usize {
        self.flats.len()
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureInfo> {
        self.textures.get(id as usize)
    }

    /// `-` is "no texture"; unknown names fall back to it with a warning.
    pub fn texture_num(&self, name: &str) -> TextureId {
        if name.starts_with('-') {
            return NO_TEXTURE;
        }
        match self.by_name.get(&name.to_ascii_uppercase()) {
            Some(&id) => id,
            None => {
                warn!("unknown texture `{name}`");
                NO_TEXTURE
            }
        }
    }

    /// Texture height in map units (fixed point), 0 for unknown ids.
    pub fn texture_height(&self, id: TextureId) -> Fixed {
        self.texture(id).map_or(0, |t| to_fixed(t.height as i32))
    }

    pub fn flat_num(&self, name: &str) -> FlatId {
        match self.flat_by_name.get(&name.to_ascii_uppercase()) {
            Some(&id) => id,
            None => {
                warn!("unknown flat `{name}`");
                0
            }
        }
    }

    pub fn flat_name(&self, id: FlatId) -> Option<&str> {
        self.flats.get(id as usize).map(String::as_str)
    }

    /// Handle of `F_SKY1`, if the archive has one.
    pub fn sky_flat(&self) -> Option<FlatId> {
        self.sky_flat
    }

    #[inline]
    pub fn is_sky(&self, flat: FlatId) -> bool {
        self.sky_flat == Some(flat)
    }
}

/// Parse one TEXTUREn lump: `i32 count`, `i32 offsets[count]`, then per
/// texture `name[8] masked:i32 width:i16 height:i16 ...`.
fn read_texture_lump(bytes: &[u8], lump: &'static str) -> Result<Vec<TextureInfo>, TextureError> {
    let mut dir = bytes;
    let count = dir.read_i32::<LE>().map_err(|_| TextureError::Truncated { lump })?;
    let mut out = Vec::with_capacity(count.max(0) as usize);

    for index in 0..count.max(0) as usize {
        let offset = dir.read_i32::<LE>().map_err(|_| TextureError::Truncated { lump })?;
        let start = usize::try_from(offset).map_err(|_| TextureError::BadOffset { lump, index, offset })?;
        let entry = bytes
            .get(start..start + 16)
            .ok_or(TextureError::BadOffset { lump, index, offset })?;

        let mut name = [0u8; 8];
        name.copy_from_slice(&entry[..8]);
        let mut dims = &entry[12..16];
        let width = dims.read_i16::<LE>().map_err(|_| TextureError::Truncated { lump })?;
        let height = dims.read_i16::<LE>().map_err(|_| TextureError::Truncated { lump })?;

        out.push(TextureInfo {
            name: Wad::lump_name_str(&name).to_ascii_uppercase(),
            width,
            height,
        });
    }
    Ok(out)
}

/// Small table used by the loader and engine tests.
#[cfg(test)]
pub(crate) fn sample_table() -> TextureTable {
    let tex = |name: &str, w, h| TextureInfo {
        name: name.into(),
        width: w,
        height: h,
    };
    TextureTable::new(
        vec![
            tex("AASTINKY", 24, 72),
            tex("STARTAN3", 128, 128),
            tex("STEP6", 32, 16),
        ],
        ["FLOOR4_8", "CEIL3_5", "F_SKY1"].map(String::from).to_vec(),
    )
}

/// TEXTURE1 bytes for `(name, width, height)` entries.
#[cfg(test)]
pub(crate) fn texture_lump(entries: &[(&str, i16, i16)]) -> Vec<u8> {
    use crate::wad::level::testmap::name8;

    let header = 4 + 4 * entries.len();
    let mut out = (entries.len() as i32).to_le_bytes().to_vec();
    for i in 0..entries.len() {
        out.extend(((header + i * 22) as i32).to_le_bytes());
    }
    for &(name, w, h) in entries {
        out.extend(name8(name));
        out.extend(0i32.to_le_bytes()); // masked
        out.extend(w.to_le_bytes());
        out.extend(h.to_le_bytes());
        out.extend(0i32.to_le_bytes()); // column directory
        out.extend(0i16.to_le_bytes()); // patch count
    }
    out
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
