//! # Asset store (WAD archives)
//!
//! * Any number of IWAD / PWAD files are merged into **one** flat lump
//!   directory, in load order.
//! * Name lookup prefers the most recently loaded archive, so a PWAD can
//!   replace any lump of the IWAD loaded before it.
//! * Lump bytes are read on demand; [`Wad::cached`] keeps them for the
//!   lifetime of the store.
//! * Decodes fixed-size binary records with **bincode 2**.

use bincode::{Decode, config, decode_from_slice};
use byteorder::{LittleEndian as LE, ReadBytesExt};
use log::{info, trace, warn};
use once_cell::unsync::OnceCell;
use std::{
    collections::HashMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    mem,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Size of the archive header in bytes.
pub const HEADER_SIZE: usize = 12;
/// Size of one directory entry in bytes.
pub const DIR_ENTRY_SIZE: usize = 16;

/// Base game archive or patch archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WadKind {
    Iwad,
    Pwad,
}

/// One entry in the merged lump directory.
#[derive(Clone, Debug)]
pub struct LumpInfo {
    pub name: [u8; 8],
    /// Index of the archive in load order.
    pub file: usize,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug)]
struct WadFile {
    path: PathBuf,
    handle: File,
}

/// All loaded archives plus the merged directory and the lump cache.
#[derive(Debug)]
pub struct Wad {
    files: Vec<WadFile>,
    lumps: Vec<LumpInfo>,
    /// upper-case name → most recent directory index
    by_name: HashMap<String, usize>,
    cache: Vec<OnceCell<Vec<u8>>>,
    modified: bool,
}

#[derive(Error, Debug)]
pub enum WadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0} doesn't have IWAD or PWAD id")]
    BadMagic(PathBuf),

    #[error("{path}: bad header (lumps {num_lumps}, directory at {dir_offset})")]
    BadHeader {
        path: PathBuf,
        num_lumps: i32,
        dir_offset: i32,
    },

    #[error("{0}: directory extends beyond end of file")]
    DirectoryOutOfBounds(PathBuf),

    #[error("lump {name} (# {index}) slice {offset}+{size} past EOF ({file_size})")]
    BadOffset {
        index: usize,
        name: String,
        offset: i32,
        size: i32,
        file_size: u64,
    },

    #[error("no lumps found")]
    NoLumps,

    #[error("lump {0} not found")]
    NotFound(String),

    #[error("lump index {index} >= num_lumps ({num_lumps})")]
    BadIndex { index: usize, num_lumps: usize },

    #[error("lump {name} (# {index}) size {size} not multiple of element {elem_size}")]
    BadLumpSize {
        index: usize,
        name: String,
        size: usize,
        elem_size: usize,
    },

    #[error("lump {name} (# {index}) element {elem}: {source}")]
    BadElement {
        index: usize,
        name: String,
        elem: usize,
        source: bincode::error::DecodeError,
    },
}

impl Wad {
    // ------------------------------------------------------------------ //
    // Loading
    // ------------------------------------------------------------------ //

    /// Load `paths` in order.  Later archives override earlier ones.
    ///
    /// Files that cannot be opened are skipped with a warning; a bad header
    /// is an error, and so is ending up with an empty directory.
    pub fn load<I, P>(paths: I) -> Result<Self, WadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut wad = Self::empty();
        for path in paths {
            let path = path.as_ref();
            match File::open(path) {
                Ok(handle) => wad.add_file(path, handle)?,
                Err(e) => warn!("couldn't read {}: {e}", path.display()),
            }
        }
        if wad.lumps.is_empty() {
            return Err(WadError::NoLumps);
        }
        Ok(wad)
    }

    /// Convenience for a single archive.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WadError> {
        Self::load([path])
    }

    fn empty() -> Self {
        Self {
            files: Vec::new(),
            lumps: Vec::new(),
            by_name: HashMap::new(),
            cache: Vec::new(),
            modified: false,
        }
    }

    fn add_file(&mut self, path: &Path, mut handle: File) -> Result<(), WadError> {
        let file_size = handle.metadata()?.len();

        let mut magic = [0u8; 4];
        handle.read_exact(&mut magic)?;
        let kind = match &magic {
            b"IWAD" => WadKind::Iwad,
            b"PWAD" => WadKind::Pwad,
            _ => return Err(WadError::BadMagic(path.into())),
        };

        let num_lumps = handle.read_i32::<LE>()?;
        let dir_offset = handle.read_i32::<LE>()?;
        if num_lumps < 0 || dir_offset < 0 {
            return Err(WadError::BadHeader {
                path: path.into(),
                num_lumps,
                dir_offset,
            });
        }

        let dir_len = num_lumps as u64 * DIR_ENTRY_SIZE as u64;
        if dir_offset as u64 + dir_len > file_size {
            return Err(WadError::DirectoryOutOfBounds(path.into()));
        }

        let mut dir = vec![0u8; dir_len as usize];
        handle.seek(SeekFrom::Start(dir_offset as u64))?;
        handle.read_exact(&mut dir)?;

        let file = self.files.len();
        let first = self.lumps.len();
        let mut cur = dir.as_slice();
        for i in 0..num_lumps as usize {
            let offset = cur.read_i32::<LE>()?;
            let size = cur.read_i32::<LE>()?;
            let mut name = [0u8; 8];
            cur.read_exact(&mut name)?;

            let end = offset as i64 + size as i64;
            if offset < 0 || size < 0 || end as u64 > file_size {
                return Err(WadError::BadOffset {
                    index: first + i,
                    name: Self::lump_name_str(&name).into(),
                    offset,
                    size,
                    file_size,
                });
            }
            self.lumps.push(LumpInfo {
                name,
                file,
                offset: offset as u32,
                size: size as u32,
            });
        }

        // later entries overwrite earlier ones: last loaded wins
        for (i, l) in self.lumps.iter().enumerate().skip(first) {
            self.by_name
                .insert(Self::lump_name_str(&l.name).to_ascii_uppercase(), i);
        }
        self.cache.resize_with(self.lumps.len(), OnceCell::new);

        if kind == WadKind::Pwad {
            self.modified = true;
        }
        info!(
            "adding {} ({:?}, {num_lumps} lumps)",
            path.display(),
            kind
        );
        self.files.push(WadFile {
            path: path.into(),
            handle,
        });
        Ok(())
    }

    // ------------------------------------------------------------------ //
    // Directory queries
    // ------------------------------------------------------------------ //

    /// Return &str view of an 8-byte lump name (trimmed at first NUL).
    pub fn lump_name_str(name: &[u8; 8]) -> &str {
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        std::str::from_utf8(&name[..end]).unwrap_or("?")
    }

    /// Expose directory as a read-only slice
    pub fn lumps(&self) -> &[LumpInfo] {
        &self.lumps
    }

    pub fn num_lumps(&self) -> usize {
        self.lumps.len()
    }

    /// `true` once any PWAD has been added.
    pub fn modified_game(&self) -> bool {
        self.modified
    }

    /// Path of the archive that lump `idx` came from.
    pub fn source_path(&self, idx: usize) -> Result<&Path, WadError> {
        let l = self.lump_info(idx)?;
        Ok(&self.files[l.file].path)
    }

    pub fn lump_info(&self, idx: usize) -> Result<&LumpInfo, WadError> {
        self.lumps.get(idx).ok_or(WadError::BadIndex {
            index: idx,
            num_lumps: self.lumps.len(),
        })
    }

    /// Case-insensitive lookup; the most recently loaded match wins.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    /// Like [`Wad::find`] but a missing lump is an error.
    pub fn require(&self, name: &str) -> Result<usize, WadError> {
        self.find(name)
            .ok_or_else(|| WadError::NotFound(name.to_owned()))
    }

    /// Byte length of lump `idx`.
    pub fn size(&self, idx: usize) -> Result<usize, WadError> {
        Ok(self.lump_info(idx)?.size as usize)
    }

    // ------------------------------------------------------------------ //
    // Lump data
    // ------------------------------------------------------------------ //

    /// Read lump `idx` from disk, bypassing the cache.
    pub fn read_raw(&self, idx: usize) -> Result<Vec<u8>, WadError> {
        let l = self.lump_info(idx)?;
        let mut handle = &self.files[l.file].handle;
        let mut buf = vec![0u8; l.size as usize];
        handle.seek(SeekFrom::Start(l.offset as u64))?;
        handle.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Bytes of lump `idx`, read once and kept for the store's lifetime.
    pub fn cached(&self, idx: usize) -> Result<&[u8], WadError> {
        let slot = self.cache.get(idx).ok_or(WadError::BadIndex {
            index: idx,
            num_lumps: self.lumps.len(),
        })?;
        let bytes = slot.get_or_try_init(|| {
            trace!("caching lump #{idx}");
            self.read_raw(idx)
        })?;
        Ok(bytes)
    }

    pub fn cached_by_name(&self, name: &str) -> Result<&[u8], WadError> {
        self.cached(self.require(name)?)
    }

    // ------------------------------------------------------------------ //
    // Generic decode helper
    // ------------------------------------------------------------------ //

    /// Decode lump `idx` as a packed array of little-endian `T` records.
    pub fn lump_to_vec<T>(&self, idx: usize) -> Result<Vec<T>, WadError>
    where
        T: Decode<()>,
    {
        let bytes = self.cached(idx)?;
        let elem = mem::size_of::<T>();
        let name = || Self::lump_name_str(&self.lumps[idx].name).to_owned();

        if bytes.len() % elem != 0 {
            return Err(WadError::BadLumpSize {
                index: idx,
                name: name(),
                size: bytes.len(),
                elem_size: elem,
            });
        }

        let cfg = config::standard()
            .with_fixed_int_encoding()
            .with_little_endian();
        let mut out = Vec::with_capacity(bytes.len() / elem);
        let mut slice = bytes;

        while !slice.is_empty() {
            let (val, read) =
                decode_from_slice::<T, _>(slice, cfg).map_err(|e| WadError::BadElement {
                    index: idx,
                    name: name(),
                    elem: out.len(),
                    source: e,
                })?;
            out.push(val);
            slice = &slice[read..];
        }
        Ok(out)
    }
}

// ==========================================================================
// Test archive builder (shared with other modules' tests)
// ==========================================================================

#[cfg(test)]
pub(crate) mod testwad {
    use std::io::Write;

    /// Assemble an archive in memory: header, lump data, then directory.
    pub fn build(magic: &[u8; 4], lumps: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::new();
        let mut dir: Vec<u8> = Vec::new();
        let mut offset = super::HEADER_SIZE;
        for (name, bytes) in lumps {
            data.extend_from_slice(bytes);
            let mut raw = [0u8; 8];
            raw[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend(&(offset as i32).to_le_bytes());
            dir.extend(&(bytes.len() as i32).to_le_bytes());
            dir.extend(&raw);
            offset += bytes.len();
        }
        let mut out = Vec::new();
        out.extend_from_slice(magic);
        out.extend(&(lumps.len() as i32).to_le_bytes());
        out.extend(&(offset as i32).to_le_bytes());
        out.extend(data);
        out.extend(dir);
        out
    }

    pub fn write(magic: &[u8; 4], lumps: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        tmp.write_all(&build(magic, lumps)).unwrap();
        tmp.flush().unwrap();
        tmp
    }
}

// ==========================================================================
// Tests
// ==========================================================================
