//! Archive access: the merged lump directory, raw map lumps and the
//! conversion into runtime map tables.

pub mod level;
pub mod loader;
pub mod raw;

pub use level::{LevelError, RawLevel};
pub use loader::{LoadError, build_level, load_level, load_level_by_name};
pub use raw::{LumpInfo, Wad, WadError, WadKind};
