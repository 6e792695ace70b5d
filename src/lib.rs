//! Fixed-point geometry core of a classic Doom renderer.
//!
//! * [`wad`]: archive directory, raw map lumps and level setup
//! * [`world`]: runtime map tables, BSP point queries, texture metadata
//! * [`engine`]: per-frame visibility, projection and lighting
//! * [`renderer`]: the seam a pixel backend plugs into

pub mod engine;
pub mod math;
pub mod renderer;
pub mod wad;
pub mod world;
