//! Render one frame of a map and report what the geometry core produced.
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- doom.wad [patch.wad] --map E1M1 --angle 90
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use log::info;

use yadoom_geo::{
    engine::{RendererContext, ViewConfig},
    math::{Angle, to_fixed},
    renderer::FrameLog,
    wad::{Wad, load_level},
    world::{TextureTable, Viewpoint},
};

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Archives to load, later ones override earlier ones
    #[arg(required = true, value_name = "WAD")]
    wads: Vec<PathBuf>,

    /// Map marker (defaults to the first map found)
    #[arg(long)]
    map: Option<String>,

    #[arg(long, default_value_t = 320)]
    width: usize,

    #[arg(long, default_value_t = 200)]
    height: usize,

    /// 0 = high detail, 1 = low detail
    #[arg(long, default_value_t = 0)]
    detail: u32,

    /// Turn left from the player start, in degrees
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    angle: i64,

    /// Walk forward from the player start, in map units
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    forward: i32,
}

fn degrees(deg: i64) -> Angle {
    ((deg.rem_euclid(360) << 32) / 360) as Angle
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    // ─────────── load WADs, textures & map ───────
    let wad = Wad::load(&opts.wads).context("loading archives")?;
    let textures = TextureTable::from_wad(&wad).context("reading texture metadata")?;

    let marker = match &opts.map {
        Some(name) => wad.require(name)?,
        None => match wad.level_indices().first() {
            Some(&idx) => idx,
            None => bail!("no maps in {:?}", opts.wads),
        },
    };
    let level = load_level(&wad, marker, &textures)?;

    // ─────────── place the view ───────
    let Some(start) = level.player_start() else {
        bail!("{} has no player start", level.name);
    };
    let mut view = Viewpoint::at_thing(&level, start);
    view.turn(degrees(opts.angle));
    view.step(to_fixed(opts.forward));

    // ─────────── one frame ───────
    let config = ViewConfig {
        width: opts.width,
        height: opts.height,
        detail_shift: opts.detail,
    };
    let mut ctx = RendererContext::with_view(config)?;
    let mut log = FrameLog::default();
    let stats = ctx.render_player_view(&level, &textures, &view, &mut log)?;

    info!(
        "{} from ({}, {}) facing {:#010x}",
        level.name,
        view.x >> 16,
        view.y >> 16,
        view.angle
    );

    let covered = log.wall_coverage(ctx.view_width()).iter().filter(|&&c| c).count();
    println!("map            {}", level.name);
    println!("view           {}x{} (detail {})", ctx.view_width(), ctx.view_height(), opts.detail);
    println!("nodes visited  {}", stats.nodes_visited);
    println!("bbox rejects   {}", stats.bbox_rejects);
    println!("subsectors     {}", stats.subsectors);
    println!("segs checked   {}", stats.segs_checked);
    println!("wall ranges    {}", stats.wall_ranges);
    println!("wall columns   {} ({covered}/{} screen columns)", stats.wall_columns, ctx.view_width());
    println!("visplanes      {}", stats.visplanes);
    println!("plane spans    {}", stats.plane_spans);
    println!("sky columns    {}", stats.sky_columns);
    Ok(())
}
