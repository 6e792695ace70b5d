//! ----------------------------------------------------------------------------
//! **Renderer context**
//!
//! Owns every piece of mutable engine state: view geometry, the projection
//! and light tables, the viewpoint of the current frame, the traversal
//! epoch, clip ranges, draw segs and visplanes.  The only shared state left
//! is the immutable trig tables in `math`.
//!
//! Lifecycle:
//! * `RendererContext::new`: **Uninitialized**
//! * `set_view_size`: builds the tables, **TablesBuilt**
//! * `render_player_view`: **Active** while the BSP is walked, back to
//!   TablesBuilt once the frame is complete.
//! ----------------------------------------------------------------------------

use log::debug;
use thiserror::Error;

use crate::{
    engine::{
        lighting::LightTables,
        types::{ClipRange, DrawSeg, FrameStats},
        visplane::PlaneMap,
    },
    math::{
        ANG90, ANGLETOFINESHIFT, Angle, FINEANGLES, FRACBITS, FRACUNIT, Fixed, FixedError, fine_cosine,
        fine_sine, fixed_div, init_tables,
    },
    renderer::Rasterizer,
    world::{Level, TextureTable, Viewpoint},
};

/*──────────────────────────── Errors ───────────────────────────────*/

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RenderError {
    #[error("view tables not built: call set_view_size first")]
    TablesNotBuilt,

    #[error("view size cannot change in the middle of a frame")]
    MidFrame,

    #[error("invalid view size {width}x{height} (detail shift {detail_shift})")]
    BadViewSize {
        width: usize,
        height: usize,
        detail_shift: u32,
    },

    #[error(transparent)]
    Fixed(#[from] FixedError),
}

/*──────────────────────────── Config ───────────────────────────────*/

/// Output size the tables are built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewConfig {
    pub width: usize,
    pub height: usize,
    /// 0 = high detail, 1 = low detail (every column drawn twice).
    pub detail_shift: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 200,
            detail_shift: 0,
        }
    }
}

impl ViewConfig {
    fn validate(&self) -> Result<(), RenderError> {
        let ok = self.detail_shift <= 1
            && (self.width >> self.detail_shift) >= 2
            && self.height >= 2
            && self.width <= 4096
            && self.height <= 4096;
        if ok {
            Ok(())
        } else {
            Err(RenderError::BadViewSize {
                width: self.width,
                height: self.height,
                detail_shift: self.detail_shift,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Uninitialized,
    TablesBuilt,
    Active,
}

/*──────────────────────────── Context ──────────────────────────────*/

pub struct RendererContext {
    pub(crate) phase: RenderPhase,
    pub(crate) config: ViewConfig,

    /* view geometry */
    pub(crate) view_width: i32,
    pub(crate) view_height: i32,
    pub(crate) detail_shift: u32,
    pub(crate) center_x: i32,
    pub(crate) center_y: i32,
    pub(crate) center_x_frac: Fixed,
    pub(crate) center_y_frac: Fixed,
    pub(crate) projection: Fixed,

    /* projection tables */
    pub(crate) view_angle_to_x: Vec<i32>,
    pub(crate) x_to_view_angle: Vec<Angle>,
    pub(crate) clip_angle: Angle,
    pub(crate) y_slope: Vec<Fixed>,
    pub(crate) dist_scale: Vec<Fixed>,
    pub(crate) lights: LightTables,

    /* current frame */
    pub(crate) view: Viewpoint,
    pub(crate) view_sin: Fixed,
    pub(crate) view_cos: Fixed,
    pub(crate) validcount: u32,
    pub(crate) framecount: u32,
    pub(crate) solid_segs: Vec<ClipRange>,
    pub(crate) draw_segs: Vec<DrawSeg>,
    pub(crate) planes: PlaneMap,
    pub(crate) floor_clip: Vec<i32>,
    pub(crate) ceiling_clip: Vec<i32>,
    pub(crate) base_x_scale: Fixed,
    pub(crate) base_y_scale: Fixed,
    pub(crate) stats: FrameStats,
}

impl Default for RendererContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererContext {
    pub fn new() -> Self {
        init_tables();
        Self {
            phase: RenderPhase::Uninitialized,
            config: ViewConfig::default(),
            view_width: 0,
            view_height: 0,
            detail_shift: 0,
            center_x: 0,
            center_y: 0,
            center_x_frac: 0,
            center_y_frac: 0,
            projection: 0,
            view_angle_to_x: Vec::new(),
            x_to_view_angle: Vec::new(),
            clip_angle: 0,
            y_slope: Vec::new(),
            dist_scale: Vec::new(),
            lights: LightTables::default(),
            view: Viewpoint::new(0, 0, 0, 0),
            view_sin: 0,
            view_cos: 0,
            validcount: 0,
            framecount: 0,
            solid_segs: Vec::new(),
            draw_segs: Vec::new(),
            planes: PlaneMap::default(),
            floor_clip: Vec::new(),
            ceiling_clip: Vec::new(),
            base_x_scale: 0,
            base_y_scale: 0,
            stats: FrameStats::default(),
        }
    }

    /// Build a context and its tables for `config` in one go.
    pub fn with_view(config: ViewConfig) -> Result<Self, RenderError> {
        let mut ctx = Self::new();
        ctx.set_view_size(config)?;
        Ok(ctx)
    }

    /*──────────────────────── accessors ───────────────────────*/

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn config(&self) -> ViewConfig {
        self.config
    }

    pub fn view_width(&self) -> usize {
        self.view_width as usize
    }

    pub fn view_height(&self) -> usize {
        self.view_height as usize
    }

    pub fn clip_angle(&self) -> Angle {
        self.clip_angle
    }

    pub fn view_angle_to_x(&self) -> &[i32] {
        &self.view_angle_to_x
    }

    pub fn x_to_view_angle(&self) -> &[Angle] {
        &self.x_to_view_angle
    }

    pub fn y_slope(&self) -> &[Fixed] {
        &self.y_slope
    }

    pub fn dist_scale(&self) -> &[Fixed] {
        &self.dist_scale
    }

    pub fn viewpoint(&self) -> &Viewpoint {
        &self.view
    }

    pub fn validcount(&self) -> u32 {
        self.validcount
    }

    pub fn framecount(&self) -> u32 {
        self.framecount
    }

    pub fn draw_segs(&self) -> &[DrawSeg] {
        &self.draw_segs
    }

    pub fn planes(&self) -> &PlaneMap {
        &self.planes
    }

    pub fn solid_segs(&self) -> &[ClipRange] {
        &self.solid_segs
    }

    /// Start a new search pass outside the frame walk (line/sector
    /// `validcount` stamps compare against this).
    pub fn next_validcount(&mut self) -> u32 {
        self.validcount = self.validcount.wrapping_add(1);
        self.validcount
    }

    /*──────────────────────── view size ───────────────────────*/

    /// (Re)build every table that depends on the output size.
    pub fn set_view_size(&mut self, config: ViewConfig) -> Result<(), RenderError> {
        if self.phase == RenderPhase::Active {
            return Err(RenderError::MidFrame);
        }
        config.validate()?;

        self.config = config;
        self.detail_shift = config.detail_shift;
        self.view_width = (config.width >> config.detail_shift) as i32;
        self.view_height = config.height as i32;
        self.center_x = self.view_width / 2;
        self.center_y = self.view_height / 2;
        self.center_x_frac = self.center_x << FRACBITS;
        self.center_y_frac = self.center_y << FRACBITS;
        self.projection = self.center_x_frac;

        self.init_texture_mapping()?;

        // distance of each row's floor/ceiling at unit height
        let scaled = (self.view_width << self.detail_shift) / 2 * FRACUNIT;
        self.y_slope = (0..self.view_height)
            .map(|i| {
                let dy = (((i - self.view_height / 2) << FRACBITS) + FRACUNIT / 2).abs();
                fixed_div(scaled, dy)
            })
            .collect::<Result<_, _>>()?;

        // undo the fish-eye of a flat projection
        self.dist_scale = self.x_to_view_angle[..self.view_width as usize]
            .iter()
            .map(|&a| {
                let cos_adj = fine_cosine((a >> ANGLETOFINESHIFT) as usize).abs();
                fixed_div(FRACUNIT, cos_adj)
            })
            .collect::<Result<_, _>>()?;

        self.lights = LightTables::build(self.view_width, self.detail_shift)?;

        let w = self.view_width as usize;
        self.floor_clip = vec![self.view_height; w];
        self.ceiling_clip = vec![-1; w];
        self.planes.resize(w);
        self.phase = RenderPhase::TablesBuilt;

        debug!(
            "view {}x{} (detail {}): clip angle {:#x}, projection {:#x}",
            self.view_width, self.view_height, self.detail_shift, self.clip_angle, self.projection
        );
        Ok(())
    }

    /*──────────────────────── per frame ───────────────────────*/

    /// Adopt `viewpoint` for the frame and open a new traversal epoch.
    pub fn setup_frame(&mut self, viewpoint: &Viewpoint) {
        self.view = *viewpoint;
        self.view_sin = viewpoint.sin();
        self.view_cos = viewpoint.cos();
        self.framecount = self.framecount.wrapping_add(1);
        self.validcount = self.validcount.wrapping_add(1);
    }

    /// Render one frame: walk `level` front to back from `viewpoint` and
    /// feed every visible wall column, floor/ceiling span and sky column to
    /// `sink`.  Level data is only read.
    pub fn render_player_view<R: Rasterizer + ?Sized>(
        &mut self,
        level: &Level,
        textures: &TextureTable,
        viewpoint: &Viewpoint,
        sink: &mut R,
    ) -> Result<FrameStats, RenderError> {
        match self.phase {
            RenderPhase::Uninitialized => return Err(RenderError::TablesNotBuilt),
            RenderPhase::Active => return Err(RenderError::MidFrame),
            RenderPhase::TablesBuilt => {}
        }

        self.setup_frame(viewpoint);
        self.stats = FrameStats::default();
        self.clear_clip_segs();
        self.draw_segs.clear();
        self.clear_planes();

        self.phase = RenderPhase::Active;
        self.render_bsp_node(level, textures, level.bsp_root(), sink);
        self.draw_planes(textures, sink);
        self.phase = RenderPhase::TablesBuilt;

        self.stats.visplanes = self.planes.len();
        debug!("frame {}: {:?}", self.framecount, self.stats);
        Ok(self.stats)
    }

    /// Reset the per-column clip arrays and the plane texture steps.
    pub(crate) fn clear_planes(&mut self) {
        self.floor_clip.fill(self.view_height);
        self.ceiling_clip.fill(-1);
        self.planes.clear();

        // left to right mapping
        let angle = (self.view.angle.wrapping_sub(ANG90) >> ANGLETOFINESHIFT) as usize;
        // scale will be unit scale at SCREENWIDTH/2 distance
        self.base_x_scale = fixed_div(fine_cosine(angle), self.center_x_frac).unwrap_or(0);
        self.base_y_scale = fixed_div(fine_sine(angle), self.center_x_frac)
            .unwrap_or(0)
            .wrapping_neg();
    }
}

/// Fine angles in the forward half circle.
pub(crate) const HALF_FINE: usize = FINEANGLES / 2;
