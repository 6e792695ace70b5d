mod fixed;
mod tables;

pub use fixed::{
    FRACBITS, FRACUNIT, Fixed, FixedError, fixed_div, fixed_div2, fixed_mul, to_fixed,
};
pub use tables::{
    ANG45, ANG90, ANG180, ANG270, ANGLETOFINESHIFT, Angle, DBITS, FINEANGLES, FINEMASK,
    SLOPEBITS, SLOPERANGE, fine_angle, fine_cosine, fine_sine, fine_tangent, init_tables,
    slope_div, tan_to_angle,
};
