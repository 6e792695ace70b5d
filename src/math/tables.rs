//! Binary angles and the fine trigonometric lookup tables.
//!
//! A full turn is the whole `u32` range (`ANG90 = 0x4000_0000`), so angle
//! arithmetic simply wraps.  Trig lookups use the top 13 bits: 8192 *fine*
//! angles per turn.
//!
//! Tables are generated once, on first use, and are read-only afterwards.

use once_cell::sync::Lazy;
use std::f64::consts::{PI, TAU};

use super::fixed::{FRACUNIT, Fixed};

/// Binary angle measurement: `0 ..= u32::MAX` covers `[0, 2π)`.
pub type Angle = u32;

pub const ANG45: Angle = 0x2000_0000;
pub const ANG90: Angle = 0x4000_0000;
pub const ANG180: Angle = 0x8000_0000;
pub const ANG270: Angle = 0xc000_0000;

pub const FINEANGLES: usize = 8192;
pub const FINEMASK: usize = FINEANGLES - 1;
/// `angle >> ANGLETOFINESHIFT` gives a fine angle.
pub const ANGLETOFINESHIFT: u32 = 19;

pub const SLOPERANGE: usize = 2048;
pub const SLOPEBITS: u32 = 11;
pub const DBITS: u32 = 16 - SLOPEBITS;

struct TrigTables {
    fine_sine: Box<[Fixed]>,
    fine_tangent: Box<[Fixed]>,
    tan_to_angle: Box<[Angle]>,
}

impl TrigTables {
    fn build() -> Self {
        // Sample at the centre of each fine step; truncate toward zero.
        let fine_sine = (0..FINEANGLES)
            .map(|i| {
                let a = (i as f64 + 0.5) * TAU / FINEANGLES as f64;
                (a.sin() * FRACUNIT as f64) as Fixed
            })
            .collect();

        // Half a turn, from -90° to +90°.
        let fine_tangent = (0..FINEANGLES / 2)
            .map(|i| {
                let a = (i as f64 - (FINEANGLES / 4) as f64 + 0.5) * TAU / FINEANGLES as f64;
                (a.tan() * FRACUNIT as f64) as Fixed
            })
            .collect();

        // atan(i / 2048) for slopes in [0, 1], as a binary angle.
        let tan_to_angle = (0..=SLOPERANGE)
            .map(|i| {
                let a = (i as f64 / SLOPERANGE as f64).atan();
                (a / (2.0 * PI) * 4_294_967_296.0) as Angle
            })
            .collect();

        Self {
            fine_sine,
            fine_tangent,
            tan_to_angle,
        }
    }
}

static TABLES: Lazy<TrigTables> = Lazy::new(TrigTables::build);

/// Force table generation (otherwise done on first lookup).
pub fn init_tables() {
    Lazy::force(&TABLES);
}

/// Fine-angle index of a binary angle.
#[inline(always)]
pub fn fine_angle(angle: Angle) -> usize {
    (angle >> ANGLETOFINESHIFT) as usize
}

#[inline(always)]
pub fn fine_sine(fine: usize) -> Fixed {
    TABLES.fine_sine[fine & FINEMASK]
}

/// Cosine is sine a quarter turn ahead; no separate storage.
#[inline(always)]
pub fn fine_cosine(fine: usize) -> Fixed {
    TABLES.fine_sine[(fine + FINEANGLES / 4) & FINEMASK]
}

/// Tangent for fine angles `0 .. FINEANGLES/2`, i.e. -90°..+90°.
#[inline(always)]
pub fn fine_tangent(fine: usize) -> Fixed {
    TABLES.fine_tangent[fine & (FINEANGLES / 2 - 1)]
}

#[inline(always)]
pub fn tan_to_angle(slope: usize) -> Angle {
    TABLES.tan_to_angle[slope.min(SLOPERANGE)]
}

/// `num / den` scaled to `0 ..= SLOPERANGE` for a `tan_to_angle` lookup.
///
/// Callers guarantee `num <= den`; the pre-shift keeps the division far
/// from the overflow range of `fixed_div`.
#[inline]
pub fn slope_div(num: u32, den: u32) -> usize {
    if den < 512 {
        return SLOPERANGE;
    }
    let ans = (num << 3) / (den >> 8);
    (ans as usize).min(SLOPERANGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_reference_values() {
        assert_eq!(fine_sine(0), 25);
        assert_eq!(fine_sine(1), 75);
        assert_eq!(fine_sine(2047), 65535);
        assert_eq!(fine_sine(4096), -25);
    }

    #[test]
    fn cosine_is_offset_sine() {
        for i in [0usize, 1, 1000, 2048, 6000, 8191] {
            assert_eq!(fine_cosine(i), fine_sine((i + 2048) & FINEMASK));
        }
        assert_eq!(fine_cosine(0), 65535);
    }

    #[test]
    fn tangent_is_odd_around_quarter() {
        assert_eq!(fine_tangent(2048), -fine_tangent(2047));
        assert!(fine_tangent(0) < -170_000_000);
        assert_eq!(fine_tangent(3072), 65586);
    }

    #[test]
    fn tan_to_angle_endpoints() {
        assert_eq!(tan_to_angle(0), 0);
        assert_eq!(tan_to_angle(1), 333_772);
        assert_eq!(tan_to_angle(SLOPERANGE), ANG45);
        // clamped
        assert_eq!(tan_to_angle(SLOPERANGE + 100), ANG45);
    }

    #[test]
    fn slope_div_clamps() {
        assert_eq!(slope_div(10, 100), SLOPERANGE);
        assert_eq!(slope_div(FRACUNIT as u32, FRACUNIT as u32), SLOPERANGE);
        assert_eq!(slope_div(FRACUNIT as u32 / 2, FRACUNIT as u32), SLOPERANGE / 2);
        assert_eq!(slope_div(0, FRACUNIT as u32), 0);
    }
}
