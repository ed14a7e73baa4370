//! Integer raw-unit arithmetic helpers.
//!
//! Control decisions operate on raw feedback units (`u16`) so the loop never
//! compares floating-point positions.

use crate::config::FULL_PWM;

/// Map a fraction of travel onto `[min, max]`, rounding to nearest.
/// `frac` is clamped to `[0, 1]`, so the result never leaves the range.
#[inline]
pub fn lerp_u16(min: u16, max: u16, frac: f64) -> u16 {
    debug_assert!(min <= max, "lerp_u16: inverted range {min}..{max}");
    let frac = if frac.is_finite() {
        frac.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let span = f64::from(max.saturating_sub(min));
    let offset = (span * frac).round() as u16;
    min.saturating_add(offset).min(max)
}

/// PWM duty for a fraction of full speed, rounded to nearest. Any positive
/// ratio yields at least 1 so the motor is never silently disabled.
#[inline]
pub fn pwm_fraction(ratio: f32) -> u8 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    let duty = (f32::from(FULL_PWM) * ratio.min(1.0)).round();
    (duty as u8).max(1)
}
