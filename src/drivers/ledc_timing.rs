//! LEDC timer frequency limits.
//!
//! The timer divides its source clock by a 10.8 fixed-point divider and
//! then counts `2^bits` steps per period, so every (clock, resolution)
//! pair has a narrow band of whole-hertz frequencies it can produce.
//! Asking the driver for anything outside it fails the timer config.

/// Largest LEDC clock divider, as a raw 10.8 fixed-point value.
const DIV_MAX_RAW: u64 = (1 << 18) - 1;
const DIV_FRAC_BITS: u32 = 8;

/// Inclusive whole-hertz range a timer clocked at `src_clk_hz` can run at
/// with `resolution_bits` of duty resolution.
pub fn frequency_range_hz(src_clk_hz: u32, resolution_bits: u32) -> (u32, u32) {
    let steps = 1u64 << resolution_bits;
    let scaled = u64::from(src_clk_hz) << DIV_FRAC_BITS;
    let floor = scaled.div_ceil(DIV_MAX_RAW * steps);
    let ceiling = u64::from(src_clk_hz) / steps;
    (floor.max(1) as u32, ceiling as u32)
}

/// Nearest frequency to `requested_hz` the timer can actually produce.
pub fn reachable_frequency_hz(requested_hz: f32, src_clk_hz: u32, resolution_bits: u32) -> u32 {
    let (floor, ceiling) = frequency_range_hz(src_clk_hz, resolution_bits);
    (requested_hz.round() as u32).clamp(floor, ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XTAL_HZ: u32 = 40_000_000;
    const APB_HZ: u32 = 80_000_000;
    const RC_FAST_HZ: u32 = 17_500_000;

    #[test]
    fn fourteen_bit_floors_match_the_clock() {
        assert_eq!(frequency_range_hz(APB_HZ, 14).0, 5);
        assert_eq!(frequency_range_hz(XTAL_HZ, 14).0, 3);
        assert_eq!(frequency_range_hz(RC_FAST_HZ, 14).0, 2);
    }

    #[test]
    fn half_hertz_heartbeat_is_raised_to_the_floor() {
        assert_eq!(reachable_frequency_hz(0.5, XTAL_HZ, 14), 3);
    }

    #[test]
    fn in_range_request_is_rounded_not_clamped() {
        assert_eq!(reachable_frequency_hz(100.4, XTAL_HZ, 14), 100);
        assert_eq!(reachable_frequency_hz(1000.0, XTAL_HZ, 14), 1000);
    }

    #[test]
    fn request_above_ceiling_is_capped() {
        let (_, ceiling) = frequency_range_hz(XTAL_HZ, 14);
        assert_eq!(ceiling, 2441);
        assert_eq!(reachable_frequency_hz(50_000.0, XTAL_HZ, 14), ceiling);
    }

    #[test]
    fn fewer_bits_raise_both_limits() {
        let (lo14, hi14) = frequency_range_hz(XTAL_HZ, 14);
        let (lo10, hi10) = frequency_range_hz(XTAL_HZ, 10);
        assert!(lo10 > lo14 && hi10 > hi14);
    }
}
