//! Torque-vs-current plausibility engine (spec §4.5), grounded on
//! `original_source/firmware/sc/src/sc_plausibility.c`.

pub const DEBOUNCE_TICKS: u32 = 5;
pub const BACKUP_CUTOFF_CURRENT_MA: u32 = 1000;
pub const BACKUP_CUTOFF_TICKS: u32 = 10;
const ABS_THRESHOLD_MA: i32 = 2000;
const REL_THRESHOLD_PCT: i32 = 20;

/// 16-point torque%/current(mA) lookup table (spec §4.5).
const TORQUE_PCT_LUT: [u32; 16] = [
    0, 7, 13, 20, 27, 33, 40, 47, 53, 60, 67, 73, 80, 87, 93, 100,
];
const CURRENT_MA_LUT: [u32; 16] = [
    0, 1750, 3250, 5000, 6750, 8250, 10000, 11750, 13250, 15000, 16750, 18250, 20000, 21750,
    23250, 25000,
];

/// Linear interpolation of expected current (mA) for a given torque
/// percentage, using the 16-point reference table.
pub fn lookup_expected_current(torque_percent: u32) -> u32 {
    let torque_percent = torque_percent.min(100);
    if torque_percent <= TORQUE_PCT_LUT[0] {
        return CURRENT_MA_LUT[0];
    }
    let last = TORQUE_PCT_LUT.len() - 1;
    if torque_percent >= TORQUE_PCT_LUT[last] {
        return CURRENT_MA_LUT[last];
    }
    for i in 1..TORQUE_PCT_LUT.len() {
        if torque_percent <= TORQUE_PCT_LUT[i] {
            let (x0, x1) = (TORQUE_PCT_LUT[i - 1], TORQUE_PCT_LUT[i]);
            let (y0, y1) = (CURRENT_MA_LUT[i - 1], CURRENT_MA_LUT[i]);
            if x1 == x0 {
                return y0;
            }
            let num = (y1 as i64 - y0 as i64) * (torque_percent as i64 - x0 as i64);
            let den = x1 as i64 - x0 as i64;
            return (y0 as i64 + num / den) as u32;
        }
    }
    CURRENT_MA_LUT[last]
}

/// Implausibility test (spec §4.5): absolute threshold when `expected` is
/// near zero, otherwise a relative threshold floored at 2000 mA.
pub fn is_implausible(expected_ma: u32, actual_ma: u32) -> bool {
    let diff = (actual_ma as i32 - expected_ma as i32).abs();
    if expected_ma < 100 {
        diff > ABS_THRESHOLD_MA
    } else {
        let relative = (expected_ma as i64 * REL_THRESHOLD_PCT as i64 / 100) as i32;
        let threshold = relative.max(ABS_THRESHOLD_MA);
        diff > threshold
    }
}

#[derive(Default)]
pub struct PlausibilityEngine {
    debounce_counter: u32,
    backup_counter: u32,
    latched: bool,
}

impl PlausibilityEngine {
    pub const fn new() -> Self {
        PlausibilityEngine {
            debounce_counter: 0,
            backup_counter: 0,
            latched: false,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Called once per tick with the current torque/current readings and
    /// the FZC-brake-fault bit. Implements both the primary debounced
    /// plausibility check and the secondary backup cutoff.
    pub fn tick(&mut self, torque_percent: u32, current_ma: u32, fzc_brake_fault: bool) {
        let expected = lookup_expected_current(torque_percent);
        if is_implausible(expected, current_ma) {
            self.debounce_counter = self.debounce_counter.saturating_add(1);
            if self.debounce_counter >= DEBOUNCE_TICKS {
                self.latched = true;
            }
        } else {
            self.debounce_counter = 0;
        }

        if fzc_brake_fault && current_ma > BACKUP_CUTOFF_CURRENT_MA {
            self.backup_counter = self.backup_counter.saturating_add(1);
            if self.backup_counter >= BACKUP_CUTOFF_TICKS {
                self.latched = true;
            }
        } else {
            self.backup_counter = 0;
        }
    }
}
