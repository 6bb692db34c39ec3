//! Self-test sequencer (spec §4.7), grounded on
//! `original_source/firmware/sc/src/sc_selftest.c`.

use crate::platform::Bist;

/// Runtime self-test period: 60 s at a 10 ms tick = 6000 ticks, split into
/// four quarters of 1500 ticks each.
pub const RUNTIME_PERIOD_TICKS: u32 = 6000;
const RUNTIME_STEP_OFFSETS: [u32; 4] = [
    1,
    RUNTIME_PERIOD_TICKS / 4,
    RUNTIME_PERIOD_TICKS / 2,
    RUNTIME_PERIOD_TICKS * 3 / 4,
];

const STACK_CANARY_PATTERN: u32 = 0xDEAD_BEEF;

pub struct SelfTest {
    startup_passed: bool,
    runtime_healthy: bool,
    runtime_tick: u32,
    canary: u32,
}

impl SelfTest {
    pub const fn new() -> Self {
        SelfTest {
            startup_passed: false,
            runtime_healthy: false,
            runtime_tick: 0,
            canary: 0,
        }
    }

    /// Stamps the stack canary pattern. Must be called before
    /// [`Self::canary_ok`] is meaningful.
    pub fn init_canary(&mut self) {
        self.canary = STACK_CANARY_PATTERN;
    }

    pub fn canary_ok(&self) -> bool {
        self.canary == STACK_CANARY_PATTERN
    }

    /// Corrupts the canary — for test harnesses simulating stack overflow.
    pub fn corrupt_canary(&mut self) {
        self.canary = 0;
    }

    /// Runs the seven startup BIST steps in order. Returns the 1-based
    /// failing step number on the first failure, or 0 if all pass. Sets
    /// `startup_passed` accordingly.
    pub fn run_startup(&mut self, bist: &mut dyn Bist) -> u8 {
        let steps: [fn(&mut dyn Bist) -> bool; 7] = [
            |b| b.hw_bist_cpu_lockstep(),
            |b| b.hw_bist_ram_pbist(),
            |b| b.hw_bist_flash_crc32(),
            |b| b.hw_bist_can_loopback(),
            |b| b.hw_bist_gpio_readback(),
            |b| b.hw_bist_led_lamp_test(),
            |b| b.hw_bist_watchdog_test(),
        ];
        for (i, step) in steps.iter().enumerate() {
            if !step(bist) {
                self.startup_passed = false;
                return (i + 1) as u8;
            }
        }
        self.startup_passed = true;
        self.runtime_healthy = true;
        0
    }

    pub fn startup_passed(&self) -> bool {
        self.startup_passed
    }

    /// Called once per 10 ms tick. Runs one of the four runtime steps at
    /// fixed offsets within a [`RUNTIME_PERIOD_TICKS`]-tick period, wrapping
    /// the period counter. Any failing step sets `runtime_healthy` to
    /// false, sticky within the power cycle.
    pub fn run_runtime_tick(&mut self, bist: &mut dyn Bist) {
        self.runtime_tick = self.runtime_tick.wrapping_add(1);
        if self.runtime_tick >= RUNTIME_PERIOD_TICKS {
            self.runtime_tick = 0;
        }

        let step_ok = if self.runtime_tick == RUNTIME_STEP_OFFSETS[0] {
            Some(bist.hw_bist_flash_crc_incremental())
        } else if self.runtime_tick == RUNTIME_STEP_OFFSETS[1] {
            Some(bist.hw_bist_ram_pattern())
        } else if self.runtime_tick == RUNTIME_STEP_OFFSETS[2] {
            Some(bist.hw_bist_can_error_status())
        } else if self.runtime_tick == RUNTIME_STEP_OFFSETS[3] {
            Some(bist.hw_bist_gpio_readback_runtime())
        } else {
            None
        };

        if let Some(false) = step_ok {
            self.runtime_healthy = false;
        }
    }

    /// `startup_passed AND runtime_healthy`.
    pub fn is_healthy(&self) -> bool {
        self.startup_passed && self.runtime_healthy
    }
}

impl Default for SelfTest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllPass;
    impl Bist for AllPass {
        fn hw_bist_cpu_lockstep(&mut self) -> bool {
            true
        }
        fn hw_bist_ram_pbist(&mut self) -> bool {
            true
        }
        fn hw_bist_flash_crc32(&mut self) -> bool {
            true
        }
        fn hw_bist_can_loopback(&mut self) -> bool {
            true
        }
        fn hw_bist_gpio_readback(&mut self) -> bool {
            true
        }
        fn hw_bist_led_lamp_test(&mut self) -> bool {
            true
        }
        fn hw_bist_watchdog_test(&mut self) -> bool {
            true
        }
        fn hw_bist_flash_crc_incremental(&mut self) -> bool {
            true
        }
        fn hw_bist_ram_pattern(&mut self) -> bool {
            true
        }
        fn hw_bist_can_error_status(&mut self) -> bool {
            true
        }
        fn hw_bist_gpio_readback_runtime(&mut self) -> bool {
            true
        }
    }

    struct FailsAtStep(u8, u32);
    impl Bist for FailsAtStep {
        fn hw_bist_cpu_lockstep(&mut self) -> bool {
            self.0 != 1
        }
        fn hw_bist_ram_pbist(&mut self) -> bool {
            self.0 != 2
        }
        fn hw_bist_flash_crc32(&mut self) -> bool {
            self.0 != 3
        }
        fn hw_bist_can_loopback(&mut self) -> bool {
            self.0 != 4
        }
        fn hw_bist_gpio_readback(&mut self) -> bool {
            self.0 != 5
        }
        fn hw_bist_led_lamp_test(&mut self) -> bool {
            self.0 != 6
        }
        fn hw_bist_watchdog_test(&mut self) -> bool {
            self.0 != 7
        }
        fn hw_bist_flash_crc_incremental(&mut self) -> bool {
            self.1 != 1
        }
        fn hw_bist_ram_pattern(&mut self) -> bool {
            self.1 != 2
        }
        fn hw_bist_can_error_status(&mut self) -> bool {
            self.1 != 3
        }
        fn hw_bist_gpio_readback_runtime(&mut self) -> bool {
            self.1 != 4
        }
    }

    #[test]
    fn startup_all_pass_returns_zero_and_sets_passed() {
        let mut st = SelfTest::new();
        let mut bist = AllPass;
        assert_eq!(st.run_startup(&mut bist), 0);
        assert!(st.startup_passed());
    }

    #[test]
    fn startup_failure_returns_1_based_step_and_stops() {
        let mut st = SelfTest::new();
        let mut bist = FailsAtStep(3, 0);
        assert_eq!(st.run_startup(&mut bist), 3);
        assert!(!st.startup_passed());
        assert!(!st.is_healthy());
    }

    #[test]
    fn runtime_failure_is_sticky() {
        let mut st = SelfTest::new();
        let mut pass = AllPass;
        st.run_startup(&mut pass);
        assert!(st.is_healthy());

        let mut fail_ram = FailsAtStep(0, 2);
        for _ in 0..RUNTIME_STEP_OFFSETS[1] {
            st.run_runtime_tick(&mut fail_ram);
        }
        assert!(!st.is_healthy());

        // Even once the failure stops recurring, healthy stays false.
        let mut pass2 = AllPass;
        for _ in 0..RUNTIME_PERIOD_TICKS {
            st.run_runtime_tick(&mut pass2);
        }
        assert!(!st.is_healthy());
    }

    #[test]
    fn canary_detects_corruption() {
        let mut st = SelfTest::new();
        st.init_canary();
        assert!(st.canary_ok());
        st.corrupt_canary();
        assert!(!st.canary_ok());
    }
}
