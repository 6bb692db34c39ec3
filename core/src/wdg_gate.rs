//! Watchdog-feed gate (spec §4.8), grounded on
//! `original_source/firmware/sc/src/sc_watchdog.c`. `SC_Watchdog_Feed`
//! toggles the WDI pin only when `allChecksOk`; here the five conditions
//! that make up `allChecksOk` are named explicitly rather than collapsed
//! into a caller-supplied bool.

pub struct WdgGateInputs {
    pub loop_completed: bool,
    pub stack_canary_ok: bool,
    pub ram_self_test_ok: bool,
    pub can_not_bus_off: bool,
    pub esm_not_active: bool,
}

/// `true` iff every gate condition holds; the caller toggles the external
/// watchdog pin iff this returns `true`, and skips the toggle otherwise so
/// the hardware watchdog resets the MCU after its own timeout.
pub fn should_feed(inputs: &WdgGateInputs) -> bool {
    inputs.loop_completed
        && inputs.stack_canary_ok
        && inputs.ram_self_test_ok
        && inputs.can_not_bus_off
        && inputs.esm_not_active
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ok() -> WdgGateInputs {
        WdgGateInputs {
            loop_completed: true,
            stack_canary_ok: true,
            ram_self_test_ok: true,
            can_not_bus_off: true,
            esm_not_active: true,
        }
    }

    #[test]
    fn feeds_only_when_all_five_conditions_hold() {
        assert!(should_feed(&all_ok()));
    }

    #[test]
    fn any_single_false_condition_skips_the_feed() {
        macro_rules! check {
            ($field:ident) => {
                let mut inputs = all_ok();
                inputs.$field = false;
                assert!(!should_feed(&inputs));
            };
        }
        check!(loop_completed);
        check!(stack_canary_ok);
        check!(ram_self_test_ok);
        check!(can_not_bus_off);
        check!(esm_not_active);
    }
}
