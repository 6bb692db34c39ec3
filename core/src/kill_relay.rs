//! Kill-relay state machine (spec §4.6), grounded on
//! `original_source/firmware/sc/src/sc_relay.c`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayState {
    Init,
    Energised,
    Killed,
}

pub const READBACK_MISMATCH_THRESHOLD: u32 = 2;

/// Inputs sampled once per 10 ms tick to evaluate the five de-energise
/// triggers (spec §4.6).
pub struct TriggerInputs {
    pub any_heartbeat_confirmed: bool,
    pub plausibility_latched: bool,
    pub self_test_unhealthy: bool,
    pub esm_error_active: bool,
    /// True if the GPIO readback matched the last commanded state this
    /// tick.
    pub gpio_readback_matches: bool,
}

pub struct KillRelay {
    state: RelayState,
    readback_mismatch_counter: u32,
}

impl KillRelay {
    pub const fn new() -> Self {
        KillRelay {
            state: RelayState::Init,
            readback_mismatch_counter: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_killed(&self) -> bool {
        self.state == RelayState::Killed
    }

    /// `Init -> Energised`, permitted only after the startup self-test
    /// passes. A request while `Killed` is silently ignored (terminal
    /// state).
    pub fn energise(&mut self, startup_self_test_passed: bool) {
        match self.state {
            RelayState::Init if startup_self_test_passed => {
                self.state = RelayState::Energised;
            }
            RelayState::Killed => {
                // silently ignored — killed is terminal within a power cycle
            }
            _ => {}
        }
    }

    fn kill(&mut self) {
        self.state = RelayState::Killed;
    }

    /// Evaluates the five de-energise triggers in order; any true trigger
    /// kills the relay immediately. Resets the readback-mismatch counter on
    /// a matching readback tick.
    pub fn check_triggers(&mut self, inputs: &TriggerInputs) {
        if inputs.gpio_readback_matches {
            self.readback_mismatch_counter = 0;
        } else {
            self.readback_mismatch_counter = self.readback_mismatch_counter.saturating_add(1);
        }

        let readback_trigger = self.readback_mismatch_counter >= READBACK_MISMATCH_THRESHOLD;

        if inputs.any_heartbeat_confirmed
            || inputs.plausibility_latched
            || inputs.self_test_unhealthy
            || inputs.esm_error_active
            || readback_trigger
        {
            self.kill();
        }
    }

    /// `true` iff the relay should currently drive its GPIO output HIGH
    /// (energised). `Init` and `Killed` both read LOW.
    pub fn commanded_level(&self) -> u8 {
        match self.state {
            RelayState::Energised => 1,
            RelayState::Init | RelayState::Killed => 0,
        }
    }
}

impl Default for KillRelay {
    fn default() -> Self {
        Self::new()
    }
}
