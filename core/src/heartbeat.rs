//! Per-peer heartbeat monitor (spec §4.4), grounded on
//! `original_source/firmware/sc/src/sc_heartbeat.c`.

pub const HB_TIMEOUT_TICKS: u32 = 15;
pub const HB_CONFIRM_TICKS: u32 = 5;

/// The three peers the Safety Controller monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EcuId {
    Cvc,
    Fzc,
    Rzc,
}

pub const ECU_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
struct PeerState {
    counter: u32,
    timed_out: bool,
    confirm_counter: u32,
    confirmed: bool,
}

/// Fusion state for all monitored peers, plus the FZC-brake-fault bit
/// decoded from the CVC heartbeat payload.
///
/// `sc_heartbeat.c` leaves `SC_Heartbeat_IsFzcBrakeFault` a `TODO:POST-BETA`
/// stub that always returns false; here it is completed by decoding bit 0
/// of byte 1 of the CVC heartbeat payload (Data-ID 0x02) via
/// [`HeartbeatMonitor::notify_cvc_payload`].
#[derive(Default)]
pub struct HeartbeatMonitor {
    peers: [PeerState; ECU_COUNT],
    fzc_brake_fault: bool,
}

fn idx(ecu: EcuId) -> usize {
    match ecu {
        EcuId::Cvc => 0,
        EcuId::Fzc => 1,
        EcuId::Rzc => 2,
    }
}

impl HeartbeatMonitor {
    pub const fn new() -> Self {
        HeartbeatMonitor {
            peers: [PeerState {
                counter: 0,
                timed_out: false,
                confirm_counter: 0,
                confirmed: false,
            }; ECU_COUNT],
            fzc_brake_fault: false,
        }
    }

    /// Reset per spec §4.4: if not already confirmed, reset counter, clear
    /// timed_out, clear confirm_counter. Confirmation is terminal — no-op
    /// once `confirmed`.
    pub fn notify_rx(&mut self, ecu: EcuId) {
        let p = &mut self.peers[idx(ecu)];
        if p.confirmed {
            return;
        }
        p.counter = 0;
        p.timed_out = false;
        p.confirm_counter = 0;
    }

    /// Decodes the FZC-brake-fault bit (bit 0 of payload byte 1) from a CVC
    /// heartbeat frame and also performs the ordinary `notify_rx` reset.
    pub fn notify_cvc_payload(&mut self, payload: &[u8]) {
        self.notify_rx(EcuId::Cvc);
        if let Some(&byte1) = payload.get(1) {
            self.fzc_brake_fault = byte1 & 0x01 != 0;
        }
    }

    pub fn fzc_brake_fault(&self) -> bool {
        self.fzc_brake_fault
    }

    /// Called once per 10 ms tick. For each peer not yet confirmed,
    /// increments its counter (saturating); the tick that first reaches
    /// [`HB_TIMEOUT_TICKS`] sets `timed_out` and starts the confirmation
    /// window, and only the ticks *after* that one advance
    /// `confirm_counter`, so `confirmed` latches [`HB_CONFIRM_TICKS`] ticks
    /// later (the 20th tick overall, not the 19th).
    pub fn monitor_tick(&mut self) {
        for p in &mut self.peers {
            if p.confirmed {
                continue;
            }
            p.counter = p.counter.saturating_add(1);
            if p.counter >= HB_TIMEOUT_TICKS {
                if !p.timed_out {
                    p.timed_out = true;
                } else {
                    p.confirm_counter = p.confirm_counter.saturating_add(1);
                    if p.confirm_counter >= HB_CONFIRM_TICKS {
                        p.confirmed = true;
                    }
                }
            }
        }
    }

    pub fn is_timed_out(&self, ecu: EcuId) -> bool {
        self.peers[idx(ecu)].timed_out
    }

    pub fn is_confirmed(&self, ecu: EcuId) -> bool {
        self.peers[idx(ecu)].confirmed
    }

    pub fn is_any_confirmed(&self) -> bool {
        self.peers.iter().any(|p| p.confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_ticks_14_15_19_20() {
        let mut hb = HeartbeatMonitor::new();
        for _ in 0..14 {
            hb.monitor_tick();
        }
        assert!(!hb.is_timed_out(EcuId::Cvc));

        hb.monitor_tick(); // 15th
        assert!(hb.is_timed_out(EcuId::Cvc));

        for _ in 0..4 {
            hb.monitor_tick();
        }
        // 19 ticks total
        assert!(!hb.is_confirmed(EcuId::Cvc));

        hb.monitor_tick(); // 20th
        assert!(hb.is_confirmed(EcuId::Cvc));
    }

    #[test]
    fn confirmed_implies_timed_out_and_is_sticky() {
        let mut hb = HeartbeatMonitor::new();
        for _ in 0..20 {
            hb.monitor_tick();
        }
        assert!(hb.is_confirmed(EcuId::Cvc));
        assert!(hb.is_timed_out(EcuId::Cvc));
        hb.notify_rx(EcuId::Cvc);
        // confirmation is terminal: notify_rx is a no-op once confirmed.
        assert!(hb.is_confirmed(EcuId::Cvc));
        assert!(hb.is_timed_out(EcuId::Cvc));
    }

    #[test]
    fn resume_inside_confirmation_window_clears_timed_out() {
        let mut hb = HeartbeatMonitor::new();
        for _ in 0..15 {
            hb.monitor_tick();
        }
        assert!(hb.is_timed_out(EcuId::Cvc));
        hb.notify_rx(EcuId::Cvc);
        hb.notify_rx(EcuId::Fzc);
        hb.notify_rx(EcuId::Rzc);
        for _ in 0..5 {
            hb.monitor_tick();
        }
        assert!(!hb.is_any_confirmed());
        assert!(!hb.is_timed_out(EcuId::Cvc));
    }

    #[test]
    fn fzc_brake_fault_bit_decoded_from_cvc_payload() {
        let mut hb = HeartbeatMonitor::new();
        hb.notify_cvc_payload(&[0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        assert!(hb.fzc_brake_fault());
        hb.notify_cvc_payload(&[0x00, 0x00, 0, 0, 0, 0, 0, 0]);
        assert!(!hb.fzc_brake_fault());
    }
}
