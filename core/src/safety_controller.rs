//! Assembles the Safety Controller's subsystems (spec §2 L5) into one
//! runnable app: heartbeat fusion, plausibility, kill relay, self-test,
//! watchdog-feed gate, LED panel and fault DTC reporting.
//!
//! Mirrors the original's module split
//! (`sc_heartbeat.c`/`sc_plausibility.c`/`sc_relay.c`/`sc_selftest.c`/
//! `sc_watchdog.c`/`sc_led.c`) wired together the way `sc_main`-equivalent
//! glue would, generalised per spec §6's "ECU-level startup sequence".

use crate::can_wire::{
    E2eTable, CAN_ID_CVC_HEARTBEAT, CAN_ID_FZC_HEARTBEAT, CAN_ID_MOTOR_CURRENT, CAN_ID_RZC_HEARTBEAT,
    CAN_ID_VEHICLE_STATE,
};
use crate::config::{sc_gpio, LED_BLINK_ON_TICKS, LED_BLINK_PERIOD_TICKS, SC_MAILBOXES};
use crate::dtc::{status, CircularDtcStore, DtcBroadcaster, DtcCode, EcuId as DtcEcuId, FreezeFrame, DTC_BROADCAST_CAN_ID};
use crate::heartbeat::{EcuId, HeartbeatMonitor};
use crate::kill_relay::{KillRelay, TriggerInputs};
use crate::log;
use crate::platform::{Bist, CanTransport, Gpio};
use crate::plausibility::PlausibilityEngine;
use crate::self_test::SelfTest;
use crate::wdg_gate::{should_feed, WdgGateInputs};
use byteorder::{BigEndian, ByteOrder};

/// Per-peer fault-LED blink state: steady HIGH once the fault latches, LOW
/// otherwise. The system LED blinks (spec/`sc_led.c`: 25-on/25-off) while
/// any fault is present.
#[derive(Default)]
struct LedPanel {
    blink_counter: u32,
}

impl LedPanel {
    fn tick(&mut self, fault_present: bool, gpio: &mut dyn Gpio, hb: &HeartbeatMonitor) {
        gpio.gpio_set(0, sc_gpio::LED_CVC, hb.is_timed_out(EcuId::Cvc) as u8);
        gpio.gpio_set(0, sc_gpio::LED_FZC, hb.is_timed_out(EcuId::Fzc) as u8);
        gpio.gpio_set(0, sc_gpio::LED_RZC, hb.is_timed_out(EcuId::Rzc) as u8);

        if fault_present {
            self.blink_counter = (self.blink_counter + 1) % LED_BLINK_PERIOD_TICKS;
            let level = (self.blink_counter < LED_BLINK_ON_TICKS) as u8;
            gpio.gpio_set(0, sc_gpio::LED_SYS, level);
        } else {
            self.blink_counter = 0;
            gpio.gpio_set(0, sc_gpio::LED_SYS, 0);
        }
    }
}

pub struct SafetyController {
    e2e: E2eTable,
    heartbeat: HeartbeatMonitor,
    plausibility: PlausibilityEngine,
    relay: KillRelay,
    self_test: SelfTest,
    leds: LedPanel,
    dtc_store: CircularDtcStore,
    broadcaster: DtcBroadcaster,
    esm_error_active: bool,
    occurrence: u32,
    last_torque_percent: u32,
    last_motor_current_ma: u32,
}

impl SafetyController {
    pub const fn new() -> Self {
        SafetyController {
            e2e: E2eTable::new(),
            heartbeat: HeartbeatMonitor::new(),
            plausibility: PlausibilityEngine::new(),
            relay: KillRelay::new(),
            self_test: SelfTest::new(),
            leds: LedPanel { blink_counter: 0 },
            dtc_store: CircularDtcStore::new(),
            broadcaster: DtcBroadcaster::new(),
            esm_error_active: false,
            occurrence: 0,
            last_torque_percent: 0,
            last_motor_current_ma: 0,
        }
    }

    /// Startup: BIST, canary stamp, and — only on success — energise the
    /// relay (spec §6 step 4: "SC only: energise kill relay").
    pub fn startup(&mut self, bist: &mut dyn Bist) -> u8 {
        self.self_test.init_canary();
        let failing_step = self.self_test.run_startup(bist);
        self.relay.energise(failing_step == 0);
        log::info!("SC startup: failing_step={}", failing_step);
        failing_step
    }

    /// Signalled by the ESM high-level interrupt handler (spec §5): the
    /// handler itself must stay under 100 clock cycles and does the
    /// GPIO/LED work directly; this just latches the flag so
    /// `check_triggers` sees it on the next tick.
    pub fn notify_esm_error(&mut self) {
        self.esm_error_active = true;
    }

    /// Decodes an inbound CAN frame addressed to one of the SC's fixed
    /// receive mailboxes, verifying its E2E envelope first.
    pub fn on_can_frame(&mut self, mailbox_index: u8, data: &[u8], dlc: u8) {
        let Some(mb) = SC_MAILBOXES.iter().find(|m| m.mailbox_index == mailbox_index) else {
            return;
        };
        if !self.e2e.verify(mailbox_index, mb.data_id, data, dlc).unwrap_or(false) {
            log::warn!("E2E reject on mailbox {}", mailbox_index);
            return;
        }
        match mb.can_id {
            CAN_ID_CVC_HEARTBEAT => self.heartbeat.notify_cvc_payload(data),
            CAN_ID_FZC_HEARTBEAT => self.heartbeat.notify_rx(EcuId::Fzc),
            CAN_ID_RZC_HEARTBEAT => self.heartbeat.notify_rx(EcuId::Rzc),
            CAN_ID_VEHICLE_STATE => {
                self.last_torque_percent = data.get(4).copied().unwrap_or(0) as u32;
            }
            CAN_ID_MOTOR_CURRENT => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(&[
                    data.get(2).copied().unwrap_or(0),
                    data.get(3).copied().unwrap_or(0),
                ]);
                self.last_motor_current_ma = BigEndian::read_u16(&buf) as u32;
            }
            _ => {}
        }
    }

    /// One 10 ms tick: runs every fusion engine, evaluates the kill-relay
    /// triggers, drives the LED panel, reports any newly-killed fault as a
    /// DTC and returns whether the watchdog should be fed this tick.
    pub fn tick(
        &mut self,
        gpio: &mut dyn Gpio,
        bist: &mut dyn Bist,
        can: &mut dyn CanTransport,
    ) -> bool {
        self.heartbeat.monitor_tick();
        self.plausibility.tick(
            self.last_torque_percent,
            self.last_motor_current_ma,
            self.heartbeat.fzc_brake_fault(),
        );
        self.self_test.run_runtime_tick(bist);

        let was_killed = self.relay.is_killed();

        let commanded = self.relay.commanded_level();
        let readback = gpio.gpio_get(0, sc_gpio::RELAY);
        let inputs = TriggerInputs {
            any_heartbeat_confirmed: self.heartbeat.is_any_confirmed(),
            plausibility_latched: self.plausibility.is_latched(),
            self_test_unhealthy: !self.self_test.is_healthy(),
            esm_error_active: self.esm_error_active,
            gpio_readback_matches: readback == commanded,
        };
        self.relay.check_triggers(&inputs);
        gpio.gpio_set(0, sc_gpio::RELAY, self.relay.commanded_level());

        let newly_killed = !was_killed && self.relay.is_killed();
        if newly_killed {
            let code = if self.plausibility.is_latched() {
                DtcCode::PEDAL_PLAUSIBILITY
            } else {
                DtcCode::RELAY_KILLED
            };
            self.occurrence = self.occurrence.saturating_add(1);
            let rec = self
                .dtc_store
                .store_dtc(code, status::CONFIRMED, self.occurrence, FreezeFrame::ZERO);
            if let Some(payload) = self.broadcaster.poll(&rec, DtcEcuId::Sc) {
                let _ = can.can_transmit(DTC_BROADCAST_CAN_ID, &payload, 8);
            }
        }

        self.leds.tick(
            self.relay.is_killed() || self.plausibility.is_latched() || !self.self_test.is_healthy(),
            gpio,
            &self.heartbeat,
        );

        let gate = WdgGateInputs {
            loop_completed: true,
            stack_canary_ok: self.self_test.canary_ok(),
            ram_self_test_ok: self.self_test.is_healthy(),
            can_not_bus_off: !can.can_is_bus_off(),
            esm_not_active: !self.esm_error_active,
        };
        should_feed(&gate)
    }

    pub fn is_killed(&self) -> bool {
        self.relay.is_killed()
    }
}

impl Default for SafetyController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can_wire::build_frame;

    struct FakeGpio {
        levels: [u8; 8],
    }
    impl Gpio for FakeGpio {
        fn gpio_set(&mut self, _port: u8, pin: u8, level: u8) {
            self.levels[pin as usize] = level;
        }
        fn gpio_get(&self, _port: u8, pin: u8) -> u8 {
            self.levels[pin as usize]
        }
    }

    struct AllPassBist;
    impl Bist for AllPassBist {
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

    #[derive(Default)]
    struct FakeCan {
        transmitted: heapless::Vec<(u32, [u8; 8]), 4>,
    }
    impl CanTransport for FakeCan {
        fn can_transmit(&mut self, id: u32, data: &[u8], _dlc: u8) -> crate::error::CoreResult<()> {
            let mut buf = [0u8; 8];
            buf[..data.len().min(8)].copy_from_slice(&data[..data.len().min(8)]);
            let _ = self.transmitted.push((id, buf));
            Ok(())
        }
        fn can_receive(&mut self, _mailbox_index: u8) -> Option<([u8; 8], u8)> {
            None
        }
        fn can_is_bus_off(&self) -> bool {
            false
        }
    }

    #[test]
    fn heartbeat_timeout_kills_relay_scenario_3() {
        let mut sc = SafetyController::new();
        let mut bist = AllPassBist;
        sc.startup(&mut bist);
        let mut gpio = FakeGpio { levels: [0; 8] };
        let mut can = FakeCan::default();

        for _ in 0..20 {
            sc.tick(&mut gpio, &mut bist, &mut can);
        }
        assert!(sc.is_killed());
        assert_eq!(can.transmitted.len(), 1);
        assert_eq!(can.transmitted[0].0, DTC_BROADCAST_CAN_ID);
    }

    #[test]
    fn resume_inside_confirmation_window_keeps_relay_energised_scenario_4() {
        let mut sc = SafetyController::new();
        let mut bist = AllPassBist;
        sc.startup(&mut bist);
        let mut gpio = FakeGpio { levels: [0; 8] };
        let mut can = FakeCan::default();

        for _ in 0..15 {
            sc.tick(&mut gpio, &mut bist, &mut can);
        }

        let mut cvc = [0u8; 8];
        build_frame(crate::can_wire::DATA_ID_CVC_HEARTBEAT, &mut cvc, 8, 0);
        sc.on_can_frame(1, &cvc, 8);
        let mut fzc = [0u8; 8];
        build_frame(crate::can_wire::DATA_ID_FZC_HEARTBEAT, &mut fzc, 8, 0);
        sc.on_can_frame(2, &fzc, 8);
        let mut rzc = [0u8; 8];
        build_frame(crate::can_wire::DATA_ID_RZC_HEARTBEAT, &mut rzc, 8, 0);
        sc.on_can_frame(3, &rzc, 8);

        for _ in 0..5 {
            sc.tick(&mut gpio, &mut bist, &mut can);
        }
        assert!(!sc.is_killed());
    }

    #[test]
    fn plausibility_latch_kills_relay_scenario_5() {
        let mut sc = SafetyController::new();
        let mut bist = AllPassBist;
        sc.startup(&mut bist);
        let mut gpio = FakeGpio { levels: [0; 8] };
        let mut can = FakeCan::default();

        let mut vs = [0u8; 8];
        vs[4] = 100;
        build_frame(crate::can_wire::DATA_ID_VEHICLE_STATE, &mut vs, 8, 0);
        sc.on_can_frame(4, &vs, 8);

        let mut cur = [0u8; 8];
        cur[2..4].copy_from_slice(&0u16.to_be_bytes());
        build_frame(crate::can_wire::DATA_ID_MOTOR_CURRENT, &mut cur, 8, 0);
        sc.on_can_frame(5, &cur, 8);

        for _ in 0..5 {
            sc.tick(&mut gpio, &mut bist, &mut can);
        }
        assert!(sc.is_killed());
        assert_eq!(gpio.gpio_get(0, sc_gpio::LED_SYS), 1);
    }
}
