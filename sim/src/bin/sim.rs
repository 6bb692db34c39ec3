//! Full-fleet simulation: Safety Controller + CVC + FZC + RZC over one
//! shared in-memory CAN medium. Mirrors the teacher's `src/bin/fakon.rs`
//! (the "everything wired up" binary) against [`av_ecu_sim`]'s software
//! platform instead of real peripherals.
//!
//! Runs a fixed number of 1 ms ticks, letting the three zone ECUs send
//! their 50 ms heartbeats and the Safety Controller consume them, then
//! drops the CVC heartbeat to demonstrate the heartbeat-timeout -> kill ->
//! DTC-broadcast chain (spec §8 scenario 3).

use av_ecu_core::can_wire::{
    build_frame, CAN_ID_CVC_HEARTBEAT, CAN_ID_FZC_HEARTBEAT, CAN_ID_RZC_HEARTBEAT,
    DATA_ID_CVC_HEARTBEAT, DATA_ID_FZC_HEARTBEAT, DATA_ID_RZC_HEARTBEAT,
};
use av_ecu_core::config::{cvc_cfg, fzc_cfg, rzc_cfg, HEARTBEAT_PERIOD_MS, SC_MAILBOXES, SC_MAILBOX_COUNT};
use av_ecu_core::dtc::{CircularDtcStore, EcuId, SlotDtcStore};
use av_ecu_core::platform::CanTransport;
use av_ecu_core::safety_controller::SafetyController;
use av_ecu_core::zone_ecu::{DtcStoreVariant, ZoneEcu};
use av_ecu_sim::{SimBist, SimCan, SimCanMedium, SimGpio};
use tracing::info;
use tracing_subscriber::EnvFilter;

const TOTAL_TICKS_MS: u32 = 500;
const CVC_HEARTBEAT_DROPPED_AFTER_MS: u32 = 200;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let medium = SimCanMedium::new();

    let mut sc_mailboxes = [(0u8, 0u32); SC_MAILBOX_COUNT];
    for (slot, mb) in sc_mailboxes.iter_mut().zip(SC_MAILBOXES.iter()) {
        *slot = (mb.mailbox_index, mb.can_id);
    }
    let mut sc_can = SimCan::new(medium.clone(), &sc_mailboxes);
    let mut sc_gpio = SimGpio::new();
    let mut sc_bist = SimBist::new();
    let mut sc = SafetyController::new();

    let mut cvc_can = SimCan::new(medium.clone(), &[]);
    let mut fzc_can = SimCan::new(medium.clone(), &[]);
    let mut rzc_can = SimCan::new(medium, &[]);

    let mut cvc = ZoneEcu::new(EcuId::Cvc, DtcStoreVariant::Circular(CircularDtcStore::new()));
    let mut fzc = ZoneEcu::new(EcuId::Fzc, DtcStoreVariant::Slot(SlotDtcStore::new()));
    let mut rzc = ZoneEcu::new(EcuId::Rzc, DtcStoreVariant::Slot(SlotDtcStore::new()));
    cvc.init(&cvc_cfg::SIGNALS, &cvc_cfg::RUNNABLES).expect("cvc init");
    fzc.init(&fzc_cfg::SIGNALS, &fzc_cfg::RUNNABLES).expect("fzc init");
    rzc.init(&rzc_cfg::SIGNALS, &rzc_cfg::RUNNABLES).expect("rzc init");

    let failing_step = sc.startup(&mut sc_bist);
    info!(failing_step, "safety controller startup complete");

    for ms in 1..=TOTAL_TICKS_MS {
        cvc.tick(&cvc_cfg::RUNNABLES, |_| {}).unwrap();
        fzc.tick(&fzc_cfg::RUNNABLES, |_| {}).unwrap();
        rzc.tick(&rzc_cfg::RUNNABLES, |_| {}).unwrap();

        if cvc.tick_count() % HEARTBEAT_PERIOD_MS == 0 && ms <= CVC_HEARTBEAT_DROPPED_AFTER_MS {
            let mut frame = [0u8; 8];
            build_frame(DATA_ID_CVC_HEARTBEAT, &mut frame, 8, cvc.next_alive_counter());
            cvc_can.can_transmit(CAN_ID_CVC_HEARTBEAT, &frame, 8).ok();
        }
        if fzc.tick_count() % HEARTBEAT_PERIOD_MS == 0 {
            let mut frame = [0u8; 8];
            build_frame(DATA_ID_FZC_HEARTBEAT, &mut frame, 8, fzc.next_alive_counter());
            fzc_can.can_transmit(CAN_ID_FZC_HEARTBEAT, &frame, 8).ok();
        }
        if rzc.tick_count() % HEARTBEAT_PERIOD_MS == 0 {
            let mut frame = [0u8; 8];
            build_frame(DATA_ID_RZC_HEARTBEAT, &mut frame, 8, rzc.next_alive_counter());
            rzc_can.can_transmit(CAN_ID_RZC_HEARTBEAT, &frame, 8).ok();
        }

        if ms % 10 == 0 {
            for mb in &SC_MAILBOXES {
                if let Some((data, dlc)) = sc_can.can_receive(mb.mailbox_index) {
                    sc.on_can_frame(mb.mailbox_index, &data, dlc);
                }
            }
            let fed = sc.tick(&mut sc_gpio, &mut sc_bist, &mut sc_can);
            if !fed {
                info!(ms, "watchdog feed skipped this tick");
            }
            if sc.is_killed() {
                info!(ms, "kill relay latched — stopping simulation");
                break;
            }
        }
    }

    info!(killed = sc.is_killed(), "simulation complete");
}
