//! End-to-end scenarios driven through the sim platform adapters rather
//! than hand-rolled fakes — these exercise the same call paths the `sim`
//! binary does, over a real [`SimCanMedium`].

use av_ecu_core::calibration::{CalibrationStore, FACTORY_DEFAULT_CAL};
use av_ecu_core::can_wire::{
    build_frame, CAN_ID_CVC_HEARTBEAT, CAN_ID_FZC_HEARTBEAT, CAN_ID_RZC_HEARTBEAT,
    DATA_ID_CVC_HEARTBEAT, DATA_ID_FZC_HEARTBEAT, DATA_ID_RZC_HEARTBEAT,
};
use av_ecu_core::config::{SC_MAILBOXES, SC_MAILBOX_COUNT};
use av_ecu_core::dtc::DTC_BROADCAST_CAN_ID;
use av_ecu_core::platform::CanTransport;
use av_ecu_core::safety_controller::SafetyController;
use av_ecu_sim::{SimBist, SimCan, SimCanMedium, SimGpio, SimNvm};

fn sc_mailboxes() -> [(u8, u32); SC_MAILBOX_COUNT] {
    let mut table = [(0u8, 0u32); SC_MAILBOX_COUNT];
    for (slot, mb) in table.iter_mut().zip(SC_MAILBOXES.iter()) {
        *slot = (mb.mailbox_index, mb.can_id);
    }
    table
}

#[test]
fn relay_stays_energised_while_all_three_peers_heartbeat_through_the_sim_bus() {
    let medium = SimCanMedium::new();
    let mailboxes = sc_mailboxes();
    let mut sc_can = SimCan::new(medium.clone(), &mailboxes);
    let mut peer_can = SimCan::new(medium, &[]);
    let mut gpio = SimGpio::new();
    let mut bist = SimBist::new();
    let mut sc = SafetyController::new();

    assert_eq!(sc.startup(&mut bist), 0);

    for alive in 0..20u8 {
        for (data_id, can_id) in [
            (DATA_ID_CVC_HEARTBEAT, CAN_ID_CVC_HEARTBEAT),
            (DATA_ID_FZC_HEARTBEAT, CAN_ID_FZC_HEARTBEAT),
            (DATA_ID_RZC_HEARTBEAT, CAN_ID_RZC_HEARTBEAT),
        ] {
            let mut frame = [0u8; 8];
            build_frame(data_id, &mut frame, 8, alive & 0x0F);
            peer_can.can_transmit(can_id, &frame, 8).unwrap();
        }
        for mb in &SC_MAILBOXES {
            if let Some((data, dlc)) = sc_can.can_receive(mb.mailbox_index) {
                sc.on_can_frame(mb.mailbox_index, &data, dlc);
            }
        }
        let fed = sc.tick(&mut gpio, &mut bist, &mut sc_can);
        assert!(fed, "watchdog should be fed every tick while everything is healthy");
    }

    assert!(!sc.is_killed());
}

#[test]
fn dropping_the_cvc_heartbeat_kills_the_relay_and_broadcasts_a_dtc_on_the_bus() {
    let medium = SimCanMedium::new();
    let mailboxes = sc_mailboxes();
    let mut sc_can = SimCan::new(medium.clone(), &mailboxes);
    // An observer mailbox dedicated to the DTC broadcast CAN ID, to prove
    // the payload actually hits the shared medium rather than just being
    // accepted by `can_transmit`.
    let mut dtc_listener = SimCan::new(medium, &[(0, DTC_BROADCAST_CAN_ID)]);
    let mut gpio = SimGpio::new();
    let mut bist = SimBist::new();
    let mut sc = SafetyController::new();

    sc.startup(&mut bist);

    // No peer ever heartbeats: all three peers time out and confirm after
    // 20 ticks (spec §8 scenario 3), well before any of CVC/FZC/RZC's own
    // mailboxes see a frame.
    for _ in 0..20 {
        let fed = sc.tick(&mut gpio, &mut bist, &mut sc_can);
        let _ = fed;
    }

    assert!(sc.is_killed());
    let (payload, dlc) = dtc_listener
        .can_receive(0)
        .expect("DTC broadcast should have been transmitted onto the shared bus");
    assert_eq!(dlc, 8);
    assert_eq!(payload[3] & av_ecu_core::dtc::status::CONFIRMED, av_ecu_core::dtc::status::CONFIRMED);
}

#[test]
fn calibration_recovers_factory_defaults_from_a_corrupted_sim_nvm_block() {
    use av_ecu_core::calibration::CALIBRATION_NVM_BLOCK_ID;

    let mut nvm = SimNvm::new();
    // Pre-load garbage whose CRC can't possibly match: length matches a
    // real block (40 serialised bytes + 2 CRC bytes) but every byte is 0xAA.
    let garbage = [0xAAu8; 40 + 2];
    nvm.preload(CALIBRATION_NVM_BLOCK_ID, &garbage);

    let mut store = CalibrationStore::new();
    store.init(&mut nvm).unwrap();
    let (block, defaulted) = store.read_cal();
    assert!(defaulted);
    assert_eq!(block, FACTORY_DEFAULT_CAL);
}
