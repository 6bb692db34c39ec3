#![no_main]
#![no_std]
#![feature(type_alias_impl_trait)]

use av_ecu_board_stm32g4 as _;

#[cfg(not(any(feature = "zone-cvc", feature = "zone-fzc", feature = "zone-rzc")))]
compile_error!("zone_node needs exactly one of the zone-cvc / zone-fzc / zone-rzc features enabled");

#[cfg(any(
    all(feature = "zone-cvc", feature = "zone-fzc"),
    all(feature = "zone-cvc", feature = "zone-rzc"),
    all(feature = "zone-fzc", feature = "zone-rzc"),
))]
compile_error!("zone_node takes exactly one of the zone-cvc / zone-fzc / zone-rzc features, not several");

/// Generic zone-ECU node (CVC/FZC/RZC): the RTIC app that used to be
/// `minimal.rs`'s reduced single-subsystem binary, now wiring
/// `av_ecu_core::zone_ecu::ZoneEcu` to real CAN instead of the teacher's
/// SRS/airbag PWM demo task. Which zone this image is depends on which of
/// the `zone-cvc`/`zone-fzc`/`zone-rzc` features was enabled at build time.
#[rtic::app(
    device = stm32g4xx_hal::stm32,
    dispatchers = [USBWAKEUP, COMP1_2_3, COMP4_5_6, COMP7]
)]
mod app {
    use av_ecu_board_stm32g4::can_queue;
    use av_ecu_board_stm32g4::hardware;
    use av_ecu_board_stm32g4::hardware::Mono;
    use av_ecu_core::can_wire::build_frame;
    use av_ecu_core::config::HEARTBEAT_PERIOD_MS;
    use av_ecu_core::dtc::{CircularDtcStore, EcuId, SlotDtcStore};
    use av_ecu_core::zone_ecu::{DtcStoreVariant, ZoneEcu};
    use embedded_can::Frame;
    use fugit::ExtU32;
    use rtic_monotonics::Monotonic;

    #[cfg(feature = "zone-cvc")]
    use av_ecu_core::can_wire::{CAN_ID_CVC_HEARTBEAT as CAN_ID_HEARTBEAT, DATA_ID_CVC_HEARTBEAT as DATA_ID_HEARTBEAT};
    #[cfg(feature = "zone-cvc")]
    use av_ecu_core::config::cvc_cfg as zone_cfg;

    #[cfg(feature = "zone-fzc")]
    use av_ecu_core::can_wire::{CAN_ID_FZC_HEARTBEAT as CAN_ID_HEARTBEAT, DATA_ID_FZC_HEARTBEAT as DATA_ID_HEARTBEAT};
    #[cfg(feature = "zone-fzc")]
    use av_ecu_core::config::fzc_cfg as zone_cfg;

    #[cfg(feature = "zone-rzc")]
    use av_ecu_core::can_wire::{CAN_ID_RZC_HEARTBEAT as CAN_ID_HEARTBEAT, DATA_ID_RZC_HEARTBEAT as DATA_ID_HEARTBEAT};
    #[cfg(feature = "zone-rzc")]
    use av_ecu_core::config::rzc_cfg as zone_cfg;

    #[shared]
    struct Shared {
        pcan_tx: can_queue::Tx<hardware::PCAN>,
    }

    #[local]
    struct Local {
        pcan_control: can_queue::Control<hardware::PCAN>,
        pcan_rx: can_queue::Rx,
        zone: ZoneEcu,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        defmt::info!("zone_node init");

        let board = hardware::init(cx.core, cx.device);

        let (pcan_control, pcan_rx, pcan_tx) =
            can_queue::Control::init(board.pcan_config, &board.can_timing_500kbps);

        #[cfg(feature = "zone-cvc")]
        let (ecu, store) = (EcuId::Cvc, DtcStoreVariant::Circular(CircularDtcStore::new()));
        #[cfg(feature = "zone-fzc")]
        let (ecu, store) = (EcuId::Fzc, DtcStoreVariant::Slot(SlotDtcStore::new()));
        #[cfg(feature = "zone-rzc")]
        let (ecu, store) = (EcuId::Rzc, DtcStoreVariant::Slot(SlotDtcStore::new()));

        let mut zone = ZoneEcu::new(ecu, store);
        zone.init(&zone_cfg::SIGNALS, &zone_cfg::RUNNABLES).expect("zone init");

        pcan_rx::spawn().unwrap();
        zone_tick::spawn().unwrap();

        (Shared { pcan_tx }, Local { pcan_control, pcan_rx, zone })
    }

    #[task(binds = FDCAN1_INTR1_IT, shared = [pcan_tx], local = [pcan_control], priority = 6)]
    fn pcan_irq(cx: pcan_irq::Context) {
        cx.local.pcan_control.on_irq(cx.shared.pcan_tx);
    }

    /// Inbound frames aren't consumed by any zone ECU in this build (each
    /// zone only has to transmit its own heartbeat); draining the queue
    /// here just keeps the hardware RX FIFO from backing up.
    #[task(local = [pcan_rx], priority = 2)]
    async fn pcan_rx(cx: pcan_rx::Context) {
        let pcan_rx = cx.local.pcan_rx;
        loop {
            let _ = pcan_rx.recv().await.unwrap();
        }
    }

    /// One 1 ms scheduler tick (spec §4.2), transmitting the zone's
    /// E2E-protected heartbeat frame every `HEARTBEAT_PERIOD_MS` ticks
    /// (spec §4.4) the same way the teacher's `can_periodic.rs` separates
    /// periodic CAN TX cadence from runnable dispatch.
    #[task(shared = [pcan_tx], local = [zone], priority = 4)]
    async fn zone_tick(mut cx: zone_tick::Context) {
        use can_queue::QueuedFrame;
        use embedded_can::StandardId;

        let period = 1.millis();
        let mut next = Mono::now() + period;
        loop {
            Mono::delay_until(next).await;
            next += period;

            cx.local.zone.tick(&zone_cfg::RUNNABLES, |_| {}).unwrap();

            if cx.local.zone.tick_count() % HEARTBEAT_PERIOD_MS == 0 {
                let mut payload = [0u8; 8];
                build_frame(DATA_ID_HEARTBEAT, &mut payload, 8, cx.local.zone.next_alive_counter());
                let sid = StandardId::new(CAN_ID_HEARTBEAT as u16).unwrap();
                let frame = QueuedFrame::new(sid, &payload).unwrap();
                cx.shared.pcan_tx.lock(|tx| tx.transmit(&frame));
            }
        }
    }
}
