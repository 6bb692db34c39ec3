#![no_main]
#![no_std]
#![feature(type_alias_impl_trait)]

use av_ecu_board_stm32g4 as _;

/// Safety Controller node: the RTIC app that used to be `fakon.rs`'s
/// "everything wired up" binary, now wiring `av_ecu_core::safety_controller`
/// to real CAN/GPIO instead of the teacher's car-state/airbag/IEB/IGPM
/// application tasks.
#[rtic::app(
    device = stm32g4xx_hal::stm32,
    dispatchers = [USBWAKEUP, COMP1_2_3, COMP4_5_6, COMP7]
)]
mod app {
    use av_ecu_board_stm32g4::can_queue;
    use av_ecu_board_stm32g4::hardware;
    use av_ecu_board_stm32g4::hardware::Mono;
    use av_ecu_board_stm32g4::platform_adapter::{BoardBist, BoardCan, BoardCanRx, BoardGpio};
    use av_ecu_core::config::{SC_MAILBOXES, SC_MAILBOX_COUNT};
    use av_ecu_core::safety_controller::SafetyController;
    use embedded_can::Frame;
    use fugit::ExtU32;
    use rtic_monotonics::Monotonic;

    #[shared]
    struct Shared {
        pcan_tx: can_queue::Tx<hardware::PCAN>,
    }

    #[local]
    struct Local {
        pcan_control: can_queue::Control<hardware::PCAN>,
        pcan_rx: can_queue::Rx,
        can_rx_cache: BoardCanRx<SC_MAILBOX_COUNT>,
        gpio: BoardGpio,
        bist: BoardBist,
        sc: SafetyController,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        defmt::info!("sc_node init");

        let board = hardware::init(cx.core, cx.device);

        let (pcan_control, pcan_rx, pcan_tx) =
            can_queue::Control::init(board.pcan_config, &board.can_timing_500kbps);

        let mut mailbox_can_ids = [0u32; SC_MAILBOX_COUNT];
        for (slot, mb) in mailbox_can_ids.iter_mut().zip(SC_MAILBOXES.iter()) {
            *slot = mb.can_id;
        }

        let gpio = BoardGpio::new(
            board.relay_cmd,
            board.relay_readback,
            board.led_cvc,
            board.led_fzc,
            board.led_rzc,
            board.led_sys,
            board.wdi,
        );
        let mut bist = BoardBist::new();
        let mut sc = SafetyController::new();
        let failing_step = sc.startup(&mut bist);
        defmt::info!("SC startup complete, failing_step={}", failing_step);

        pcan_rx::spawn().unwrap();
        sc_tick::spawn().unwrap();

        (
            Shared { pcan_tx },
            Local {
                pcan_control,
                pcan_rx,
                can_rx_cache: BoardCanRx::new(mailbox_can_ids),
                gpio,
                bist,
                sc,
            },
        )
    }

    #[task(binds = FDCAN1_INTR1_IT, shared = [pcan_tx], local = [pcan_control], priority = 6)]
    fn pcan_irq(cx: pcan_irq::Context) {
        cx.local.pcan_control.on_irq(cx.shared.pcan_tx);
    }

    #[task(local = [pcan_rx, can_rx_cache], priority = 2)]
    async fn pcan_rx(cx: pcan_rx::Context) {
        let pcan_rx = cx.local.pcan_rx;
        loop {
            let frame = pcan_rx.recv().await.unwrap();
            cx.local.can_rx_cache.ingest(frame.id(), frame.data(), frame.dlc() as u8);
        }
    }

    /// One 10 ms Safety Controller tick (spec §4.2's SC runnable period):
    /// drains whatever the RX cache collected since the last tick, runs
    /// `SafetyController::tick`, and lets it transmit straight onto the
    /// shared hardware TX queue for any DTC broadcast it decides to send.
    #[task(shared = [pcan_tx], local = [can_rx_cache, gpio, bist, sc], priority = 4)]
    async fn sc_tick(mut cx: sc_tick::Context) {
        let period = 10.millis();
        let mut next = Mono::now() + period;
        loop {
            Mono::delay_until(next).await;
            next += period;

            for mb in &SC_MAILBOXES {
                if let Some((data, dlc)) = cx.local.can_rx_cache.poll(mb.mailbox_index) {
                    cx.local.sc.on_can_frame(mb.mailbox_index, &data, dlc);
                }
            }

            let killed_before = cx.local.sc.is_killed();
            cx.shared.pcan_tx.lock(|tx| {
                let mut can = BoardCan::new(tx, cx.local.can_rx_cache);
                let fed = cx.local.sc.tick(cx.local.gpio, cx.local.bist, &mut can);
                // `tick` decides whether this tick is healthy enough to
                // feed the watchdog; toggling the physical WDI pin is this
                // caller's job (spec §4.8), matching how `gpio_set`/`gpio_get`
                // for the relay and LEDs are likewise driven from outside
                // `tick`'s own body.
                use av_ecu_core::platform::Gpio;
                cx.local.gpio.gpio_set(0, av_ecu_core::config::sc_gpio::WDI, fed as u8);
                if !fed {
                    defmt::warn!("watchdog feed skipped this tick");
                }
            });
            if !killed_before && cx.local.sc.is_killed() {
                defmt::error!("kill relay latched");
            }
        }
    }
}
