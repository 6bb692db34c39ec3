//! Glues `hardware::Board`'s pins and `can_queue`'s software TX/RX queues to
//! `av_ecu_core::platform`'s capability traits, the same role the teacher's
//! RTIC `init`/task bodies play informally by calling `hardware`/`can_queue`
//! APIs directly — here it's pulled out into one adapter so the safety core
//! stays ignorant of RTIC, `embedded_can`, and `fdcan` entirely.

use av_ecu_core::error::{CoreError, CoreResult};
use av_ecu_core::platform::{Bist, CanTransport, Clock, Gpio, Nvm};
use embedded_can::{Frame, Id, StandardId};
use stm32g4xx_hal::hal::digital::v2::{InputPin, OutputPin};

use crate::can_queue;
use crate::hardware;
use crate::hardware::Mono;

/// RX-side mailbox cache the RTIC `pcan_rx` task populates as frames arrive
/// off the wire, keyed the same way `av_ecu_core::config::SC_MAILBOXES`
/// assigns mailbox indices to CAN IDs. `N` is the number of mailboxes this
/// node cares about — the Safety Controller wires up `SC_MAILBOX_COUNT`, a
/// zone ECU (which only transmits) wires up zero.
///
/// Kept separate from the TX side because `can_queue::Tx` lives behind
/// RTIC's `pcan_tx` shared-resource lock (the TX-complete interrupt handler
/// needs to reach it too), while this cache is only ever touched from the
/// single task that calls `SafetyController::tick`.
pub struct BoardCanRx<const N: usize> {
    mailbox_can_ids: [u32; N],
    cache: [Option<([u8; 8], u8)>; N],
}

impl<const N: usize> BoardCanRx<N> {
    pub fn new(mailbox_can_ids: [u32; N]) -> Self {
        Self { mailbox_can_ids, cache: [None; N] }
    }

    /// Called by the RTIC RX task for every frame dequeued off
    /// `can_queue::Rx`. Frames whose ID isn't one of this node's mailboxes
    /// are silently dropped, mirroring a hardware acceptance filter.
    pub fn ingest(&mut self, id: Id, data: &[u8], dlc: u8) {
        let raw = match id {
            Id::Standard(sid) => sid.as_raw() as u32,
            Id::Extended(eid) => eid.as_raw(),
        };
        if let Some(slot) = self.mailbox_can_ids.iter().position(|&can_id| can_id == raw) {
            let mut buf = [0u8; 8];
            let n = data.len().min(8);
            buf[..n].copy_from_slice(&data[..n]);
            self.cache[slot] = Some((buf, dlc));
        }
    }

    /// Takes and clears whatever frame landed in `mailbox_index` since the
    /// last poll, the same "consumed once" semantics `CanTransport::can_receive`
    /// presents to the core.
    pub fn poll(&mut self, mailbox_index: u8) -> Option<([u8; 8], u8)> {
        self.cache.get_mut(mailbox_index as usize)?.take()
    }
}

/// `CanTransport` over a live `can_queue::Tx` borrow plus a `BoardCanRx`
/// cache, built for the lifetime of one `SafetyController::tick` call
/// inside the RTIC task's `pcan_tx.lock(...)` closure.
pub struct BoardCan<'a, const N: usize> {
    tx: &'a mut can_queue::Tx<hardware::PCAN>,
    rx: &'a mut BoardCanRx<N>,
}

impl<'a, const N: usize> BoardCan<'a, N> {
    pub fn new(tx: &'a mut can_queue::Tx<hardware::PCAN>, rx: &'a mut BoardCanRx<N>) -> Self {
        Self { tx, rx }
    }
}

impl<'a, const N: usize> CanTransport for BoardCan<'a, N> {
    fn can_transmit(&mut self, id: u32, data: &[u8], dlc: u8) -> CoreResult<()> {
        let sid = StandardId::new(id as u16).ok_or(CoreError::OutOfRange)?;
        let frame = can_queue::QueuedFrame::new(sid, &data[..dlc as usize])
            .ok_or(CoreError::OutOfRange)?;
        self.tx.transmit(&frame);
        Ok(())
    }

    fn can_receive(&mut self, mailbox_index: u8) -> Option<([u8; 8], u8)> {
        self.rx.poll(mailbox_index)
    }

    fn can_is_bus_off(&self) -> bool {
        // Bus-off is handled as a hard fault by `can_queue::Control::on_irq`
        // (it panics on the BusOff interrupt); by the time this is called
        // the node would already be resetting, so there is nothing useful
        // to report here.
        false
    }
}

/// GPIO adapter over the Safety Controller's fixed pin group
/// (`av_ecu_core::config::sc_gpio`). A zone-ECU node has no GPIO
/// responsibilities of its own and never constructs one of these.
pub struct BoardGpio {
    relay_cmd: hardware::RelayCmdOutput,
    relay_readback: hardware::RelayReadbackInput,
    led_cvc: hardware::LedCvcOutput,
    led_fzc: hardware::LedFzcOutput,
    led_rzc: hardware::LedRzcOutput,
    led_sys: hardware::LedSysOutput,
    wdi: hardware::WdiOutput,
    wdi_level: u8,
}

impl BoardGpio {
    pub fn new(
        relay_cmd: hardware::RelayCmdOutput,
        relay_readback: hardware::RelayReadbackInput,
        led_cvc: hardware::LedCvcOutput,
        led_fzc: hardware::LedFzcOutput,
        led_rzc: hardware::LedRzcOutput,
        led_sys: hardware::LedSysOutput,
        wdi: hardware::WdiOutput,
    ) -> Self {
        Self { relay_cmd, relay_readback, led_cvc, led_fzc, led_rzc, led_sys, wdi, wdi_level: 0 }
    }
}

impl Gpio for BoardGpio {
    fn gpio_set(&mut self, _port: u8, pin: u8, level: u8) {
        use av_ecu_core::config::sc_gpio;
        let high = level != 0;
        match pin {
            sc_gpio::RELAY => set(&mut self.relay_cmd, high),
            sc_gpio::LED_CVC => set(&mut self.led_cvc, high),
            sc_gpio::LED_FZC => set(&mut self.led_fzc, high),
            sc_gpio::LED_RZC => set(&mut self.led_rzc, high),
            sc_gpio::LED_SYS => set(&mut self.led_sys, high),
            sc_gpio::WDI => {
                self.wdi_level = level;
                set(&mut self.wdi, high);
            }
            _ => {}
        }
    }

    fn gpio_get(&self, _port: u8, pin: u8) -> u8 {
        use av_ecu_core::config::sc_gpio;
        match pin {
            sc_gpio::RELAY => self.relay_readback.is_high().unwrap_or(false) as u8,
            sc_gpio::WDI => self.wdi_level,
            _ => 0,
        }
    }
}

fn set(pin: &mut impl OutputPin, high: bool) {
    if high {
        let _ = pin.set_high();
    } else {
        let _ = pin.set_low();
    }
}

/// NVM adapter. The teacher firmware never persists anything to flash, so
/// there is no existing block-store routine to generalise from; rather than
/// invent an unverified flash erase/program cycle that can't be built or
/// tested against real silicon in this exercise, this keeps calibration and
/// DTC state in RAM for the lifetime of one power cycle. A follow-up adapter
/// backed by `stm32g4xx-hal`'s flash driver would slot in behind the same
/// `Nvm` trait without touching `av-ecu-core`.
#[derive(Default)]
pub struct BoardNvm {
    blocks: heapless::FnvIndexMap<u16, heapless::Vec<u8, 64>, 8>,
}

impl BoardNvm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Nvm for BoardNvm {
    fn nvm_read_block(&mut self, block_id: u16, dst: &mut [u8]) -> CoreResult<()> {
        match self.blocks.get(&block_id) {
            Some(bytes) if bytes.len() == dst.len() => {
                dst.copy_from_slice(bytes);
                Ok(())
            }
            Some(_) => Err(CoreError::OutOfRange),
            None => {
                dst.fill(0);
                Ok(())
            }
        }
    }

    fn nvm_write_block(&mut self, block_id: u16, src: &[u8]) -> CoreResult<()> {
        let mut bytes: heapless::Vec<u8, 64> = heapless::Vec::new();
        bytes.extend_from_slice(src).map_err(|_| CoreError::OutOfRange)?;
        self.blocks.insert(block_id, bytes).map_err(|_| CoreError::StoreFull)?;
        Ok(())
    }
}

/// Monotonic clock over RTIC's systick-driven `Mono` timer. Watchdog
/// checkpoints are recorded as timestamps only for `defmt` tracing; feeding
/// the external watchdog IC itself happens through `BoardGpio`'s `WDI` pin,
/// toggled by the Safety Controller's own `tick` before this is called.
#[derive(Default)]
pub struct BoardClock;

impl BoardClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for BoardClock {
    fn monotonic_tick_us(&self) -> u32 {
        let ticks: u64 = Mono::now().ticks();
        (ticks * 1000) as u32
    }

    fn wdg_checkpoint(&mut self, supervised_entity_id: u8) {
        defmt::trace!("wdg checkpoint entity={}", supervised_entity_id);
    }
}

/// Hardware BIST family (spec §4.7). The teacher firmware has no existing
/// self-test routines to generalise from (it never runs one), so every step
/// reports pass unconditionally. CAN loopback and GPIO readback are the two
/// steps with an obvious real implementation, but both depend on FDCAN
/// internal-loopback mode wiring `can_queue.rs` doesn't expose; left
/// unconditional rather than invented, as recorded in DESIGN.md.
pub struct BoardBist;

impl BoardBist {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BoardBist {
    fn default() -> Self {
        Self::new()
    }
}

impl Bist for BoardBist {
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
