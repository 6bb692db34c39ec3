//! L1 Platform Abstraction Interface (spec §2, §6, §9).
//!
//! The CORE depends only on these traits. A real-target adapter
//! (`av-ecu-board-stm32g4`) and a simulation adapter (`av-ecu-sim`) each
//! implement the full capability set; test code may inject a third, purely
//! in-memory adapter of its own.

use crate::error::CoreResult;

/// Non-blocking CAN transceiver of a single frame at a time.
pub trait CanTransport {
    /// Transmit one frame. Non-blocking: returns `Err(PlatformFailure)` if
    /// the transport cannot accept it right now. The CORE treats a
    /// transmit failure as a degraded bus, not a fatal condition.
    fn can_transmit(&mut self, id: u32, data: &[u8], dlc: u8) -> CoreResult<()>;

    /// Poll one mailbox for a received frame. Returns `None` if nothing is
    /// pending. `dlc` is the number of valid bytes in `data` (0..=8).
    fn can_receive(&mut self, mailbox_index: u8) -> Option<([u8; 8], u8)>;

    /// True while the transport is in the bus-off state.
    fn can_is_bus_off(&self) -> bool;
}

/// Bit-level GPIO access.
pub trait Gpio {
    fn gpio_set(&mut self, port: u8, pin: u8, level: u8);
    fn gpio_get(&self, port: u8, pin: u8) -> u8;
}

/// Opaque-block NVM backend. The CORE never interprets addresses beyond a
/// `block_id`; layout of each block is owned by `dtc.rs`/`calibration.rs`.
pub trait Nvm {
    fn nvm_read_block(&mut self, block_id: u16, dst: &mut [u8]) -> CoreResult<()>;
    fn nvm_write_block(&mut self, block_id: u16, src: &[u8]) -> CoreResult<()>;
}

/// Monotonic microsecond clock and per-entity watchdog checkpointing.
pub trait Clock {
    fn monotonic_tick_us(&self) -> u32;
    /// Notify the external hardware watchdog that `supervised_entity_id`
    /// is alive. Called at most once per tick per entity by the scheduler.
    fn wdg_checkpoint(&mut self, supervised_entity_id: u8);
}

/// Hardware built-in self-test steps (spec §4.7). Each returns `true` on
/// pass. The CORE is agnostic to how these are actually implemented on a
/// given target; the simulation adapter can simply always return `true` or
/// be driven to fail for a given test scenario.
pub trait Bist {
    fn hw_bist_cpu_lockstep(&mut self) -> bool;
    fn hw_bist_ram_pbist(&mut self) -> bool;
    fn hw_bist_flash_crc32(&mut self) -> bool;
    fn hw_bist_can_loopback(&mut self) -> bool;
    fn hw_bist_gpio_readback(&mut self) -> bool;
    fn hw_bist_led_lamp_test(&mut self) -> bool;
    fn hw_bist_watchdog_test(&mut self) -> bool;

    /// Incremental flash CRC step run at runtime (spec §4.7 runtime step 1).
    fn hw_bist_flash_crc_incremental(&mut self) -> bool;
    /// RAM pattern check over a fixed region (runtime step 2).
    fn hw_bist_ram_pattern(&mut self) -> bool;
    /// CAN controller error-status check (runtime step 3).
    fn hw_bist_can_error_status(&mut self) -> bool;
    /// GPIO readback check, informational only at this layer (runtime step 4).
    fn hw_bist_gpio_readback_runtime(&mut self) -> bool;
}

/// The full capability set a platform adapter must provide. Blanket-impl'd
/// for anything implementing the four constituent traits.
pub trait Platform: CanTransport + Gpio + Nvm + Clock + Bist {}
impl<T> Platform for T where T: CanTransport + Gpio + Nvm + Clock + Bist {}
