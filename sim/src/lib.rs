//! In-memory platform adapter for `av-ecu-core`, mirroring the teacher's own
//! split between a hardware bring-up layer (`hardware.rs`) and a queued
//! transport layer (`can_queue.rs`) — generalised here against a software
//! bus instead of silicon, so the safety core can be driven and exercised on
//! a host triple without any target peripherals.
//!
//! Four adapters cover the [`av_ecu_core::platform`] capability set:
//! [`SimCan`] (a shared in-memory CAN medium), [`SimGpio`] (a virtual pin
//! bank), [`SimNvm`] (a virtual block store) and [`SimClock`] (a software
//! monotonic microsecond counter). [`SimBist`] stands in for the hardware
//! BIST family, defaulting to all-pass with setters to inject a failure for
//! a given scenario.

use av_ecu_core::error::{CoreError, CoreResult};
use av_ecu_core::platform::{Bist, CanTransport, Clock, Gpio, Nvm};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One CAN ID's current value on the shared bus plus a generation counter,
/// so each attached [`SimCan`] observes a given transmission at most once —
/// the same "last frame wins, mailbox consumed once" semantics a real CAN
/// controller's acceptance filter presents to `can_receive`.
#[derive(Clone, Copy, Default)]
struct BusSlot {
    data: [u8; 8],
    dlc: u8,
    generation: u64,
}

#[derive(Default)]
struct MediumInner {
    slots: HashMap<u32, BusSlot>,
    next_generation: u64,
    bus_off: bool,
}

/// A shared software CAN medium. Every [`SimCan`] handle cloned from the
/// same medium observes every other handle's transmissions.
#[derive(Clone, Default)]
pub struct SimCanMedium(Rc<RefCell<MediumInner>>);

impl SimCanMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the medium into (or out of) the bus-off state, for exercising
    /// the watchdog-feed gate's `can_not_bus_off` condition (spec §4.8).
    pub fn set_bus_off(&self, bus_off: bool) {
        self.0.borrow_mut().bus_off = bus_off;
    }
}

/// One ECU's view of a [`SimCanMedium`]: a fixed mailbox-index -> CAN-ID
/// table (mirroring `config::SC_MAILBOXES`'s static mailbox assignment) and
/// a per-mailbox read cursor.
pub struct SimCan {
    medium: SimCanMedium,
    mailboxes: heapless::Vec<(u8, u32), 8>,
    last_seen: HashMap<u8, u64>,
}

impl SimCan {
    pub fn new(medium: SimCanMedium, mailboxes: &[(u8, u32)]) -> Self {
        let mut table: heapless::Vec<(u8, u32), 8> = heapless::Vec::new();
        for &m in mailboxes {
            let _ = table.push(m);
        }
        SimCan {
            medium,
            mailboxes: table,
            last_seen: HashMap::new(),
        }
    }
}

impl CanTransport for SimCan {
    fn can_transmit(&mut self, id: u32, data: &[u8], dlc: u8) -> CoreResult<()> {
        let mut inner = self.medium.0.borrow_mut();
        if inner.bus_off {
            return Err(CoreError::PlatformFailure);
        }
        let mut buf = [0u8; 8];
        let n = data.len().min(8);
        buf[..n].copy_from_slice(&data[..n]);
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.slots.insert(id, BusSlot { data: buf, dlc, generation });
        Ok(())
    }

    fn can_receive(&mut self, mailbox_index: u8) -> Option<([u8; 8], u8)> {
        let can_id = self
            .mailboxes
            .iter()
            .find(|(mb, _)| *mb == mailbox_index)?
            .1;
        let inner = self.medium.0.borrow();
        let slot = inner.slots.get(&can_id)?;
        let seen = self.last_seen.get(&mailbox_index).copied().unwrap_or(0);
        if slot.generation <= seen {
            return None;
        }
        let frame = (slot.data, slot.dlc);
        drop(inner);
        self.last_seen.insert(mailbox_index, slot.generation);
        Some(frame)
    }

    fn can_is_bus_off(&self) -> bool {
        self.medium.0.borrow().bus_off
    }
}

/// Virtual GPIO pin bank: a flat `(port, pin) -> level` map, mirroring the
/// teacher's own abstraction of a GPIO port/pin pair without any real
/// register access.
#[derive(Default)]
pub struct SimGpio {
    levels: HashMap<(u8, u8), u8>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Gpio for SimGpio {
    fn gpio_set(&mut self, port: u8, pin: u8, level: u8) {
        self.levels.insert((port, pin), level);
    }

    fn gpio_get(&self, port: u8, pin: u8) -> u8 {
        self.levels.get(&(port, pin)).copied().unwrap_or(0)
    }
}

/// Virtual NVM block store: an in-memory `block_id -> bytes` map standing in
/// for flash-emulated NVM. `corrupt_block` lets a test pre-load a block with
/// bytes that fail CRC validation, matching scenario 7 of spec §8.
#[derive(Default)]
pub struct SimNvm {
    blocks: HashMap<u16, Vec<u8>>,
}

impl SimNvm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads `block_id` with arbitrary bytes, e.g. to simulate a
    /// corrupted calibration block ahead of `CalibrationStore::init`.
    pub fn preload(&mut self, block_id: u16, bytes: &[u8]) {
        self.blocks.insert(block_id, bytes.to_vec());
    }
}

impl Nvm for SimNvm {
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
        self.blocks.insert(block_id, src.to_vec());
        Ok(())
    }
}

/// Software monotonic clock: a microsecond counter advanced explicitly by
/// the simulation loop (there being no hardware timer to free-run against),
/// plus a record of the last tick each supervised entity was checkpointed
/// on — exposed so a test can assert the watchdog was actually fed.
#[derive(Default)]
pub struct SimClock {
    now_us: u32,
    checkpoints: HashMap<u8, u32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the simulated monotonic clock by `delta_us` microseconds.
    pub fn advance(&mut self, delta_us: u32) {
        self.now_us = self.now_us.wrapping_add(delta_us);
    }

    /// The simulated tick at which `entity` was last checkpointed, if ever.
    pub fn last_checkpoint(&self, entity: u8) -> Option<u32> {
        self.checkpoints.get(&entity).copied()
    }
}

impl Clock for SimClock {
    fn monotonic_tick_us(&self) -> u32 {
        self.now_us
    }

    fn wdg_checkpoint(&mut self, supervised_entity_id: u8) {
        self.checkpoints.insert(supervised_entity_id, self.now_us);
    }
}

/// Hardware BIST stand-in: every step passes by default. `force_fail`
/// selects one step to fail from the next `run_*` call onward, for driving
/// the startup/runtime self-test failure paths of spec §4.7.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum BistStep {
    #[default]
    None,
    CpuLockstep,
    RamPbist,
    FlashCrc32,
    CanLoopback,
    GpioReadback,
    LedLampTest,
    WatchdogTest,
    FlashCrcIncremental,
    RamPattern,
    CanErrorStatus,
    GpioReadbackRuntime,
}

#[derive(Default)]
pub struct SimBist {
    failing: BistStep,
}

impl SimBist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_fail(&mut self, step: BistStep) {
        self.failing = step;
    }

    fn pass(&self, step: BistStep) -> bool {
        self.failing != step
    }
}

impl Bist for SimBist {
    fn hw_bist_cpu_lockstep(&mut self) -> bool {
        self.pass(BistStep::CpuLockstep)
    }
    fn hw_bist_ram_pbist(&mut self) -> bool {
        self.pass(BistStep::RamPbist)
    }
    fn hw_bist_flash_crc32(&mut self) -> bool {
        self.pass(BistStep::FlashCrc32)
    }
    fn hw_bist_can_loopback(&mut self) -> bool {
        self.pass(BistStep::CanLoopback)
    }
    fn hw_bist_gpio_readback(&mut self) -> bool {
        self.pass(BistStep::GpioReadback)
    }
    fn hw_bist_led_lamp_test(&mut self) -> bool {
        self.pass(BistStep::LedLampTest)
    }
    fn hw_bist_watchdog_test(&mut self) -> bool {
        self.pass(BistStep::WatchdogTest)
    }
    fn hw_bist_flash_crc_incremental(&mut self) -> bool {
        self.pass(BistStep::FlashCrcIncremental)
    }
    fn hw_bist_ram_pattern(&mut self) -> bool {
        self.pass(BistStep::RamPattern)
    }
    fn hw_bist_can_error_status(&mut self) -> bool {
        self.pass(BistStep::CanErrorStatus)
    }
    fn hw_bist_gpio_readback_runtime(&mut self) -> bool {
        self.pass(BistStep::GpioReadbackRuntime)
    }
}
