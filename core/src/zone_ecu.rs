//! Generic zone-ECU runnable app (CVC/FZC/RZC): wires the signal bus, the
//! runnable scheduler, the E2E TX alive counter and a DTC store variant
//! together the way each zone firmware's `main`-equivalent glue does,
//! generalised per spec §6's "ECU-level startup sequence" — the CVC/FZC/RZC
//! firmwares share this shape even though their signal tables and runnable
//! periods differ.

use crate::dtc::{CircularDtcStore, DtcBroadcaster, DtcCode, EcuId as DtcEcuId, DtcRecord, FreezeFrame, SlotDtcStore};
use crate::error::CoreResult;
use crate::scheduler::{RunnableDescriptor, Scheduler};
use crate::signal_bus::{SignalBus, SignalConfig};

/// Per-ECU choice of DTC store discipline (spec §9 open-question
/// resolution): CVC is circular overwrite, FZC/RZC are slot-based
/// refuse-when-full.
pub enum DtcStoreVariant {
    Circular(CircularDtcStore),
    Slot(SlotDtcStore),
}

impl DtcStoreVariant {
    /// Stores a record. The circular variant always succeeds; the
    /// slot-based variant returns `Err(StoreFull)` once every slot holds a
    /// live record.
    pub fn store_dtc(
        &mut self,
        code: DtcCode,
        status: u8,
        occurrence: u32,
        freeze_frame: FreezeFrame,
    ) -> CoreResult<DtcRecord> {
        match self {
            DtcStoreVariant::Circular(s) => Ok(s.store_dtc(code, status, occurrence, freeze_frame)),
            DtcStoreVariant::Slot(s) => {
                s.store_dtc(code, status, occurrence, freeze_frame)?;
                // Slot store doesn't hand back the record it just wrote;
                // reconstruct the same fields for the broadcaster, which
                // only reads code/status/occurrence.
                Ok(DtcRecord::new(code, status, occurrence, freeze_frame))
            }
        }
    }

    pub fn load_dtc(&self, index: usize) -> CoreResult<DtcRecord> {
        match self {
            DtcStoreVariant::Circular(s) => s.load_dtc(index),
            DtcStoreVariant::Slot(s) => s.load_dtc(index),
        }
    }
}

/// Per-ECU context a runnable operates on: the signal bus plus the next
/// alive counter value for this ECU's own outbound E2E-protected frame.
/// The scheduler is generic over this type (`Scheduler<ZoneEcu>`), so
/// runnable functions are plain `fn(&mut ZoneEcu)`.
pub struct ZoneEcu {
    pub signals: SignalBus,
    scheduler: Scheduler,
    next_alive: u8,
    dtc_store: DtcStoreVariant,
    broadcaster: DtcBroadcaster,
    ecu: DtcEcuId,
    occurrence: u32,
}

impl ZoneEcu {
    pub fn new(ecu: DtcEcuId, dtc_store: DtcStoreVariant) -> Self {
        ZoneEcu {
            signals: SignalBus::new(),
            scheduler: Scheduler::new(),
            next_alive: 0,
            dtc_store,
            broadcaster: DtcBroadcaster::new(),
            ecu,
            occurrence: 0,
        }
    }

    pub fn init(
        &mut self,
        signal_config: &[SignalConfig],
        runnable_table: &[RunnableDescriptor<ZoneEcu>],
    ) -> CoreResult<()> {
        self.signals.init(signal_config)?;
        self.scheduler.init(runnable_table)
    }

    /// Advances the outbound alive counter (wraps 15 -> 0) and returns the
    /// value to stamp into the next E2E frame this tick.
    pub fn next_alive_counter(&mut self) -> u8 {
        let v = self.next_alive;
        self.next_alive = (self.next_alive + 1) & 0x0F;
        v
    }

    /// The scheduler's own tick counter. CAN TX cadence for this ECU's
    /// periodic outbound frames (e.g. the 50 ms heartbeat) lives outside the
    /// runnable table, the same way `can_periodic.rs`'s `Period` group is a
    /// concern separate from the runnables that compute its payload — the
    /// harness polls this to decide when a frame is due.
    pub fn tick_count(&self) -> u32 {
        self.scheduler.tick_count()
    }

    /// Runs the scheduler for one 1 ms tick over `runnable_table`, invoking
    /// `checkpoint` per supervised entity that saw activity.
    pub fn tick(
        &mut self,
        runnable_table: &[RunnableDescriptor<ZoneEcu>],
        checkpoint: impl FnMut(u8),
    ) -> CoreResult<()> {
        // Scheduler::tick needs &mut Self passed in as ctx, but Self also
        // owns the scheduler — split borrow via a local move-out/move-back
        // since Scheduler itself holds no reference into ZoneEcu.
        let mut scheduler = core::mem::replace(&mut self.scheduler, Scheduler::new());
        let result = scheduler.tick(runnable_table, self, checkpoint);
        self.scheduler = scheduler;
        result
    }

    /// Records a newly-confirmed fault and, if this is the first time it's
    /// observed, returns the CAN broadcast payload for it (spec §4.9).
    pub fn report_fault(&mut self, code: DtcCode, status: u8) -> Option<[u8; 8]> {
        self.occurrence = self.occurrence.saturating_add(1);
        let rec = self
            .dtc_store
            .store_dtc(code, status, self.occurrence, FreezeFrame::ZERO)
            .ok()?;
        self.broadcaster.poll(&rec, self.ecu)
    }

    pub fn load_dtc(&self, index: usize) -> CoreResult<DtcRecord> {
        self.dtc_store.load_dtc(index)
    }
}
