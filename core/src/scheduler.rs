//! L4a Runnable Scheduler (spec §4.2): a cooperative, priority-ordered
//! dispatcher driven by a 1 ms tick.
//!
//! Config validation follows the same "inert on bad config" idiom as
//! `original_source/firmware/cvc/src/Swc_Scheduler.c`'s
//! `Swc_Scheduler_Init`: a null/oversized table leaves the scheduler
//! permanently unable to dispatch, rather than panicking.

use crate::error::{CoreError, CoreResult};

pub const MAX_RUNNABLES: usize = 16;
/// Supervised-entity ID meaning "no supervision" (spec §3).
pub const NO_SUPERVISION: u8 = 0xFF;
pub const MAX_SUPERVISED_ENTITIES: u8 = 16;

/// One entry of the scheduler's compile-time runnable table, generic over
/// the per-ECU context type `Ctx` (the concrete signal bus / E2E table /
/// platform handle a runnable needs — see `zone_ecu`).
///
/// `wcet_us` and `asil_level` are carried as documentation/config metadata
/// only — exactly as `Swc_Scheduler_RunnableType` in the original carries
/// them without runtime enforcement. They are not involved in dispatch.
pub struct RunnableDescriptor<Ctx> {
    pub function: Option<fn(&mut Ctx)>,
    pub period_ms: u32,
    pub priority: i16,
    pub supervised_entity_id: u8,
    pub wcet_us: u32,
    pub asil_level: AsilLevel,
}

// Manual Clone/Copy: a derive would add `Ctx: Clone + Copy` bounds even
// though `Ctx` only ever appears behind a function pointer, which is
// always Copy regardless of `Ctx`.
impl<Ctx> Clone for RunnableDescriptor<Ctx> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<Ctx> Copy for RunnableDescriptor<Ctx> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AsilLevel {
    Qm,
    A,
    B,
    C,
    D,
}

/// Bitset over up to [`MAX_RUNNABLES`] (<= 32) entries.
#[derive(Clone, Copy, Default)]
struct Bitset32(u32);

impl Bitset32 {
    fn is_set(&self, i: usize) -> bool {
        self.0 & (1 << i) != 0
    }
    fn set(&mut self, i: usize) {
        self.0 |= 1 << i;
    }
}

pub struct Scheduler {
    table_len: usize,
    tick: u32,
    initialised: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Scheduler {
            table_len: 0,
            tick: 0,
            initialised: false,
        }
    }

    /// Validates `0 < count <= MAX_RUNNABLES` and resets the internal tick.
    pub fn init<Ctx>(&mut self, table: &[RunnableDescriptor<Ctx>]) -> CoreResult<()> {
        if table.is_empty() || table.len() > MAX_RUNNABLES {
            self.initialised = false;
            return Err(CoreError::MalformedConfig);
        }
        self.table_len = table.len();
        self.tick = 0;
        self.initialised = true;
        Ok(())
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Sum of every entry's `wcet_us`, the same self-documentation
    /// `Swc_Scheduler_RunnableType`'s `wcetUs` field supports in the
    /// original — a config-time sanity figure, never enforced at runtime.
    pub fn worst_case_budget_us<Ctx>(table: &[RunnableDescriptor<Ctx>]) -> u32 {
        table.iter().fold(0u32, |acc, r| acc.saturating_add(r.wcet_us))
    }

    /// Increments the tick counter and dispatches eligible runnables in
    /// strict descending-priority order, invoking each fired runnable with
    /// `ctx` and `checkpoint` once per supervised entity that saw activity
    /// this tick.
    pub fn tick<Ctx>(
        &mut self,
        table: &[RunnableDescriptor<Ctx>],
        ctx: &mut Ctx,
        mut checkpoint: impl FnMut(u8),
    ) -> CoreResult<()> {
        if !self.initialised || table.len() != self.table_len {
            return Err(CoreError::NotInitialised);
        }
        self.tick = self.tick.wrapping_add(1);
        let current_tick = self.tick;

        let mut visited = Bitset32::default();
        let mut se_checkpointed = Bitset32::default();

        for _ in 0..table.len() {
            // (a) mark ineligible-this-tick entries visited and skip them.
            for (i, r) in table.iter().enumerate() {
                if visited.is_set(i) {
                    continue;
                }
                let ineligible = r.function.is_none()
                    || r.period_ms == 0
                    || current_tick % r.period_ms != 0;
                if ineligible {
                    visited.set(i);
                }
            }

            // (b) pick the highest-priority remaining unvisited entry.
            let mut pick: Option<usize> = None;
            for (i, r) in table.iter().enumerate() {
                if visited.is_set(i) {
                    continue;
                }
                match pick {
                    None => pick = Some(i),
                    Some(best) if r.priority > table[best].priority => pick = Some(i),
                    _ => {}
                }
            }

            let Some(i) = pick else {
                // (c) nothing left to dispatch this tick.
                break;
            };

            // (d) fire it exactly once.
            visited.set(i);
            let r = &table[i];
            if let Some(f) = r.function {
                f(ctx);
            }
            if r.supervised_entity_id < MAX_SUPERVISED_ENTITIES
                && !se_checkpointed.is_set(r.supervised_entity_id as usize)
            {
                checkpoint(r.supervised_entity_id);
                se_checkpointed.set(r.supervised_entity_id as usize);
            }
        }

        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = ();

    fn desc(period_ms: u32, priority: i16, se: u8) -> RunnableDescriptor<Ctx> {
        RunnableDescriptor {
            function: Some(|_ctx| {}),
            period_ms,
            priority,
            supervised_entity_id: se,
            wcet_us: 100,
            asil_level: AsilLevel::D,
        }
    }

    #[test]
    fn init_rejects_oversized_table() {
        let mut sched = Scheduler::new();
        let table = [desc(1, 0, NO_SUPERVISION); MAX_RUNNABLES + 1];
        assert_eq!(sched.init(&table), Err(CoreError::MalformedConfig));
    }

    #[test]
    fn init_rejects_empty_table() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.init::<Ctx>(&[]), Err(CoreError::MalformedConfig));
    }

    #[test]
    fn each_eligible_runnable_fires_exactly_once_in_priority_order() {
        let table = [
            desc(1, 5, 0),
            desc(1, 10, 1),
            desc(2, 20, 2),
        ];
        let mut sched = Scheduler::new();
        sched.init(&table).unwrap();
        let mut fired: heapless::Vec<u8, 8> = heapless::Vec::new();
        let mut ctx: Ctx = ();
        // tick 1: period-1 runnables (idx 0 prio5, idx1 prio10) eligible,
        // idx2 (period 2) not.
        sched
            .tick(&table, &mut ctx, |se| {
                let _ = fired.push(se);
            })
            .unwrap();
        assert_eq!(fired.as_slice(), &[1, 0]);
    }

    #[test]
    fn watchdog_checkpoint_fires_at_most_once_per_entity_per_tick() {
        let table = [desc(1, 1, 7), desc(1, 2, 7)];
        let mut sched = Scheduler::new();
        sched.init(&table).unwrap();
        let mut ctx: Ctx = ();
        let mut checkpoints = 0u32;
        sched
            .tick(&table, &mut ctx, |_se| checkpoints += 1)
            .unwrap();
        assert_eq!(checkpoints, 1);
    }

    #[test]
    fn malformed_entries_are_skipped_not_executed() {
        let table = [
            RunnableDescriptor {
                function: None,
                period_ms: 1,
                priority: 100,
                supervised_entity_id: NO_SUPERVISION,
                wcet_us: 0,
                asil_level: AsilLevel::Qm,
            },
            RunnableDescriptor {
                function: Some(|_: &mut Ctx| {}),
                period_ms: 0,
                priority: 99,
                supervised_entity_id: NO_SUPERVISION,
                wcet_us: 0,
                asil_level: AsilLevel::Qm,
            },
            desc(1, 1, NO_SUPERVISION),
        ];
        let mut sched = Scheduler::new();
        sched.init(&table).unwrap();
        let mut ctx: Ctx = ();
        // Should not panic on the null-function or zero-period entries.
        sched.tick(&table, &mut ctx, |_| {}).unwrap();
    }

    #[test]
    fn worst_case_budget_sums_every_entrys_wcet() {
        let table = [desc(1, 0, NO_SUPERVISION), desc(2, 0, NO_SUPERVISION)];
        assert_eq!(Scheduler::worst_case_budget_us(&table), 200);
    }

    #[test]
    fn priority_ties_break_by_table_order() {
        let table = [desc(1, 5, 0), desc(1, 5, 1)];
        let mut sched = Scheduler::new();
        sched.init(&table).unwrap();
        let mut fired: heapless::Vec<u8, 8> = heapless::Vec::new();
        let mut ctx: Ctx = ();
        sched
            .tick(&table, &mut ctx, |se| {
                let _ = fired.push(se);
            })
            .unwrap();
        assert_eq!(fired.as_slice(), &[0, 1]);
    }
}
