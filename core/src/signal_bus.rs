//! L2 Signal Bus (spec §3, §4.1): a fixed-size table of 32-bit values
//! indexed by a 16-bit signal ID, with bounded copy-semantics read/write.

use crate::error::{CoreError, CoreResult};

/// Compile-time maximum signal count (spec §3: "48 in the reference
/// configuration").
pub const MAX_SIGNALS: usize = 48;

/// One `(id, initial_value)` entry of a signal bus configuration table.
#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    pub id: u16,
    pub initial_value: u32,
}

pub struct SignalBus {
    values: [u32; MAX_SIGNALS],
    configured_count: usize,
    initialised: bool,
}

impl SignalBus {
    pub const fn new() -> Self {
        SignalBus {
            values: [0; MAX_SIGNALS],
            configured_count: 0,
            initialised: false,
        }
    }

    /// Zeros the underlying storage, then stamps configured initial
    /// values. Rejects `config` whose declared count exceeds
    /// [`MAX_SIGNALS`] — after such rejection every subsequent operation
    /// fails until `init` is called again with a valid table. Bounds every
    /// subsequent `read`/`write` to `id < config.len()` (spec §8 invariant
    /// 1: "∀ signal_id ≥ configured_count, Read and Write return Err"), not
    /// just the static maximum.
    pub fn init(&mut self, config: &[SignalConfig]) -> CoreResult<()> {
        self.values = [0; MAX_SIGNALS];
        self.configured_count = 0;
        self.initialised = false;
        if config.len() > MAX_SIGNALS {
            return Err(CoreError::MalformedConfig);
        }
        for entry in config {
            let idx = entry.id as usize;
            if idx >= MAX_SIGNALS {
                return Err(CoreError::OutOfRange);
            }
            self.values[idx] = entry.initial_value;
        }
        self.configured_count = config.len();
        self.initialised = true;
        Ok(())
    }

    fn check_bounds(&self, id: u16) -> CoreResult<usize> {
        if !self.initialised {
            return Err(CoreError::NotInitialised);
        }
        let idx = id as usize;
        if idx >= self.configured_count {
            return Err(CoreError::OutOfRange);
        }
        Ok(idx)
    }

    /// Stores the 32-bit value at `id`. Succeeds iff initialised and `id`
    /// is within bounds.
    pub fn write(&mut self, id: u16, value: u32) -> CoreResult<()> {
        let idx = self.check_bounds(id)?;
        self.values[idx] = value;
        Ok(())
    }

    /// Copy of the current value at `id`.
    pub fn read(&self, id: u16) -> CoreResult<u32> {
        let idx = self.check_bounds(id)?;
        Ok(self.values[idx])
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
