//! Calibration block (spec §3, §4.9), grounded on
//! `original_source/firmware/cvc/src/Swc_Nvm.c` (`Swc_Nvm_ReadCal` /
//! `Swc_Nvm_WriteCal`).

use crate::crc::crc16_ccitt;
use crate::error::CoreResult;
use crate::platform::Nvm;

pub const CALIBRATION_NVM_BLOCK_ID: u16 = 0x10;
const TORQUE_LUT_LEN: usize = 16;

/// A fixed set of calibration parameters, matching the fields the original
/// `Nvm_DefaultCal` carries: plausibility threshold/debounce, a stuck-pedal
/// detector, and the torque lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationBlock {
    pub plaus_threshold_ma: u16,
    pub plaus_debounce_ticks: u16,
    pub stuck_threshold_ticks: u16,
    pub stuck_cycles: u16,
    pub torque_lut: [u16; TORQUE_LUT_LEN],
}

/// Factory defaults, matching the original's `Nvm_DefaultCal` constants.
pub const FACTORY_DEFAULT_CAL: CalibrationBlock = CalibrationBlock {
    plaus_threshold_ma: 819,
    plaus_debounce_ticks: 2,
    stuck_threshold_ticks: 10,
    stuck_cycles: 100,
    torque_lut: [
        0, 1750, 3250, 5000, 6750, 8250, 10000, 11750, 13250, 15000, 16750, 18250, 20000, 21750,
        23250, 25000,
    ],
};

const SERIALISED_LEN: usize = 2 + 2 + 2 + 2 + TORQUE_LUT_LEN * 2;

impl CalibrationBlock {
    fn to_bytes(self) -> [u8; SERIALISED_LEN] {
        let mut buf = [0u8; SERIALISED_LEN];
        let mut off = 0;
        for v in [
            self.plaus_threshold_ma,
            self.plaus_debounce_ticks,
            self.stuck_threshold_ticks,
            self.stuck_cycles,
        ] {
            buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
            off += 2;
        }
        for v in self.torque_lut {
            buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
            off += 2;
        }
        buf
    }

    fn from_bytes(buf: &[u8; SERIALISED_LEN]) -> Self {
        let read_u16 = |off: usize| u16::from_le_bytes([buf[off], buf[off + 1]]);
        let mut off = 0;
        let plaus_threshold_ma = read_u16(off);
        off += 2;
        let plaus_debounce_ticks = read_u16(off);
        off += 2;
        let stuck_threshold_ticks = read_u16(off);
        off += 2;
        let stuck_cycles = read_u16(off);
        off += 2;
        let mut torque_lut = [0u16; TORQUE_LUT_LEN];
        for slot in &mut torque_lut {
            *slot = read_u16(off);
            off += 2;
        }
        CalibrationBlock {
            plaus_threshold_ma,
            plaus_debounce_ticks,
            stuck_threshold_ticks,
            stuck_cycles,
            torque_lut,
        }
    }
}

/// Whole-block NVM layout: serialised fields, then a 2-byte LE CRC-16 over
/// those fields (spec §4.9: "the CRC field is excluded from the input").
const BLOCK_LEN: usize = SERIALISED_LEN + 2;

pub struct CalibrationStore {
    ram_mirror: CalibrationBlock,
    defaulted: bool,
}

impl CalibrationStore {
    pub const fn new() -> Self {
        CalibrationStore {
            ram_mirror: FACTORY_DEFAULT_CAL,
            defaulted: true,
        }
    }

    /// Loads from NVM; on CRC mismatch, overwrites the mirror with factory
    /// defaults and re-CRCs, persisting the recovered defaults.
    pub fn init(&mut self, nvm: &mut dyn Nvm) -> CoreResult<()> {
        let mut raw = [0u8; BLOCK_LEN];
        nvm.nvm_read_block(CALIBRATION_NVM_BLOCK_ID, &mut raw)?;
        let fields: [u8; SERIALISED_LEN] = raw[..SERIALISED_LEN].try_into().unwrap();
        let stored_crc = u16::from_le_bytes([raw[SERIALISED_LEN], raw[SERIALISED_LEN + 1]]);
        if crc16_ccitt(&fields) == stored_crc {
            self.ram_mirror = CalibrationBlock::from_bytes(&fields);
            self.defaulted = false;
        } else {
            self.ram_mirror = FACTORY_DEFAULT_CAL;
            self.defaulted = true;
            self.persist(nvm)?;
        }
        Ok(())
    }

    fn persist(&self, nvm: &mut dyn Nvm) -> CoreResult<()> {
        let fields = self.ram_mirror.to_bytes();
        let crc = crc16_ccitt(&fields);
        let mut raw = [0u8; BLOCK_LEN];
        raw[..SERIALISED_LEN].copy_from_slice(&fields);
        raw[SERIALISED_LEN..].copy_from_slice(&crc.to_le_bytes());
        nvm.nvm_write_block(CALIBRATION_NVM_BLOCK_ID, &raw)
    }

    /// Copies the RAM mirror out. `defaulted` is true iff the last `init`
    /// (or a prior CRC mismatch) fell back to factory defaults.
    pub fn read_cal(&self) -> (CalibrationBlock, bool) {
        (self.ram_mirror, self.defaulted)
    }

    /// Replaces the RAM mirror, recomputes its CRC, and persists.
    pub fn write_cal(&mut self, block: CalibrationBlock, nvm: &mut dyn Nvm) -> CoreResult<()> {
        self.ram_mirror = block;
        self.defaulted = false;
        self.persist(nvm)
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}
