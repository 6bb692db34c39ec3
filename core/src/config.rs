//! Compile-time configuration tables shared by every zone ECU and the
//! Safety Controller: the CAN-mailbox-to-(CAN ID, Data-ID) assignment
//! (spec §6), matching `original_source/firmware/sc/include/sc_cfg.h`'s
//! const mailbox/Data-ID table.

use crate::can_wire::{
    CAN_ID_CVC_HEARTBEAT, CAN_ID_ESTOP, CAN_ID_FZC_HEARTBEAT, CAN_ID_MOTOR_CURRENT,
    CAN_ID_RZC_HEARTBEAT, CAN_ID_VEHICLE_STATE, DATA_ID_CVC_HEARTBEAT, DATA_ID_ESTOP,
    DATA_ID_FZC_HEARTBEAT, DATA_ID_MOTOR_CURRENT, DATA_ID_RZC_HEARTBEAT, DATA_ID_VEHICLE_STATE,
};

/// One entry of the Safety Controller's fixed receive mailbox table.
#[derive(Debug, Clone, Copy)]
pub struct MailboxConfig {
    pub mailbox_index: u8,
    pub can_id: u32,
    pub data_id: u8,
}

/// `sc_cfg.h`'s `SC_MB_COUNT = 6` receive mailboxes.
pub const SC_MAILBOX_COUNT: usize = 6;

pub const SC_MAILBOXES: [MailboxConfig; SC_MAILBOX_COUNT] = [
    MailboxConfig { mailbox_index: 0, can_id: CAN_ID_ESTOP, data_id: DATA_ID_ESTOP },
    MailboxConfig { mailbox_index: 1, can_id: CAN_ID_CVC_HEARTBEAT, data_id: DATA_ID_CVC_HEARTBEAT },
    MailboxConfig { mailbox_index: 2, can_id: CAN_ID_FZC_HEARTBEAT, data_id: DATA_ID_FZC_HEARTBEAT },
    MailboxConfig { mailbox_index: 3, can_id: CAN_ID_RZC_HEARTBEAT, data_id: DATA_ID_RZC_HEARTBEAT },
    MailboxConfig { mailbox_index: 4, can_id: CAN_ID_VEHICLE_STATE, data_id: DATA_ID_VEHICLE_STATE },
    MailboxConfig { mailbox_index: 5, can_id: CAN_ID_MOTOR_CURRENT, data_id: DATA_ID_MOTOR_CURRENT },
];

/// GPIO pin assignments on the Safety Controller board
/// (`sc_cfg.h`'s `SC_GIO_PIN_*` table).
pub mod sc_gpio {
    pub const RELAY: u8 = 0;
    pub const LED_CVC: u8 = 1;
    pub const LED_FZC: u8 = 2;
    pub const LED_RZC: u8 = 3;
    pub const LED_SYS: u8 = 4;
    pub const WDI: u8 = 5;
}

/// LED blink timing (`sc_cfg.h`): 25 ticks on, 25 off, 50-tick period.
pub const LED_BLINK_ON_TICKS: u32 = 25;
pub const LED_BLINK_PERIOD_TICKS: u32 = 50;

/// The 50 ms heartbeat period shared by CVC/FZC/RZC (spec §4.4), expressed
/// in 1 ms scheduler ticks so `ZoneEcu::tick_count() % HEARTBEAT_PERIOD_MS`
/// tells the harness when the next heartbeat frame is due.
pub const HEARTBEAT_PERIOD_MS: u32 = 50;

/// Per-zone-ECU signal tables and runnable tables (spec §6 "ECU-level
/// startup sequence": every zone ECU wires Signal Bus -> Scheduler the same
/// way; only the table contents differ). Each zone is small enough that the
/// cosmetic SWCs around it (lights, indicators, door locks — spec §1
/// Out-of-scope) are not represented; only the signals/runnables this core
/// actually needs to exercise the E2E/DTC/scheduler machinery are declared.
pub mod cvc_cfg {
    use crate::plausibility::lookup_expected_current;
    use crate::signal_bus::SignalConfig;
    use crate::scheduler::{AsilLevel, RunnableDescriptor, NO_SUPERVISION};
    use crate::zone_ecu::ZoneEcu;

    /// Commanded torque, 0..=100 (maps to CAN ID 0x100 byte 4 on the bus).
    pub const SIG_TORQUE_PERCENT: u16 = 0;
    /// Measured motor current in mA (maps to CAN ID 0x301 bytes 2-3).
    pub const SIG_MOTOR_CURRENT_MA: u16 = 1;

    pub const SIGNALS: [SignalConfig; 2] = [
        SignalConfig { id: SIG_TORQUE_PERCENT, initial_value: 0 },
        SignalConfig { id: SIG_MOTOR_CURRENT_MA, initial_value: 0 },
    ];

    /// Derives the motor current a healthy drivetrain would draw for the
    /// commanded torque, using the same 16-point LUT the Safety Controller's
    /// plausibility engine checks against (spec §4.5). A test harness that
    /// wants to provoke a plausibility fault overwrites
    /// `SIG_MOTOR_CURRENT_MA` after this runnable fires.
    pub fn derive_motor_current(ctx: &mut ZoneEcu) {
        let torque = ctx.signals.read(SIG_TORQUE_PERCENT).unwrap_or(0);
        let _ = ctx.signals.write(SIG_MOTOR_CURRENT_MA, lookup_expected_current(torque));
    }

    pub const RUNNABLES: [RunnableDescriptor<ZoneEcu>; 1] = [RunnableDescriptor {
        function: Some(derive_motor_current),
        period_ms: 10,
        priority: 5,
        supervised_entity_id: NO_SUPERVISION,
        wcet_us: 80,
        asil_level: AsilLevel::D,
    }];
}

pub mod fzc_cfg {
    use crate::signal_bus::SignalConfig;
    use crate::scheduler::{AsilLevel, RunnableDescriptor, NO_SUPERVISION};
    use crate::zone_ecu::ZoneEcu;

    /// Decoded brake-fault indicator this zone folds into its own heartbeat
    /// payload (consumed by `HeartbeatMonitor::notify_cvc_payload` on the
    /// Safety Controller per spec §4.5's backup cutoff — here it is FZC's
    /// own local copy for diagnostic purposes only).
    pub const SIG_BRAKE_FAULT: u16 = 0;

    pub const SIGNALS: [SignalConfig; 1] =
        [SignalConfig { id: SIG_BRAKE_FAULT, initial_value: 0 }];

    fn housekeeping(_ctx: &mut ZoneEcu) {}

    pub const RUNNABLES: [RunnableDescriptor<ZoneEcu>; 1] = [RunnableDescriptor {
        function: Some(housekeeping),
        period_ms: 10,
        priority: 5,
        supervised_entity_id: NO_SUPERVISION,
        wcet_us: 20,
        asil_level: AsilLevel::D,
    }];
}

pub mod rzc_cfg {
    use crate::signal_bus::SignalConfig;
    use crate::scheduler::{AsilLevel, RunnableDescriptor, NO_SUPERVISION};
    use crate::zone_ecu::ZoneEcu;

    pub const SIGNALS: [SignalConfig; 0] = [];

    fn housekeeping(_ctx: &mut ZoneEcu) {}

    pub const RUNNABLES: [RunnableDescriptor<ZoneEcu>; 1] = [RunnableDescriptor {
        function: Some(housekeeping),
        period_ms: 10,
        priority: 5,
        supervised_entity_id: NO_SUPERVISION,
        wcet_us: 10,
        asil_level: AsilLevel::D,
    }];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_table_indices_are_sequential() {
        for (i, m) in SC_MAILBOXES.iter().enumerate() {
            assert_eq!(m.mailbox_index as usize, i);
        }
    }

    #[test]
    fn cvc_derives_motor_current_from_commanded_torque() {
        use crate::dtc::{CircularDtcStore, EcuId};
        use crate::zone_ecu::{DtcStoreVariant, ZoneEcu};
        let mut ecu = ZoneEcu::new(EcuId::Cvc, DtcStoreVariant::Circular(CircularDtcStore::new()));
        ecu.init(&cvc_cfg::SIGNALS, &cvc_cfg::RUNNABLES).unwrap();
        let _ = ecu.signals.write(cvc_cfg::SIG_TORQUE_PERCENT, 100);
        ecu.tick(&cvc_cfg::RUNNABLES, |_| {}).unwrap();
        assert_eq!(ecu.signals.read(cvc_cfg::SIG_MOTOR_CURRENT_MA), Ok(25000));
    }
}
