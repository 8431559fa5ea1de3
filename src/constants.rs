//! Register numbers and other constants.
//! # Note about register numbers
//! Input registers are grouped in blocks which are fetched with a single request. The constants
//! in this module point to the first register of each block; the fields inside a block are
//! located by their offset. See [`RegisterBlock`] for the complete table.
//!
//! 32-bit quantities span two consecutive registers, low word first. For example the PV power
//! lives at `0x3102` (low) and `0x3103` (high).
//!
//! [`RegisterBlock`]: ../registers/struct.RegisterBlock.html

/// PV voltage, PV current, PV power (32-bit), battery voltage, battery charge current.
pub const REGISTER_PV_INPUT:        u16 = 0x3100;
/// Battery charge power (32-bit).
pub const REGISTER_CHARGE_POWER:    u16 = 0x3106;
/// Load current, load power (32-bit).
pub const REGISTER_LOAD:            u16 = 0x310D;
/// Battery temperature, controller temperature.
pub const REGISTER_TEMPERATURES:    u16 = 0x3110;
/// Battery state of charge, remote battery temperature.
pub const REGISTER_BATTERY_SOC:     u16 = 0x311A;
/// Battery overall current (32-bit).
pub const REGISTER_OVERALL_CURRENT: u16 = 0x331B;
/// Battery status, charging equipment status, discharging equipment status.
pub const REGISTER_STATUS:          u16 = 0x3200;
/// Daily/monthly/yearly statistics.
pub const REGISTER_STATISTICS:      u16 = 0x3300;
/// Realtime clock (holding registers, write-only for us).
pub const REGISTER_REALTIME_CLOCK:  u16 = 0x9013;

/// Forces the load output on/off.
pub const COIL_LOAD_FORCE_ONOFF:     u16 = 0x0006;
/// Load output on/off in manual mode.
pub const COIL_LOAD_MANUAL_ONOFF:    u16 = 0x0002;
/// Enables/disables the charging device.
pub const COIL_BATTERY_CHARGE_ONOFF: u16 = 0x0000;

/// Number of realtime cycles after which the statistics block is refreshed.
pub const STATS_REFRESH_CYCLES: u16 = 360;

/// Default slave address of the controller.
pub const DEFAULT_SLAVE_ADDRESS: u8 = 1;
/// Default baud rate of the EPEVER RS485 port.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Bounded wait for a single response, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 500;
/// Pause between two scheduler ticks, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
