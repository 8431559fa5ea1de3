//! The register blocks read from the controller and how their words are decoded.
//!
//! Decoding is a pure transformation of already fetched words into a [`TelemetrySnapshot`]: it
//! performs no I/O and only touches the fields owned by the block. A decode function returns
//! `false` (and leaves the snapshot alone) when it is handed the wrong number of words.
//!
//! [`TelemetrySnapshot`]: ../data/struct.TelemetrySnapshot.html

use constants::*;
use data::TelemetrySnapshot;
use num_utils::*;
use status::{BatteryStatus, ChargingStatus, DischargingStatus};

/// Decodes the words of a block into the snapshot.
pub type DecodeFn = fn (&[u16], &mut TelemetrySnapshot) -> bool;

/// A contiguous range of input registers fetched with a single request.
#[derive(Clone, Copy)]
pub struct RegisterBlock {
    pub name: &'static str,
    pub address: u16,
    pub count: u16,
    pub decode: DecodeFn,
}

impl RegisterBlock {
    /// Applies `words` to `snapshot`, see [`DecodeFn`](type.DecodeFn.html).
    pub fn decode (&self, words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
        (self.decode) (words, snapshot)
    }
}

impl ::std::fmt::Debug for RegisterBlock {
    fn fmt (&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "{}@0x{:04X}+{}", self.name, self.address, self.count)
    }
}

pub const PV_INPUT: RegisterBlock = RegisterBlock {
    name: "pv_input", address: REGISTER_PV_INPUT, count: 6, decode: decode_pv_input,
};
pub const CHARGE_POWER: RegisterBlock = RegisterBlock {
    name: "charge_power", address: REGISTER_CHARGE_POWER, count: 2, decode: decode_charge_power,
};
pub const LOAD: RegisterBlock = RegisterBlock {
    name: "load", address: REGISTER_LOAD, count: 3, decode: decode_load,
};
pub const TEMPERATURES: RegisterBlock = RegisterBlock {
    name: "temperatures", address: REGISTER_TEMPERATURES, count: 2, decode: decode_temperatures,
};
pub const BATTERY_SOC: RegisterBlock = RegisterBlock {
    name: "battery_soc", address: REGISTER_BATTERY_SOC, count: 2, decode: decode_battery_soc,
};
pub const OVERALL_CURRENT: RegisterBlock = RegisterBlock {
    name: "overall_current", address: REGISTER_OVERALL_CURRENT, count: 2,
    decode: decode_overall_current,
};
pub const STATUS: RegisterBlock = RegisterBlock {
    name: "status", address: REGISTER_STATUS, count: 3, decode: decode_status,
};
pub const STATISTICS: RegisterBlock = RegisterBlock {
    name: "statistics", address: REGISTER_STATISTICS, count: 29, decode: decode_statistics,
};

/// Every input register block, in the order a full refresh reads the realtime ones.
pub const ALL_BLOCKS: [RegisterBlock; 8] = [
    STATISTICS, PV_INPUT, CHARGE_POWER, LOAD, TEMPERATURES, BATTERY_SOC, OVERALL_CURRENT, STATUS,
];

fn decode_pv_input (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [pv_voltage, pv_current, power_low, power_high, battery_voltage, charge_current] = *words {
        snapshot.pv_voltage = centi (pv_voltage);
        snapshot.pv_current = centi (pv_current);
        snapshot.pv_power = centi_u32 (power_low, power_high);
        snapshot.battery_voltage = centi (battery_voltage);
        snapshot.battery_charge_current = centi (charge_current);
        true
    } else {
        false
    }
}

fn decode_charge_power (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [low, high] = *words {
        snapshot.battery_charge_power = centi_u32 (low, high);
        true
    } else {
        false
    }
}

fn decode_load (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [current, power_low, power_high] = *words {
        snapshot.load_current = centi (current);
        snapshot.load_power = centi_u32 (power_low, power_high);
        true
    } else {
        false
    }
}

fn decode_temperatures (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [battery, controller] = *words {
        snapshot.battery_temperature = centi (battery);
        snapshot.controller_temperature = centi (controller);
        true
    } else {
        false
    }
}

fn decode_battery_soc (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [soc, remote_temperature] = *words {
        snapshot.battery_soc = whole (soc);
        snapshot.remote_battery_temperature = centi (remote_temperature);
        true
    } else {
        false
    }
}

fn decode_overall_current (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [low, high] = *words {
        snapshot.battery_overall_current = centi_u32 (low, high);
        true
    } else {
        false
    }
}

fn decode_status (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if let [battery, charging, discharging] = *words {
        snapshot.battery_status = Some(BatteryStatus::from_word (battery));
        snapshot.charging_status = Some(ChargingStatus::from_word (charging));
        snapshot.discharging_status = Some(DischargingStatus::from_word (discharging));
        true
    } else {
        false
    }
}

// Word offsets from 0x3300. 32-bit values are stored low word first.
fn decode_statistics (words: &[u16], snapshot: &mut TelemetrySnapshot) -> bool {
    if words.len() != STATISTICS.count as usize {
        return false;
    }
    let energy = |offset: usize| centi_u32 (words[offset], words[offset + 1]);
    let stats = &mut snapshot.stats;
    stats.today_pv_volt_max = centi (words[0]);
    stats.today_pv_volt_min = centi (words[1]);
    stats.today_bat_volt_max = centi (words[2]);
    stats.today_bat_volt_min = centi (words[3]);
    stats.today_consumed_energy = energy (4);
    stats.month_consumed_energy = energy (6);
    stats.year_consumed_energy = energy (8);
    stats.total_consumed_energy = energy (10);
    stats.today_generated_energy = energy (12);
    stats.month_generated_energy = energy (14);
    stats.year_generated_energy = energy (16);
    stats.total_generated_energy = energy (18);
    stats.co2_reduction = energy (20);
    true
}
