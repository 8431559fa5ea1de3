//! Data objects such as the `TelemetrySnapshot`, `BooleanVariable`s etc.

use std::str::FromStr;
use std::{fmt, result};
use serde::Serialize;
use serde::ser::{Serializer, SerializeStruct};
use serde_json;
use clap;
use constants::*;
use errors::*;
use status::{BatteryStatus, ChargingStatus, DischargingStatus};

/// Represents an unit.
pub type Unit = &'static str;
/// Represents a complete reading, composed by its name, the value itself (`f64`) and its unit.
pub type Reading = (&'static str, f64, Unit);

/// Statistics refreshed once every [`STATS_REFRESH_CYCLES`] realtime cycles.
///
/// [`STATS_REFRESH_CYCLES`]: ../constants/constant.STATS_REFRESH_CYCLES.html
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub today_pv_volt_max: f64,
    pub today_pv_volt_min: f64,
    pub today_bat_volt_max: f64,
    pub today_bat_volt_min: f64,
    pub today_consumed_energy: f64,
    pub month_consumed_energy: f64,
    pub year_consumed_energy: f64,
    pub total_consumed_energy: f64,
    pub today_generated_energy: f64,
    pub month_generated_energy: f64,
    pub year_generated_energy: f64,
    pub total_generated_energy: f64,
    pub co2_reduction: f64,
}

/// The latest known values read from the controller.
///
/// Fields are only overwritten by a successful read of the block holding them, a failed read
/// leaves the previous value in place. Until the first successful read numeric fields are `0`
/// and status fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub pv_voltage: f64,
    pub pv_current: f64,
    pub pv_power: f64,
    pub battery_voltage: f64,
    pub battery_charge_current: f64,
    pub battery_charge_power: f64,
    pub battery_overall_current: f64,
    pub battery_soc: f64,
    pub remote_battery_temperature: f64,
    pub battery_temperature: f64,
    pub controller_temperature: f64,
    pub load_current: f64,
    pub load_power: f64,

    pub battery_status: Option<BatteryStatus>,
    pub charging_status: Option<ChargingStatus>,
    pub discharging_status: Option<DischargingStatus>,

    pub load_force_on: bool,
    pub load_manual_on: bool,
    pub charging_device_on: bool,

    pub stats: Statistics,
}

impl TelemetrySnapshot {
    /// Every numeric field as a `(name, value, unit)` triple, realtime values first.
    ///
    /// ```
    /// # use epever485::data::TelemetrySnapshot;
    /// let mut snapshot = TelemetrySnapshot::default();
    /// snapshot.pv_voltage = 18.5;
    /// assert_eq!(snapshot.readings()[0], ("pv_voltage", 18.5, "V"));
    /// ```
    pub fn readings (&self) -> Vec<Reading> {
        let stats = &self.stats;
        vec![
            ("pv_voltage", self.pv_voltage, "V"),
            ("pv_current", self.pv_current, "A"),
            ("pv_power", self.pv_power, "W"),
            ("battery_voltage", self.battery_voltage, "V"),
            ("battery_charge_current", self.battery_charge_current, "A"),
            ("battery_charge_power", self.battery_charge_power, "W"),
            ("battery_overall_current", self.battery_overall_current, "A"),
            ("battery_soc", self.battery_soc, "%"),
            ("remote_battery_temperature", self.remote_battery_temperature, "°C"),
            ("battery_temperature", self.battery_temperature, "°C"),
            ("controller_temperature", self.controller_temperature, "°C"),
            ("load_current", self.load_current, "A"),
            ("load_power", self.load_power, "W"),
            ("today_pv_volt_max", stats.today_pv_volt_max, "V"),
            ("today_pv_volt_min", stats.today_pv_volt_min, "V"),
            ("today_bat_volt_max", stats.today_bat_volt_max, "V"),
            ("today_bat_volt_min", stats.today_bat_volt_min, "V"),
            ("today_consumed_energy", stats.today_consumed_energy, "kWh"),
            ("month_consumed_energy", stats.month_consumed_energy, "kWh"),
            ("year_consumed_energy", stats.year_consumed_energy, "kWh"),
            ("total_consumed_energy", stats.total_consumed_energy, "kWh"),
            ("today_generated_energy", stats.today_generated_energy, "kWh"),
            ("month_generated_energy", stats.month_generated_energy, "kWh"),
            ("year_generated_energy", stats.year_generated_energy, "kWh"),
            ("total_generated_energy", stats.total_generated_energy, "kWh"),
            ("co2_reduction", stats.co2_reduction, "t"),
        ]
    }

    /// Status texts in the order battery, charging, discharging. Unknown states yield `None`.
    pub fn status_texts (&self) -> [Option<String>; 3] {
        [
            self.battery_status.map (|s| s.to_string()),
            self.charging_status.map (|s| s.to_string()),
            self.discharging_status.map (|s| s.to_string()),
        ]
    }

    /// The cached value of a coil-backed variable.
    pub fn boolean (&self, variable: BooleanVariable) -> bool {
        match variable {
            BooleanVariable::LoadForceOnOff => self.load_force_on,
            BooleanVariable::LoadManualOnOff => self.load_manual_on,
            BooleanVariable::ChargingDeviceOnOff => self.charging_device_on,
        }
    }

    pub fn set_boolean (&mut self, variable: BooleanVariable, value: bool) {
        match variable {
            BooleanVariable::LoadForceOnOff => self.load_force_on = value,
            BooleanVariable::LoadManualOnOff => self.load_manual_on = value,
            BooleanVariable::ChargingDeviceOnOff => self.charging_device_on = value,
        }
    }
}

// Status enums are serialised as their display text, which is what bridges publish.
impl Serialize for TelemetrySnapshot {
    fn serialize<S: Serializer> (&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        let readings = self.readings();
        let [battery, charging, discharging] = self.status_texts();
        let mut state = serializer.serialize_struct ("TelemetrySnapshot", 20)?;
        for &(name, value, _) in readings.iter().take (13) {
            state.serialize_field (name, &value)?;
        }
        state.serialize_field ("battery_status", &battery)?;
        state.serialize_field ("charging_status", &charging)?;
        state.serialize_field ("discharging_status", &discharging)?;
        state.serialize_field (BooleanVariable::LoadForceOnOff.name(), &self.load_force_on)?;
        state.serialize_field (BooleanVariable::LoadManualOnOff.name(), &self.load_manual_on)?;
        state.serialize_field (BooleanVariable::ChargingDeviceOnOff.name(), &self.charging_device_on)?;
        state.serialize_field ("stats", &self.stats)?;
        state.end()
    }
}

/// A coil-backed on/off variable of the controller.
///
/// It is possible to obtain a `BooleanVariable` from a `String` using the `from_str` trait:
/// ```
/// # use epever485::data::BooleanVariable;
/// use std::str::FromStr;
/// assert_eq!(BooleanVariable::from_str ("load_manual_onoff").ok(),
///     Some(BooleanVariable::LoadManualOnOff));
/// assert!(BooleanVariable::from_str ("pv_voltage").is_err());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BooleanVariable {
    LoadForceOnOff,
    LoadManualOnOff,
    ChargingDeviceOnOff,
}

impl BooleanVariable {
    pub const ALL: [BooleanVariable; 3] = [
        BooleanVariable::LoadForceOnOff,
        BooleanVariable::LoadManualOnOff,
        BooleanVariable::ChargingDeviceOnOff,
    ];

    /// The coil holding this variable.
    pub fn coil (&self) -> u16 {
        match *self {
            BooleanVariable::LoadForceOnOff => COIL_LOAD_FORCE_ONOFF,
            BooleanVariable::LoadManualOnOff => COIL_LOAD_MANUAL_ONOFF,
            BooleanVariable::ChargingDeviceOnOff => COIL_BATTERY_CHARGE_ONOFF,
        }
    }

    pub fn name (&self) -> &'static str {
        match *self {
            BooleanVariable::LoadForceOnOff => "load_force_onoff",
            BooleanVariable::LoadManualOnOff => "load_manual_onoff",
            BooleanVariable::ChargingDeviceOnOff => "charging_device_onoff",
        }
    }
}

impl FromStr for BooleanVariable {
    type Err = Error;
    fn from_str (s: &str) -> Result<Self> {
        BooleanVariable::ALL.iter()
            .find (|variable| variable.name() == s)
            .cloned()
            .ok_or_else (|| ErrorKind::UnknownVariable (s.to_owned()).into())
    }
}

impl fmt::Display for BooleanVariable {
    fn fmt (&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str (self.name())
    }
}

/// Parses the `on`/`off` value of a boolean variable.
pub fn parse_switch (s: &str) -> Option<bool> {
    match s {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Represents the different kinds of output formats.
#[derive(Debug)]
pub enum OutputFormat {
    /// Standard output format. One line per reading, includes name and unit, followed by the
    /// status texts.
    /// ```text
    /// $ epever485 --once /dev/ttyUSB0
    /// pv_voltage = 18.52 V
    /// pv_current = 0.41 A
    /// ...
    /// battery_status = Normal
    /// ```
    Normal,
    /// Compact output format. Space-delimited values in `readings()` order, no names or units.
    /// ```text
    /// $ epever485 --once --compact /dev/ttyUSB0
    /// 18.52 0.41 7.59 13.2 0.57 ...
    /// ```
    Compact,
    /// The whole snapshot as a single line of JSON.
    Json,
}

impl OutputFormat {
    /// Returns an `OutputFormat` variant given the user-specified command line arguments.
    pub fn from_args (args: &clap::ArgMatches) -> OutputFormat {
        if args.is_present ("compact") {
            OutputFormat::Compact
        } else if args.is_present ("json") {
            OutputFormat::Json
        } else {
            OutputFormat::Normal
        }
    }

    /// Renders a snapshot with this output format.
    pub fn render (&self, snapshot: &TelemetrySnapshot) -> String {
        match *self {
            OutputFormat::Normal => {
                let mut lines: Vec<String> = snapshot.readings().into_iter()
                    .map (|(name, value, unit)| format!("{} = {} {}", name, value, unit))
                    .collect();
                let names = ["battery_status", "charging_status", "discharging_status"];
                for (name, text) in names.iter().zip (snapshot.status_texts().iter()) {
                    lines.push (format!("{} = {}", name,
                        text.as_ref().map (String::as_str).unwrap_or ("?")));
                }
                for variable in BooleanVariable::ALL.iter() {
                    lines.push (format!("{} = {}", variable,
                        if snapshot.boolean (*variable) { "on" } else { "off" }));
                }
                lines.join ("\n")
            },
            OutputFormat::Compact => snapshot.readings().iter()
                .map (|&(_, value, _)| value.to_string())
                .collect::<Vec<_>>()
                .join (" "),
            // serialising plain numbers, strings and bools cannot fail
            OutputFormat::Json => serde_json::to_string (snapshot).unwrap_or_default(),
        }
    }
}
