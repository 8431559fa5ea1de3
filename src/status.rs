//! Classification of the three status words found at `0x3200`.
//!
//! Every word maps to exactly one state, unknown combinations included, so decoding never fails.
//! The texts are what upstream bridges display, they are produced through `Display`.

use std::fmt;

/// Battery voltage fault, taken from bits D1-D0 of the battery status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryVoltageFault {
    OverVoltage,
    UnderVoltage,
    LowVoltageDisconnect,
}

/// Battery temperature fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryTemperatureFault {
    OverTemperature,
    LowTemperature,
}

/// State of the battery, from the first status word.
///
/// Any non-zero word is a fault; the recognised causes are appended to the text:
/// ```
/// # use epever485::status::BatteryStatus;
/// assert_eq!(BatteryStatus::from_word (0).to_string(), "Normal");
/// assert_eq!(BatteryStatus::from_word (0x0002).to_string(), "! UNDER VOLT");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStatus {
    Normal,
    Fault {
        voltage: Option<BatteryVoltageFault>,
        temperature: Option<BatteryTemperatureFault>,
        abnormal_resistance: bool,
    },
}

impl BatteryStatus {
    pub fn from_word (word: u16) -> BatteryStatus {
        if word == 0 {
            return BatteryStatus::Normal;
        }
        let voltage = match word & 3 {
            1 => Some(BatteryVoltageFault::OverVoltage),
            2 => Some(BatteryVoltageFault::UnderVoltage),
            3 => Some(BatteryVoltageFault::LowVoltageDisconnect),
            _ => None,
        };
        // The temperature and resistance checks look at bits 17-16 and 32+ of a 16-bit word,
        // so they never match.
        let temperature = match (u64::from (word) >> 16) & 3 {
            1 => Some(BatteryTemperatureFault::OverTemperature),
            2 => Some(BatteryTemperatureFault::LowTemperature),
            _ => None,
        };
        let abnormal_resistance = (u64::from (word) >> 32) != 0;
        BatteryStatus::Fault { voltage, temperature, abnormal_resistance }
    }

    pub fn is_fault (&self) -> bool { *self != BatteryStatus::Normal }
}

impl fmt::Display for BatteryStatus {
    fn fmt (&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BatteryStatus::Normal => write!(f, "Normal"),
            BatteryStatus::Fault { voltage, temperature, abnormal_resistance } => {
                write!(f, "!")?;
                match voltage {
                    Some(BatteryVoltageFault::OverVoltage) => write!(f, " OVER VOLT")?,
                    Some(BatteryVoltageFault::UnderVoltage) => write!(f, " UNDER VOLT")?,
                    Some(BatteryVoltageFault::LowVoltageDisconnect) => write!(f, " LOW VOLT")?,
                    None => (),
                }
                match temperature {
                    Some(BatteryTemperatureFault::OverTemperature) => write!(f, " OVER TEMP")?,
                    Some(BatteryTemperatureFault::LowTemperature) => write!(f, " LOW TEMP")?,
                    None => (),
                }
                if abnormal_resistance {
                    write!(f, " ABN BATT. RESIST.")?;
                }
                if voltage.is_none() && temperature.is_none() && !abnormal_resistance {
                    write!(f, " ??")?;
                }
                Ok(())
            }
        }
    }
}

/// Charging equipment fault. The first matching bit wins, lowest bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingFault {
    PvInputShort,
    /// D5, not described by the manufacturer.
    UndocumentedD5,
    /// D6, not described by the manufacturer.
    UndocumentedD6,
    LoadMosShort,
    LoadShort,
    LoadOverCurrent,
    InputOverCurrent,
    AntiReverseMosShort,
    ChargeOrAntiReverseMosShort,
    ChargeMosShort,
    Unspecified,
}

/// Fault bits of the charging status word which are checked at all.
const CHARGING_FAULT_MASK: u16 = 0x0FF0;

const CHARGING_FAULTS: [(u16, ChargingFault); 10] = [
    (1 << 4,  ChargingFault::PvInputShort),
    (1 << 5,  ChargingFault::UndocumentedD5),
    (1 << 6,  ChargingFault::UndocumentedD6),
    (1 << 7,  ChargingFault::LoadMosShort),
    (1 << 8,  ChargingFault::LoadShort),
    (1 << 9,  ChargingFault::LoadOverCurrent),
    (1 << 10, ChargingFault::InputOverCurrent),
    (1 << 11, ChargingFault::AntiReverseMosShort),
    (1 << 12, ChargingFault::ChargeOrAntiReverseMosShort),
    (1 << 13, ChargingFault::ChargeMosShort),
];

/// State of the charging equipment, from the second status word.
///
/// Bit D2 is documented as the fault flag, but it actually tells whether the
/// controller is charging; faults are detected through bits D11-D4 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingStatus {
    Standby,
    Float,
    Boost,
    Equalisation,
    Fault(ChargingFault),
}

impl ChargingStatus {
    pub fn from_word (word: u16) -> ChargingStatus {
        if word & CHARGING_FAULT_MASK != 0 {
            let fault = CHARGING_FAULTS.iter()
                .find (|&&(bit, _)| word & bit != 0)
                .map (|&(_, fault)| fault)
                .unwrap_or (ChargingFault::Unspecified);
            return ChargingStatus::Fault (fault);
        }
        match (word >> 2) & 3 {
            0 => ChargingStatus::Standby,
            1 => ChargingStatus::Float,
            2 => ChargingStatus::Boost,
            _ => ChargingStatus::Equalisation,
        }
    }

    pub fn is_fault (&self) -> bool {
        match *self {
            ChargingStatus::Fault(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ChargingStatus {
    fn fmt (&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match *self {
            ChargingStatus::Standby => "Standby",
            ChargingStatus::Float => "Float",
            ChargingStatus::Boost => "Boost",
            ChargingStatus::Equalisation => "Equalisation",
            ChargingStatus::Fault(fault) => match fault {
                ChargingFault::PvInputShort => "! PV INPUT SHORT",
                ChargingFault::UndocumentedD5 => "! ?? D5",
                ChargingFault::UndocumentedD6 => "! ?? D6",
                ChargingFault::LoadMosShort => "! LOAD MOS. SHORT",
                ChargingFault::LoadShort => "! LOAD SHORT",
                ChargingFault::LoadOverCurrent => "! LOAD OVER CURR.",
                ChargingFault::InputOverCurrent => "! INPUT OVER CURR.",
                ChargingFault::AntiReverseMosShort => "! ANTI REV. MOS. SHORT",
                ChargingFault::ChargeOrAntiReverseMosShort => "! CHRG./ ANTI REV. MOS. SHORT",
                ChargingFault::ChargeMosShort => "! CHRG. MOS SHORT",
                ChargingFault::Unspecified => "! ??",
            },
        };
        f.write_str (text)
    }
}

/// Discharging equipment fault. The first matching bit wins, lowest bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DischargingFault {
    OutputOverVoltage,
    BoostOverVoltage,
    HighVoltageSideShort,
    InputOverVoltage,
    OutputVoltageAbnormal,
    UnableToStopDischarging,
    UnableToDischarge,
    Short,
    Unspecified,
}

const DISCHARGING_FAULTS: [(u16, DischargingFault); 8] = [
    (1 << 4,  DischargingFault::OutputOverVoltage),
    (1 << 5,  DischargingFault::BoostOverVoltage),
    (1 << 6,  DischargingFault::HighVoltageSideShort),
    (1 << 7,  DischargingFault::InputOverVoltage),
    (1 << 8,  DischargingFault::OutputVoltageAbnormal),
    (1 << 9,  DischargingFault::UnableToStopDischarging),
    (1 << 10, DischargingFault::UnableToDischarge),
    (1 << 11, DischargingFault::Short),
];

/// State of the discharging equipment (load output), from the third status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DischargingStatus {
    Standby,
    Running,
    Fault(DischargingFault),
}

impl DischargingStatus {
    pub fn from_word (word: u16) -> DischargingStatus {
        if word & 2 != 0 {
            let fault = DISCHARGING_FAULTS.iter()
                .find (|&&(bit, _)| word & bit != 0)
                .map (|&(_, fault)| fault)
                .unwrap_or (DischargingFault::Unspecified);
            DischargingStatus::Fault (fault)
        } else if word & 1 != 0 {
            DischargingStatus::Running
        } else {
            DischargingStatus::Standby
        }
    }

    pub fn is_fault (&self) -> bool {
        match *self {
            DischargingStatus::Fault(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DischargingStatus {
    fn fmt (&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match *self {
            DischargingStatus::Standby => "Standby",
            DischargingStatus::Running => "Running",
            DischargingStatus::Fault(fault) => match fault {
                DischargingFault::OutputOverVoltage => "! OUT OVER VOLT.",
                DischargingFault::BoostOverVoltage => "! BOOST OVER VOLT",
                DischargingFault::HighVoltageSideShort => "! HV SIDE SHORT",
                DischargingFault::InputOverVoltage => "! INPUT OVER VOLT.",
                DischargingFault::OutputVoltageAbnormal => "! OUT VOLT. ABN",
                DischargingFault::UnableToStopDischarging => "! UNABLE STOP DISC.",
                DischargingFault::UnableToDischarge => "! UNABLE DISC.",
                DischargingFault::Short => "! SHORT",
                DischargingFault::Unspecified => "! ??",
            },
        };
        f.write_str (text)
    }
}
