//! The polling engine and the surface offered to upstream bridges.

use chrono::{Datelike, NaiveDateTime, Timelike};
use constants::REGISTER_REALTIME_CLOCK;
use data::{BooleanVariable, TelemetrySnapshot};
use errors::*;
use num_utils::pack_bytes;
use registers::{self, RegisterBlock};
use scheduler::{PollPhase, PollState, PollStep};
use transaction::{TransactionExecutor, Transport};
use transceiver::BusTransceiver;

/// What upstream bridges (MQTT, mobile app) may do with a charge controller.
pub trait PolledController {
    /// Reads every block back to back, bypassing the schedule. Returns `false` if any read
    /// failed.
    fn fetch_all (&mut self) -> bool;
    /// Runs one scheduler tick. Returns `false` if any transaction of this tick failed.
    fn poll_tick (&mut self) -> bool;
    fn read_boolean (&mut self, variable: BooleanVariable) -> Option<bool>;
    fn write_boolean (&mut self, variable: BooleanVariable, value: bool) -> bool;
    fn sync_realtime_clock (&mut self, now: &NaiveDateTime) -> bool;
    fn snapshot (&self) -> &TelemetrySnapshot;
    /// Set while the most recent transaction failed.
    fn is_degraded (&self) -> bool;
}

/// Packs a date into the three realtime clock registers: minute/second, day/hour, year/month.
/// The year is stored as an offset from 2000.
///
/// ```
/// # extern crate chrono;
/// # extern crate epever485;
/// # use chrono::NaiveDate;
/// # use epever485::controller::clock_words;
/// # fn main() {
/// let when = NaiveDate::from_ymd_opt (2023, 5, 17).unwrap().and_hms_opt (14, 32, 9).unwrap();
/// assert_eq!(clock_words (&when).unwrap(), [(32 << 8) | 9, (17 << 8) | 14, (23 << 8) | 5]);
/// # }
/// ```
pub fn clock_words<T: Datelike + Timelike> (when: &T) -> Result<[u16; 3]> {
    let year = when.year();
    if year < 2000 || year > 2000 + 255 {
        bail!(ErrorKind::InvalidDatetime(year));
    }
    Ok([
        pack_bytes (when.minute() as u8, when.second() as u8),
        pack_bytes (when.day() as u8, when.hour() as u8),
        pack_bytes ((year - 2000) as u8, when.month() as u8),
    ])
}

/// An EPEVER Tracer-family controller on an RS485 link.
pub struct EpeverController<T, X> {
    executor: TransactionExecutor<T, X>,
    snapshot: TelemetrySnapshot,
    poll: PollState,
}

impl<T: Transport, X: BusTransceiver> EpeverController<T, X> {
    pub fn new (transport: T, transceiver: X) -> EpeverController<T, X> {
        EpeverController {
            executor: TransactionExecutor::new (transport, transceiver),
            snapshot: TelemetrySnapshot::default(),
            poll: PollState::new(),
        }
    }

    pub fn poll_state (&self) -> &PollState { &self.poll }

    pub fn executor (&self) -> &TransactionExecutor<T, X> { &self.executor }
    pub fn executor_mut (&mut self) -> &mut TransactionExecutor<T, X> { &mut self.executor }

    fn fetch_block (&mut self, block: &RegisterBlock) -> bool {
        match self.executor.read_input_registers (block.address, block.count) {
            Some(words) => block.decode (&words, &mut self.snapshot),
            None => false,
        }
    }

    fn fetch_phase (&mut self, phase: PollPhase) -> bool {
        let mut ok = true;
        if phase.reads_load_manual_coil() {
            ok &= self.read_boolean (BooleanVariable::LoadManualOnOff).is_some();
        }
        for block in phase.blocks() {
            ok &= self.fetch_block (block);
        }
        ok
    }

    fn fetch_statistics (&mut self) -> bool {
        let ok = self.fetch_block (&registers::STATISTICS);
        if ok {
            info!("statistics refreshed: {} kWh generated today",
                self.snapshot.stats.today_generated_energy);
        }
        ok
    }

    /// [`read_boolean`] by variable name. Unknown names fail without any bus traffic.
    ///
    /// [`read_boolean`]: trait.PolledController.html#tymethod.read_boolean
    pub fn read_named (&mut self, name: &str) -> Option<bool> {
        match name.parse::<BooleanVariable>() {
            Ok(variable) => self.read_boolean (variable),
            Err(error) => {
                warn!("{}", error);
                None
            }
        }
    }

    /// [`write_boolean`] by variable name. Unknown names fail without any bus traffic.
    ///
    /// [`write_boolean`]: trait.PolledController.html#tymethod.write_boolean
    pub fn write_named (&mut self, name: &str, value: bool) -> bool {
        match name.parse::<BooleanVariable>() {
            Ok(variable) => self.write_boolean (variable, value),
            Err(error) => {
                warn!("{}", error);
                false
            }
        }
    }
}

impl<T: Transport, X: BusTransceiver> PolledController for EpeverController<T, X> {
    fn fetch_all (&mut self) -> bool {
        let mut ok = self.fetch_statistics();
        for phase in PollPhase::ALL.iter() {
            ok &= self.fetch_phase (*phase);
        }
        ok
    }

    fn poll_tick (&mut self) -> bool {
        match self.poll.advance() {
            PollStep::Statistics => self.fetch_statistics(),
            PollStep::Realtime(phase) => self.fetch_phase (phase),
        }
    }

    fn read_boolean (&mut self, variable: BooleanVariable) -> Option<bool> {
        let value = self.executor.read_coil (variable.coil());
        if let Some(value) = value {
            self.snapshot.set_boolean (variable, value);
        }
        value
    }

    fn write_boolean (&mut self, variable: BooleanVariable, value: bool) -> bool {
        let ok = self.executor.write_coil (variable.coil(), value);
        if ok {
            self.snapshot.set_boolean (variable, value);
        }
        ok
    }

    fn sync_realtime_clock (&mut self, now: &NaiveDateTime) -> bool {
        match clock_words (now) {
            Ok(words) => {
                let ok = self.executor.write_multiple_registers (REGISTER_REALTIME_CLOCK, &words);
                if ok {
                    info!("controller clock set to {}", now);
                }
                ok
            },
            Err(error) => {
                warn!("{}", error);
                false
            }
        }
    }

    fn snapshot (&self) -> &TelemetrySnapshot { &self.snapshot }

    fn is_degraded (&self) -> bool { !self.executor.last_ok() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use constants::*;
    use sim::{CountingTransceiver, Fault, SimulatedBus};
    use status::ChargingStatus;
    use transaction::Request;

    type TestController = EpeverController<SimulatedBus, CountingTransceiver>;

    fn controller() -> TestController {
        let mut bus = SimulatedBus::new();
        bus.set_input_registers (REGISTER_PV_INPUT, &[1852, 41, 759, 0, 1321, 57]);
        bus.set_input_registers (REGISTER_CHARGE_POWER, &[753, 0]);
        bus.set_input_registers (REGISTER_LOAD, &[120, 1584, 0]);
        bus.set_input_registers (REGISTER_TEMPERATURES, &[2510, 3120]);
        bus.set_input_registers (REGISTER_BATTERY_SOC, &[87, 2150]);
        bus.set_input_registers (REGISTER_OVERALL_CURRENT, &[45, 0]);
        bus.set_input_registers (REGISTER_STATUS, &[0, 0x0004, 0x0001]);
        bus.set_input_registers (REGISTER_STATISTICS + 12, &[310, 0]);
        bus.coils.insert (COIL_LOAD_MANUAL_ONOFF, true);
        EpeverController::new (bus, CountingTransceiver::default())
    }

    fn bus (controller: &mut TestController) -> &mut SimulatedBus {
        controller.executor_mut().transport_mut()
    }

    #[test]
    fn fetch_all_reads_every_block() {
        let mut controller = controller();
        assert!(controller.fetch_all());
        assert_eq!(bus (&mut controller).register_reads(), vec![
            0x3300, 0x3100, 0x3106, 0x310D, 0x3110, 0x311A, 0x331B, 0x3200,
        ]);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.pv_voltage, 18.52);
        assert_eq!(snapshot.pv_power, 7.59);
        assert_eq!(snapshot.battery_charge_power, 7.53);
        assert_eq!(snapshot.load_power, 15.84);
        assert_eq!(snapshot.controller_temperature, 31.2);
        assert_eq!(snapshot.battery_soc, 87.0);
        assert_eq!(snapshot.battery_overall_current, 0.45);
        assert_eq!(snapshot.charging_status, Some(ChargingStatus::Float));
        assert_eq!(snapshot.stats.today_generated_energy, 3.1);
        assert!(snapshot.load_manual_on);
        assert_eq!(controller.poll_state(), &PollState::new());
    }

    #[test]
    fn six_ticks_fetch_each_realtime_block_once() {
        let mut controller = controller();
        let initial = controller.poll_state().realtime_counter();
        for _ in 0..6 {
            assert!(controller.poll_tick());
        }
        let mut reads = bus (&mut controller).register_reads();
        reads.sort();
        assert_eq!(reads, vec![0x3100, 0x3106, 0x310D, 0x3110, 0x311A, 0x3200, 0x331B]);
        let coil_reads = bus (&mut controller).requests.iter()
            .filter (|r| **r == Request::ReadCoils(COIL_LOAD_MANUAL_ONOFF, 1))
            .count();
        assert_eq!(coil_reads, 1);
        assert_eq!(controller.poll_state().realtime_counter(), initial);
        let transceiver = controller.executor().transceiver();
        assert_eq!((transceiver.before, transceiver.after), (8, 8));
    }

    #[test]
    fn statistics_are_refreshed_once_per_period() {
        let mut controller = controller();
        let period = 6 * STATS_REFRESH_CYCLES as usize + 1;
        for _ in 0..period {
            controller.poll_tick();
            assert!(controller.poll_state().global_update_counter() <= STATS_REFRESH_CYCLES);
        }
        let stats_reads = bus (&mut controller).register_reads().into_iter()
            .filter (|&address| address == REGISTER_STATISTICS)
            .count();
        assert_eq!(stats_reads, 1);
        assert_eq!(controller.snapshot().stats.today_generated_energy, 3.1);
    }

    #[test]
    fn failed_reads_keep_previous_values() {
        let mut controller = controller();
        assert!(controller.fetch_all());
        let before = controller.snapshot().clone();
        {
            let bus = bus (&mut controller);
            bus.set_input_registers (REGISTER_PV_INPUT, &[0, 0, 0, 0, 0, 0]);
            bus.set_input_registers (REGISTER_STATUS, &[1, 0x0010, 0x0002]);
            bus.coils.insert (COIL_LOAD_MANUAL_ONOFF, false);
            bus.fail_always (Some(Fault::Timeout));
        }
        assert!(!controller.fetch_all());
        for _ in 0..12 {
            assert!(!controller.poll_tick());
        }
        assert_eq!(controller.snapshot(), &before);
        assert!(controller.is_degraded());
    }

    #[test]
    fn not_degraded_before_the_first_transaction() {
        let controller = controller();
        assert!(!controller.is_degraded());
        assert_eq!(controller.executor().transceiver().before, 0);
        assert_eq!(controller.snapshot(), &TelemetrySnapshot::default());
    }

    #[test]
    fn scheduler_advances_through_failures() {
        let mut controller = controller();
        bus (&mut controller).fail_next (&[Fault::BadCrc]);
        assert!(!controller.poll_tick());
        assert!(controller.is_degraded());
        assert_eq!(controller.poll_state().phase(), PollPhase::Status);
        // the failed PV block is skipped until its next turn
        assert!(controller.poll_tick());
        assert!(!controller.is_degraded());
        assert_eq!(bus (&mut controller).register_reads(), vec![0x3100, 0x3200]);
        assert_eq!(controller.snapshot().pv_voltage, 0.0);
    }

    #[test]
    fn partial_failure_marks_the_tick_failed() {
        let mut controller = controller();
        controller.poll_tick();
        // Status phase: the coil read fails, the status block succeeds
        bus (&mut controller).fail_next (&[Fault::ShortResponse]);
        assert!(!controller.poll_tick());
        assert!(!controller.is_degraded());
        assert!(!controller.snapshot().load_manual_on);
        assert!(controller.snapshot().discharging_status.is_some());
    }

    #[test]
    fn boolean_round_trip() {
        let mut controller = controller();
        for variable in BooleanVariable::ALL.iter() {
            assert!(controller.write_boolean (*variable, true));
            assert_eq!(controller.read_boolean (*variable), Some(true));
            assert!(controller.snapshot().boolean (*variable));
        }
        assert_eq!(bus (&mut controller).coils.get (&COIL_LOAD_FORCE_ONOFF), Some(&true));
    }

    #[test]
    fn write_updates_cache_even_when_bus_does_not_store() {
        let mut controller = controller();
        bus (&mut controller).ignore_writes = true;
        assert!(controller.write_boolean (BooleanVariable::ChargingDeviceOnOff, true));
        assert!(controller.snapshot().charging_device_on);
        assert_eq!(controller.read_boolean (BooleanVariable::ChargingDeviceOnOff), Some(false));
        assert!(!controller.snapshot().charging_device_on);
    }

    #[test]
    fn failed_write_keeps_cache() {
        let mut controller = controller();
        bus (&mut controller).fail_next (&[Fault::WrongEcho]);
        assert!(!controller.write_boolean (BooleanVariable::LoadForceOnOff, true));
        assert!(!controller.snapshot().load_force_on);
    }

    #[test]
    fn unknown_names_do_not_touch_the_bus() {
        let mut controller = controller();
        assert_eq!(controller.read_named ("pv_voltage"), None);
        assert!(!controller.write_named ("LOAD", true));
        assert!(bus (&mut controller).requests.is_empty());
        assert_eq!(controller.executor().transceiver().before, 0);
        assert_eq!(controller.read_named ("load_manual_onoff"), Some(true));
    }

    #[test]
    fn clock_sync_writes_three_registers() {
        let mut controller = controller();
        let now = NaiveDate::from_ymd_opt (2021, 12, 3).unwrap().and_hms_opt (7, 45, 30).unwrap();
        assert!(controller.sync_realtime_clock (&now));
        let bus = bus (&mut controller);
        assert_eq!(bus.requests, vec![Request::WriteMultipleRegisters(
            REGISTER_REALTIME_CLOCK, vec![(45 << 8) | 30, (3 << 8) | 7, (21 << 8) | 12])]);
    }

    #[test]
    fn clock_sync_rejects_unrepresentable_years() {
        let mut controller = controller();
        let old = NaiveDate::from_ymd_opt (1999, 12, 31).unwrap().and_hms_opt (23, 59, 59).unwrap();
        assert!(!controller.sync_realtime_clock (&old));
        assert!(bus (&mut controller).requests.is_empty());
        match clock_words (&NaiveDate::from_ymd_opt (2256, 1, 1).unwrap().and_hms_opt (0, 0, 0).unwrap()) {
            Err(Error(ErrorKind::InvalidDatetime(2256), _)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
