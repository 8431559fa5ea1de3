//! Round-robin selection of the register blocks to fetch on each tick.
//!
//! A full realtime refresh is spread over six ticks, one [`PollPhase`] per tick, so that a
//! single tick never occupies the bus for long. After [`STATS_REFRESH_CYCLES`] cycles
//! one tick is spent on the statistics block instead.
//!
//! [`PollPhase`]: enum.PollPhase.html
//! [`STATS_REFRESH_CYCLES`]: ../constants/constant.STATS_REFRESH_CYCLES.html

use constants::STATS_REFRESH_CYCLES;
use registers::{self, RegisterBlock};

/// A group of realtime blocks fetched during the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    PvInput,
    ChargePower,
    Load,
    Temperatures,
    OverallCurrent,
    /// Also reads the manual load coil.
    Status,
}

static PV_INPUT_BLOCKS: [RegisterBlock; 1] = [registers::PV_INPUT];
static CHARGE_POWER_BLOCKS: [RegisterBlock; 1] = [registers::CHARGE_POWER];
static LOAD_BLOCKS: [RegisterBlock; 1] = [registers::LOAD];
static TEMPERATURE_BLOCKS: [RegisterBlock; 2] = [registers::TEMPERATURES, registers::BATTERY_SOC];
static OVERALL_CURRENT_BLOCKS: [RegisterBlock; 1] = [registers::OVERALL_CURRENT];
static STATUS_BLOCKS: [RegisterBlock; 1] = [registers::STATUS];

impl PollPhase {
    /// All phases, ordered by their counter value.
    pub const ALL: [PollPhase; 6] = [
        PollPhase::PvInput,
        PollPhase::ChargePower,
        PollPhase::Load,
        PollPhase::Temperatures,
        PollPhase::OverallCurrent,
        PollPhase::Status,
    ];

    /// The realtime counter value selecting this phase.
    pub fn counter (&self) -> u8 {
        match *self {
            PollPhase::PvInput => 0,
            PollPhase::ChargePower => 1,
            PollPhase::Load => 2,
            PollPhase::Temperatures => 3,
            PollPhase::OverallCurrent => 4,
            PollPhase::Status => 5,
        }
    }

    /// The phase visited after this one. The counter counts down and wraps from 0 to 5.
    pub fn next (&self) -> PollPhase {
        match *self {
            PollPhase::PvInput => PollPhase::Status,
            PollPhase::Status => PollPhase::OverallCurrent,
            PollPhase::OverallCurrent => PollPhase::Temperatures,
            PollPhase::Temperatures => PollPhase::Load,
            PollPhase::Load => PollPhase::ChargePower,
            PollPhase::ChargePower => PollPhase::PvInput,
        }
    }

    pub fn blocks (&self) -> &'static [RegisterBlock] {
        match *self {
            PollPhase::PvInput => &PV_INPUT_BLOCKS,
            PollPhase::ChargePower => &CHARGE_POWER_BLOCKS,
            PollPhase::Load => &LOAD_BLOCKS,
            PollPhase::Temperatures => &TEMPERATURE_BLOCKS,
            PollPhase::OverallCurrent => &OVERALL_CURRENT_BLOCKS,
            PollPhase::Status => &STATUS_BLOCKS,
        }
    }

    pub fn reads_load_manual_coil (&self) -> bool {
        *self == PollPhase::Status
    }
}

/// What a single tick has to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Statistics,
    Realtime(PollPhase),
}

/// Position of the scheduler. Only [`advance`](#method.advance) mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    started_cycles: u16,
    phase: PollPhase,
}

impl Default for PollState {
    fn default() -> PollState { PollState::new() }
}

impl PollState {
    pub fn new() -> PollState {
        PollState { started_cycles: 0, phase: PollPhase::PvInput }
    }

    /// Number of cycles started since the last statistics refresh, `0..=STATS_REFRESH_CYCLES`.
    pub fn global_update_counter (&self) -> u16 { self.started_cycles }

    /// The phase fetched on the next realtime tick.
    pub fn phase (&self) -> PollPhase { self.phase }

    pub fn realtime_counter (&self) -> u8 { self.phase.counter() }

    /// Decides what the current tick fetches and moves to the next position. Never fails, the
    /// outcome of the fetch does not influence the schedule.
    ///
    /// ```
    /// # use epever485::scheduler::{PollState, PollStep, PollPhase};
    /// let mut state = PollState::new();
    /// assert_eq!(state.advance(), PollStep::Realtime(PollPhase::PvInput));
    /// assert_eq!(state.advance(), PollStep::Realtime(PollPhase::Status));
    /// ```
    pub fn advance (&mut self) -> PollStep {
        if self.started_cycles == STATS_REFRESH_CYCLES {
            self.started_cycles = 0;
            return PollStep::Statistics;
        }
        let phase = self.phase;
        if phase == PollPhase::PvInput {
            self.started_cycles += 1;
        }
        self.phase = phase.next();
        PollStep::Realtime(phase)
    }
}
