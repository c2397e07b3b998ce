//! IQ calibration results and candidate selection
//!
//! Everything in this module is pure: fixed-point helpers, the reading types the
//! hardware sequence in `iqk` produces, and the cross-round agreement vote that
//! decides which round gets programmed into the correction matrices.

use crate::{RfPath, MAX_RF_PATHS};

/// Number of measured rounds per calibration
pub const IQK_ROUNDS: usize = 3;

/// Largest per-component difference for two readings to agree
pub const MAX_TOLERANCE: i16 = 5;

/// Raw pair recorded for a measurement that never succeeded: unity gain, no correction
pub const FAILED_RAW: (u16, u16) = (0x100, 0x000);

/// Sign-extend a 10-bit two's-complement field
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn canonicalize(raw: u16) -> i16 {
    ((raw << 6) as i16) >> 6
}

/// Encode a value into a 10-bit two's-complement field
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode(value: i16) -> u16 {
    (value as u16) & 0x3ff
}

/// Fixed-point multiply used for the TX matrix elements
///
/// Returns `x * y` rescaled from Q.16 to Q.8, plus the LSB of the Q.9 value
/// which the hardware keeps in a separate extension bit.
#[must_use]
pub const fn iqk_mult(x: i32, y: i32) -> (i32, bool) {
    let t = x * y;
    (t >> 8, (t >> 7) & 1 != 0)
}

/// A canonicalized correlator pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Correlation {
    /// X component
    pub x: i16,
    /// Y component
    pub y: i16,
}

impl Correlation {
    /// Build from two raw 10-bit result fields
    #[must_use]
    pub const fn from_raw(x: u16, y: u16) -> Self {
        Self {
            x: canonicalize(x),
            y: canonicalize(y),
        }
    }

    /// Raw 10-bit encodings of both components
    #[must_use]
    pub const fn raw(self) -> (u16, u16) {
        (encode(self.x), encode(self.y))
    }

    /// Whether both components are within [`MAX_TOLERANCE`] of `other`
    #[must_use]
    pub fn is_close_to(self, other: Self) -> bool {
        (self.x - other.x).abs() <= MAX_TOLERANCE && (self.y - other.y).abs() <= MAX_TOLERANCE
    }
}

/// Outcome of one TX or RX measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    /// Hardware produced a plausible result
    Valid(Correlation),
    /// Every attempt failed
    Failed,
}

impl Reading {
    /// Correlation of a valid reading
    #[must_use]
    pub const fn correlation(self) -> Option<Correlation> {
        match self {
            Self::Valid(c) => Some(c),
            Self::Failed => None,
        }
    }

    /// Whether this reading can be used
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Raw register encoding; a failed reading encodes as [`FAILED_RAW`]
    #[must_use]
    pub const fn raw(self) -> (u16, u16) {
        match self {
            Self::Valid(c) => c.raw(),
            Self::Failed => FAILED_RAW,
        }
    }

    /// Whether two readings agree; a failed reading agrees with nothing
    #[must_use]
    pub fn agrees_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::Valid(a), Self::Valid(b)) => a.is_close_to(b),
            _ => false,
        }
    }
}

/// TX and RX readings of one RF path
///
/// `None` marks a slot that was not measured (path not driven) or, in the hybrid
/// round, not filled by the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PathReadings {
    /// TX correlator reading
    pub tx: Option<Reading>,
    /// RX correlator reading
    pub rx: Option<Reading>,
}

impl PathReadings {
    /// Readings of a measured path
    #[must_use]
    pub const fn measured(tx: Reading, rx: Reading) -> Self {
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    /// Valid TX correlation, if any
    #[must_use]
    pub fn tx_correlation(&self) -> Option<Correlation> {
        self.tx.and_then(Reading::correlation)
    }

    /// Valid RX correlation, if any
    #[must_use]
    pub fn rx_correlation(&self) -> Option<Correlation> {
        self.rx.and_then(Reading::correlation)
    }
}

/// Readings of every RF path for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRound {
    /// Per path readings, indexed by [`RfPath::index`]
    pub paths: [PathReadings; MAX_RF_PATHS],
}

impl CalibrationRound {
    /// Readings of `path`
    #[must_use]
    pub const fn path(&self, path: RfPath) -> &PathReadings {
        &self.paths[path.index()]
    }

    /// Sum of the raw encodings of every filled slot
    #[must_use]
    pub fn raw_sum(&self) -> u32 {
        self.paths
            .iter()
            .flat_map(|p| [p.tx, p.rx])
            .flatten()
            .map(|r| {
                let (x, y) = r.raw();
                u32::from(x) + u32::from(y)
            })
            .sum()
    }
}

/// Slot of a path, used to walk a round in hardware result order
#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Tx,
    Rx,
}

fn slot(readings: &PathReadings, which: Slot) -> Option<Reading> {
    match which {
        Slot::Tx => readings.tx,
        Slot::Rx => readings.rx,
    }
}

fn slot_mut(readings: &mut PathReadings, which: Slot) -> &mut Option<Reading> {
    match which {
        Slot::Tx => &mut readings.tx,
        Slot::Rx => &mut readings.rx,
    }
}

fn slots_agree(a: Option<Reading>, b: Option<Reading>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.agrees_with(b),
        _ => false,
    }
}

fn is_usable(reading: Option<Reading>) -> bool {
    reading.is_some_and(Reading::is_valid)
}

/// Compare two rounds and fold what agrees into `hybrid`
///
/// Returns `true` when every slot of `earlier` and `later` agrees. Otherwise the
/// agreeing slots of `earlier` are copied into `hybrid`. An RX slot where only
/// one side is usable, seen before any other disagreement, nominates that
/// side's readings of the path for the hybrid instead of counting as a
/// disagreement.
#[must_use]
pub fn similarity_cmp(
    earlier: &CalibrationRound,
    later: &CalibrationRound,
    hybrid: &mut CalibrationRound,
) -> bool {
    let mut mismatch = [[false; 2]; MAX_RF_PATHS];
    let mut any_mismatch = false;
    let mut nominee: [Option<&CalibrationRound>; MAX_RF_PATHS] = [None; MAX_RF_PATHS];

    for (p, (a, b)) in earlier.paths.iter().zip(later.paths.iter()).enumerate() {
        for (s, which) in [Slot::Tx, Slot::Rx].into_iter().enumerate() {
            let (ra, rb) = (slot(a, which), slot(b, which));
            if slots_agree(ra, rb) {
                continue;
            }

            if which == Slot::Rx && !any_mismatch && is_usable(ra) != is_usable(rb) {
                nominee[p] = Some(if is_usable(ra) { earlier } else { later });
            } else {
                mismatch[p][s] = true;
                any_mismatch = true;
            }
        }
    }

    if any_mismatch {
        for (p, flags) in mismatch.iter().enumerate() {
            for (s, which) in [Slot::Tx, Slot::Rx].into_iter().enumerate() {
                if !flags[s] {
                    *slot_mut(&mut hybrid.paths[p], which) = slot(&earlier.paths[p], which);
                }
            }
        }
        return false;
    }

    let mut similar = true;
    for (p, round) in nominee.iter().enumerate() {
        if let Some(round) = round {
            hybrid.paths[p] = round.paths[p];
            similar = false;
        }
    }
    similar
}

/// Round chosen to program the correction matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Candidate {
    /// A measured round (0, 1 or 2)
    Round(u8),
    /// The synthesized hybrid round
    Hybrid,
}

/// Everything one calibration run measured and decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationOutcome {
    /// Whether correction matrices were written
    pub applied: bool,
    /// Round the matrices were taken from
    pub final_candidate: Option<Candidate>,
    /// Measured rounds; rounds skipped after an early agreement are `None`
    pub rounds: [Option<CalibrationRound>; IQK_ROUNDS],
    /// Hybrid round built from agreeing slots
    pub hybrid: CalibrationRound,
}

impl CalibrationOutcome {
    /// Readings of the final candidate
    #[must_use]
    pub fn selected(&self) -> Option<&CalibrationRound> {
        match self.final_candidate? {
            Candidate::Round(r) => self.rounds.get(usize::from(r))?.as_ref(),
            Candidate::Hybrid => Some(&self.hybrid),
        }
    }
}

/// Incremental cross-round vote
///
/// Rounds are pushed in order; after each push from the second one on, the new
/// round is compared against every earlier round and the first agreeing pair
/// decides.
#[derive(Debug, Clone, Default)]
pub struct CandidateSelector {
    rounds: [Option<CalibrationRound>; IQK_ROUNDS],
    hybrid: CalibrationRound,
    count: usize,
    chosen: Option<Candidate>,
}

impl CandidateSelector {
    /// Create an empty selector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next round; returns the candidate once two rounds agree
    pub fn push(&mut self, round: CalibrationRound) -> Option<Candidate> {
        if self.chosen.is_some() || self.count >= IQK_ROUNDS {
            return self.chosen;
        }

        let r = self.count;
        self.rounds[r] = Some(round);
        self.count += 1;

        for j in 0..r {
            if let Some(earlier) = self.rounds[j] {
                if similarity_cmp(&earlier, &round, &mut self.hybrid) {
                    #[allow(clippy::cast_possible_truncation)]
                    let chosen = Candidate::Round(j as u8);
                    self.chosen = Some(chosen);
                    return self.chosen;
                }
            }
        }
        None
    }

    /// Close the vote, falling back to the hybrid round when it is non-zero
    #[must_use]
    pub fn finish(self) -> (Option<Candidate>, [Option<CalibrationRound>; IQK_ROUNDS], CalibrationRound) {
        let candidate = self
            .chosen
            .or_else(|| (self.hybrid.raw_sum() != 0).then_some(Candidate::Hybrid));
        (candidate, self.rounds, self.hybrid)
    }
}

/// Select the final candidate from a complete set of rounds
///
/// Convenience wrapper over [`CandidateSelector`] for already measured data.
#[must_use]
pub fn select_candidate(rounds: &[CalibrationRound]) -> (Option<Candidate>, CalibrationRound) {
    let mut selector = CandidateSelector::new();
    for round in rounds.iter().take(IQK_ROUNDS) {
        if selector.push(*round).is_some() {
            break;
        }
    }
    let (candidate, _, hybrid) = selector.finish();
    (candidate, hybrid)
}

/// Run `attempt` up to `retries` times, stopping at the first valid reading
///
/// Bus errors abort immediately. When every attempt fails the result is
/// [`Reading::Failed`].
///
/// # Errors
///
/// Returns the first error produced by `attempt`.
pub fn retry_measurement<E, F>(retries: u8, mut attempt: F) -> Result<Reading, E>
where
    F: FnMut(u8) -> Result<Reading, E>,
{
    for n in 0..retries {
        let reading = attempt(n)?;
        if reading.is_valid() {
            return Ok(reading);
        }
    }
    Ok(Reading::Failed)
}

/// Long-lived IQ calibration state
///
/// Holds the TX readings of the last successful calibration. Power tracking
/// reuses them to rebuild the TX matrix around a new swing without measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationState {
    /// TX reading per path; [`Reading::Failed`] stands for unity correction
    pub tx: [Reading; MAX_RF_PATHS],
    /// Set by the first successful calibration, never cleared afterwards
    pub done: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            tx: [Reading::Failed; MAX_RF_PATHS],
            done: false,
        }
    }
}

impl CalibrationState {
    /// TX correction of `path` as a canonical pair, unity when not measured
    #[must_use]
    pub const fn tx_correction(&self, path: RfPath) -> Correlation {
        let (x, y) = self.tx[path.index()].raw();
        Correlation::from_raw(x, y)
    }
}
