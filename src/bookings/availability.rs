use std::fmt;

use chrono::NaiveTime;

use crate::bookings::models::minutes;
use crate::errors::ServiceError;

/// mandatory gap between two bookings on the same ground, in minutes
pub const BUFFER_MINUTES: i32 = 15;

/// A time range within a single day, in minutes since midnight.
///
/// The range is half open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: i32,
    pub end: i32,
}

impl Slot {
    pub fn new(start: i32, end: i32) -> Self {
        Slot { start, end }
    }

    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Self {
        Slot::new(minutes(start), minutes(end))
    }

    pub fn duration(&self) -> i32 {
        self.end - self.start
    }

    /// widen the slot on both sides
    pub fn padded(&self, buffer: i32) -> Self {
        Slot::new(self.start - buffer, self.end + buffer)
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} - {:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// Outcome of an availability check for one ground on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    /// the first existing booking the candidate collides with
    pub conflicting_range: Option<Slot>,
}

impl Availability {
    pub fn message(&self) -> String {
        match self.conflicting_range {
            None => "Time slot is available!".to_string(),
            Some(slot) => conflict_message(&slot),
        }
    }
}

fn conflict_message(slot: &Slot) -> String {
    format!(
        "Time slot conflicts with existing booking ({}). Please allow {} minutes buffer between bookings.",
        slot, BUFFER_MINUTES
    )
}

/// Returns the first existing slot that the candidate collides with.
///
/// `existing` has to contain every non-cancelled booking of the ground on that day.
/// Every existing booking is padded with the buffer, the candidate conflicts
/// when it intersects a padded booking. This covers a candidate starting or
/// ending too close to a booking as well as a candidate containing it.
pub fn find_conflict(existing: &[Slot], candidate: &Slot) -> Option<Slot> {
    existing
        .iter()
        .find(|booked| booked.padded(BUFFER_MINUTES).overlaps(candidate))
        .copied()
}

pub fn check(existing: &[Slot], candidate: &Slot) -> Availability {
    let conflicting_range = find_conflict(existing, candidate);

    Availability {
        available: conflicting_range.is_none(),
        conflicting_range,
    }
}

/// fails with a `SlotConflict` when the candidate can't be admitted
pub fn ensure_free(existing: &[Slot], candidate: &Slot) -> Result<(), ServiceError> {
    match find_conflict(existing, candidate) {
        Some(slot) => Err(ServiceError::SlotConflict(conflict_message(&slot))),
        None => Ok(()),
    }
}
