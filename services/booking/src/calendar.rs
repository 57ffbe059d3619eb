//! Slot calendar computations
//!
//! Pure functions over the calendar configuration, primetime windows, and
//! the active reservations of a date. No persistence of its own; callers
//! load state, this module decides. All interval logic is half-open:
//! `[start, end)`, so touching endpoints do not overlap.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{CalendarConfig, PrimeTimeWindow, ReservationKind};

/// An occupied interval on a date: the reservation's id and its bounds
pub type ReservedInterval = (Uuid, NaiveTime, NaiveTime);

/// Weekday index used by primetime windows: 0 = Monday .. 6 = Sunday
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

/// The active primetime window covering this date's weekday, if any
pub fn active_window_for<'a>(
    date: NaiveDate,
    windows: &'a [PrimeTimeWindow],
) -> Option<&'a PrimeTimeWindow> {
    let weekday = weekday_index(date);
    windows.iter().find(|w| w.is_active && w.weekday == weekday)
}

/// Classify a slot: primetime iff an active window for the weekday fully
/// contains `[start, end)`
pub fn classify_slot(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    windows: &[PrimeTimeWindow],
) -> ReservationKind {
    match active_window_for(date, windows) {
        Some(window) if start >= window.start_time && end <= window.end_time => {
            ReservationKind::Primetime
        }
        _ => ReservationKind::FreeForAll,
    }
}

/// Half-open interval overlap test against a set of existing intervals
///
/// `exclude` skips one reservation, used when re-checking an edited row
/// against its own date.
pub fn overlaps(
    start: NaiveTime,
    end: NaiveTime,
    existing: &[ReservedInterval],
    exclude: Option<Uuid>,
) -> bool {
    existing.iter().any(|(id, other_start, other_end)| {
        Some(*id) != exclude && start < *other_end && end > *other_start
    })
}

/// A fixed-length bookable slot within business hours
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub kind: ReservationKind,
    pub available: bool,
}

/// Tile the business hours of a date into fixed-length slots
///
/// The sequence is lazy, finite, and restartable; a trailing slot that
/// would run past the end of business hours is dropped. The bounds check
/// runs on whole minutes since midnight, not on clock times, so a long
/// slot duration can never wrap past midnight into an endless sequence.
/// Each slot is classified and marked unavailable when it overlaps a
/// reserved interval.
pub fn available_slots<'a>(
    date: NaiveDate,
    config: &'a CalendarConfig,
    windows: &'a [PrimeTimeWindow],
    reserved: &'a [ReservedInterval],
) -> impl Iterator<Item = Slot> + 'a {
    let step = config.slot_duration_minutes.max(1) as u32;
    let start_minute = config.business_start_time.num_seconds_from_midnight() / 60;
    let end_minute = config.business_end_time.num_seconds_from_midnight() / 60;
    let business_start = config.business_start_time;

    (0u32..)
        .map(move |i| i * step)
        .take_while(move |offset| start_minute + offset + step <= end_minute)
        .map(move |offset| {
            let slot_start = business_start + Duration::minutes(offset as i64);
            let slot_end = slot_start + Duration::minutes(step as i64);
            Slot {
                start_time: slot_start,
                end_time: slot_end,
                kind: classify_slot(date, slot_start, slot_end, windows),
                available: !overlaps(slot_start, slot_end, reserved, None),
            }
        })
}

/// Validate a requested slot before any write
pub fn validate_slot(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    config: &CalendarConfig,
    today: NaiveDate,
) -> Result<(), ApiError> {
    if start >= end {
        return Err(ApiError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }

    if start < config.business_start_time || end > config.business_end_time {
        return Err(ApiError::OutsideBusinessHours);
    }

    if date < today {
        return Err(ApiError::PastDate);
    }

    if !config.allow_same_day_booking && date == today {
        return Err(ApiError::Validation(
            "Same-day booking is not allowed".to_string(),
        ));
    }

    if config.max_advance_booking_days > 0
        && date > today + Duration::days(config.max_advance_booking_days as i64)
    {
        return Err(ApiError::TooFarInAdvance);
    }

    Ok(())
}
