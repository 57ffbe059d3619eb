//! Calendar configuration and primetime windows

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Admin-configured premium window, at most one per weekday (0 = Monday)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimeTimeWindow {
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

/// Global calendar settings, a single enforced-uniqueness row in storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub business_start_time: NaiveTime,
    pub business_end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub max_advance_booking_days: i32,
    pub allow_same_day_booking: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            business_start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            business_end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            max_advance_booking_days: 30,
            allow_same_day_booking: true,
        }
    }
}
