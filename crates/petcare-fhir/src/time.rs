//! Display-time normalization.
//!
//! Appointments are booked against 12-hour display times ("10:00 AM") but
//! stored and compared in 24-hour form ("10:00").

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};

use crate::{FhirError, FhirResult};

/// Convert `"h:mm AM|PM"` to `"HH:MM"`.
///
/// 12 AM is midnight (`00`), 12 PM is noon (`12`), any other PM hour adds 12.
pub fn to_24_hour(display: &str) -> FhirResult<String> {
    let malformed = || FhirError::MalformedInput(format!("invalid 12-hour time '{display}'"));

    let (clock, modifier) = display.trim().split_once(' ').ok_or_else(malformed)?;
    let (hour, minute) = clock.split_once(':').ok_or_else(malformed)?;

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(hour) || hour.len() > 2 || !digits(minute) || minute.len() != 2 {
        return Err(malformed());
    }
    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let minute: u32 = minute.parse().map_err(|_| malformed())?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(malformed());
    }

    let hour = match modifier.trim().to_ascii_uppercase().as_str() {
        "AM" if hour == 12 => 0,
        "AM" => hour,
        "PM" if hour == 12 => 12,
        "PM" => hour + 12,
        _ => return Err(malformed()),
    };

    Ok(format!("{hour:02}:{minute:02}"))
}

/// Format a wall-clock time as `"h:mm AM|PM"`.
pub fn to_12_hour(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!("{}:{:02} {}", hour, time.minute(), if pm { "PM" } else { "AM" })
}

/// Parse `"HH:MM"`.
pub fn parse_24_hour(time: &str) -> FhirResult<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| FhirError::MalformedInput(format!("invalid 24-hour time '{time}'")))
}

/// English day name for a calendar date.
pub fn day_of_week(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
