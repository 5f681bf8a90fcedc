//! Spreadsheet serial date-times: whole days since the legacy epoch plus a
//! fraction of a 24 hour day. No timezone is applied.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::models::cell::CellValue;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Converts a serial value into a calendar date-time. Serial `1.0` is
/// 1900-01-02 00:00:00. Returns `None` for non-finite or out of range input.
pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round();

    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(TimeDelta::try_days(days as i64)?)?
        .checked_add_signed(TimeDelta::try_seconds(seconds as i64)?)
}

/// Decodes a cell, numeric cells only. Text, booleans and blanks are absent.
pub fn from_cell(cell: &CellValue) -> Option<NaiveDateTime> {
    cell.as_number().and_then(from_serial)
}
