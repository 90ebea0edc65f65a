//! Calendar registers and their once-a-second increment.

use serde::{Deserialize, Serialize};

use crate::RtcError;

pub(crate) const SECONDS: usize = 0;
pub(crate) const MINUTES: usize = 1;
pub(crate) const HOURS: usize = 2;
pub(crate) const DATE: usize = 3;
pub(crate) const MONTH: usize = 4;
pub(crate) const DAY: usize = 5;
pub(crate) const YEAR: usize = 6;
pub(crate) const CONTROL: usize = 7;
pub(crate) const TRICKLE: usize = 8;

/// Seconds register: clock halt.
pub(crate) const CH: u8 = 0x80;
/// Hours register: 12-hour mode.
pub(crate) const HOUR_12: u8 = 0x80;
/// Hours register in 12-hour mode: PM.
pub(crate) const HOUR_PM: u8 = 0x20;
/// Control register: write protect.
pub(crate) const WP: u8 = 0x80;

/// A calendar time in plain decimal, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcTime {
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub date: u8,
    /// Day of week, 1-7.
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl Default for RtcTime {
    fn default() -> Self {
        // Saturday 1 January 2000.
        Self {
            year: 0,
            month: 1,
            date: 1,
            day: 7,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

impl RtcTime {
    pub(crate) fn validate(&self) -> Result<(), RtcError> {
        let check = |field: &'static str, value: u8, min: u8, max: u8| {
            if (min..=max).contains(&value) {
                Ok(())
            } else {
                Err(RtcError::InvalidTime { field, value })
            }
        };
        check("year", self.year, 0, 99)?;
        check("month", self.month, 1, 12)?;
        check("date", self.date, 1, days_in_month(self.month, self.year))?;
        check("day", self.day, 1, 7)?;
        check("hours", self.hours, 0, 23)?;
        check("minutes", self.minutes, 0, 59)?;
        check("seconds", self.seconds, 0, 59)
    }

    /// Encode into the first seven clock registers, 24-hour mode.
    pub(crate) fn to_registers(self, halted: bool) -> [u8; 7] {
        let mut regs = [0; 7];
        regs[SECONDS] = to_bcd(self.seconds) | if halted { CH } else { 0 };
        regs[MINUTES] = to_bcd(self.minutes);
        regs[HOURS] = to_bcd(self.hours);
        regs[DATE] = to_bcd(self.date);
        regs[MONTH] = to_bcd(self.month);
        regs[DAY] = self.day;
        regs[YEAR] = to_bcd(self.year);
        regs
    }

    pub(crate) fn from_registers(regs: &[u8]) -> Self {
        let hours = if regs[HOURS] & HOUR_12 != 0 {
            let h12 = from_bcd(regs[HOURS] & 0x1F) % 12;
            if regs[HOURS] & HOUR_PM != 0 { h12 + 12 } else { h12 }
        } else {
            from_bcd(regs[HOURS] & 0x3F)
        };
        Self {
            year: from_bcd(regs[YEAR]),
            month: from_bcd(regs[MONTH] & 0x1F),
            date: from_bcd(regs[DATE] & 0x3F),
            day: regs[DAY] & 0x07,
            hours,
            minutes: from_bcd(regs[MINUTES] & 0x7F),
            seconds: from_bcd(regs[SECONDS] & 0x7F),
        }
    }
}

pub(crate) fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub(crate) fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// Years count from 2000, so every fourth is a leap year.
pub(crate) fn days_in_month(month: u8, year: u8) -> u8 {
    match month {
        2 if year % 4 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Add one second to the calendar registers, carrying up to the year.
/// Values outside their normal range (as written by software) carry
/// at the next increment.
pub(crate) fn tick_second(regs: &mut [u8]) {
    let seconds = from_bcd(regs[SECONDS] & 0x7F) + 1;
    if seconds < 60 {
        regs[SECONDS] = (regs[SECONDS] & CH) | to_bcd(seconds);
        return;
    }
    regs[SECONDS] &= CH;

    let minutes = from_bcd(regs[MINUTES] & 0x7F) + 1;
    if minutes < 60 {
        regs[MINUTES] = to_bcd(minutes);
        return;
    }
    regs[MINUTES] = 0;

    if !tick_hour(&mut regs[HOURS]) {
        return;
    }

    regs[DAY] = (regs[DAY] & 0x07) % 7 + 1;
    let year = from_bcd(regs[YEAR]);
    let month = from_bcd(regs[MONTH] & 0x1F);
    let date = from_bcd(regs[DATE] & 0x3F) + 1;
    if date <= days_in_month(month, year) {
        regs[DATE] = to_bcd(date);
        return;
    }
    regs[DATE] = 0x01;
    if month < 12 {
        regs[MONTH] = to_bcd(month + 1);
        return;
    }
    regs[MONTH] = 0x01;
    regs[YEAR] = to_bcd((year + 1) % 100);
}

/// Advance the hours register. Returns true when the day rolls over.
fn tick_hour(hours: &mut u8) -> bool {
    if *hours & HOUR_12 == 0 {
        let next = from_bcd(*hours & 0x3F) + 1;
        if next < 24 {
            *hours = to_bcd(next);
            false
        } else {
            *hours = 0;
            true
        }
    } else {
        let pm = *hours & HOUR_PM;
        match from_bcd(*hours & 0x1F) {
            11 => {
                *hours = HOUR_12 | (pm ^ HOUR_PM) | to_bcd(12);
                // 11 PM -> 12 AM starts a new day.
                pm != 0
            }
            12 => {
                *hours = HOUR_12 | pm | 0x01;
                false
            }
            h => {
                *hours = HOUR_12 | pm | to_bcd(h + 1);
                false
            }
        }
    }
}
