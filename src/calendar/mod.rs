//! B3 trading calendar
//!
//! A business day is a weekday that is neither a national holiday, a São
//! Paulo state holiday nor an exchange-specific closure from configuration.

use crate::error::CalendarError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Search window when walking to the previous or next business day
pub const MAX_LOOKUP_DAYS: u32 = 30;

/// Distance after which the previous business day is suspicious
const LONG_GAP_DAYS: i64 = 5;

/// Fixed-date holidays as (month, day)
const FIXED_HOLIDAYS: [(u32, u32); 10] = [
    (1, 1),   // Confraternização Universal
    (4, 21),  // Tiradentes
    (5, 1),   // Dia do Trabalho
    (7, 9),   // Revolução Constitucionalista (SP)
    (9, 7),   // Independência
    (10, 12), // Nossa Senhora Aparecida
    (11, 2),  // Finados
    (11, 15), // Proclamação da República
    (11, 20), // Consciência Negra
    (12, 25), // Natal
];

#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    extra_holidays: BTreeSet<NaiveDate>,
}

impl BusinessCalendar {
    pub fn new(extra_holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        let extra_holidays: BTreeSet<NaiveDate> = extra_holidays.into_iter().collect();
        debug!(count = extra_holidays.len(), "Loaded {} exchange-specific holidays", extra_holidays.len());
        Self { extra_holidays }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if FIXED_HOLIDAYS.contains(&(date.month(), date.day())) {
            return true;
        }
        if movable_holidays(date.year()).contains(&date) {
            return true;
        }
        self.extra_holidays.contains(&date)
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Latest business day strictly before `reference`
    pub fn last_business_day(&self, reference: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let found = self.walk(reference, -1)?;
        let days_back = (reference - found).num_days();
        info!(
            reference = %reference,
            date = %found,
            "Last business day before {}: {} ({})",
            reference,
            found,
            found.format("%A, %d/%m/%Y")
        );
        if days_back > LONG_GAP_DAYS {
            warn!(
                days_back,
                "Last business day is {} days back; long holiday or calendar problem",
                days_back
            );
        }
        Ok(found)
    }

    /// Earliest business day strictly after `reference`
    pub fn next_business_day(&self, reference: NaiveDate) -> Result<NaiveDate, CalendarError> {
        self.walk(reference, 1)
    }

    /// Business days in `[start, end]`, zero when `start > end`
    pub fn count_business_days(&self, start: NaiveDate, end: NaiveDate) -> usize {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_business_day(*d))
            .count()
    }

    fn walk(&self, reference: NaiveDate, step: i64) -> Result<NaiveDate, CalendarError> {
        let mut current = reference;
        for _ in 0..MAX_LOOKUP_DAYS {
            current += Duration::days(step);
            if self.is_business_day(current) {
                return Ok(current);
            }
        }
        Err(CalendarError::NoBusinessDay {
            reference,
            days: MAX_LOOKUP_DAYS,
        })
    }
}

/// Easter Sunday (Gregorian, anonymous algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Carnival Monday and Tuesday, Good Friday, Corpus Christi
fn movable_holidays(year: i32) -> Vec<NaiveDate> {
    let Some(easter) = easter_sunday(year) else {
        return Vec::new();
    };
    [-48, -47, -2, 60]
        .into_iter()
        .map(|offset| easter + Duration::days(offset))
        .collect()
}
