//! Unit tests for the B3 trading calendar

use chrono::NaiveDate;
use optrix::calendar::{easter_sunday, BusinessCalendar};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn test_easter_dates() {
    assert_eq!(easter_sunday(2024), Some(d(2024, 3, 31)));
    assert_eq!(easter_sunday(2025), Some(d(2025, 4, 20)));
    assert_eq!(easter_sunday(2026), Some(d(2026, 4, 5)));
}

#[test]
fn test_movable_holidays_2024() {
    let calendar = BusinessCalendar::default();
    // Carnival, Good Friday, Corpus Christi
    for date in [d(2024, 2, 12), d(2024, 2, 13), d(2024, 3, 29), d(2024, 5, 30)] {
        assert!(calendar.is_holiday(date), "{} should be a holiday", date);
        assert!(!calendar.is_business_day(date));
    }
}

#[test]
fn test_fixed_holidays() {
    let calendar = BusinessCalendar::default();
    assert!(calendar.is_holiday(d(2024, 1, 1)));
    assert!(calendar.is_holiday(d(2024, 7, 9)));
    assert!(calendar.is_holiday(d(2024, 11, 20)));
    assert!(!calendar.is_holiday(d(2024, 1, 10)));
}

#[test]
fn test_weekends_are_not_business_days() {
    let calendar = BusinessCalendar::default();
    assert!(!calendar.is_business_day(d(2024, 1, 13)));
    assert!(!calendar.is_business_day(d(2024, 1, 14)));
    assert!(calendar.is_business_day(d(2024, 1, 15)));
}

#[test]
fn test_last_business_day_skips_weekend() {
    let calendar = BusinessCalendar::default();
    assert_eq!(calendar.last_business_day(d(2024, 1, 15)).unwrap(), d(2024, 1, 12));
    assert_eq!(calendar.last_business_day(d(2024, 1, 11)).unwrap(), d(2024, 1, 10));
}

#[test]
fn test_last_business_day_skips_new_year() {
    let calendar = BusinessCalendar::default();
    assert_eq!(calendar.last_business_day(d(2024, 1, 2)).unwrap(), d(2023, 12, 29));
}

#[test]
fn test_configured_holidays_are_honoured() {
    let calendar = BusinessCalendar::new([d(2024, 12, 24), d(2024, 12, 31)]);
    assert!(calendar.is_holiday(d(2024, 12, 24)));
    assert_eq!(calendar.last_business_day(d(2024, 12, 26)).unwrap(), d(2024, 12, 23));
}

#[test]
fn test_next_business_day_skips_carnival() {
    let calendar = BusinessCalendar::default();
    assert_eq!(calendar.next_business_day(d(2024, 2, 9)).unwrap(), d(2024, 2, 14));
}

#[test]
fn test_count_business_days() {
    let calendar = BusinessCalendar::default();
    assert_eq!(calendar.count_business_days(d(2024, 1, 8), d(2024, 1, 12)), 5);
    assert_eq!(calendar.count_business_days(d(2024, 1, 8), d(2024, 1, 14)), 5);
    assert_eq!(calendar.count_business_days(d(2024, 2, 12), d(2024, 2, 16)), 3);
    assert_eq!(calendar.count_business_days(d(2024, 1, 12), d(2024, 1, 8)), 0);
}
