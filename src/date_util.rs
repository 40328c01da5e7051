use chrono::{Datelike, Duration, NaiveDate};

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap() - Duration::days(1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap() - Duration::days(1)
    }
}

/// Get the (year, month) pair preceding the given one.
pub fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Format a date as a `YYYY-MM-DD` date key, the form stored in
/// `orders.order_date_key` and compared in windowed queries.
pub fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` date key back into a date.
pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2025, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert_eq!(
            last_day_of_month(2025, 2),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        ); // Leap year
        assert_eq!(
            last_day_of_month(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_prev_month() {
        assert_eq!(prev_month(2025, 6), (2025, 5));
        assert_eq!(prev_month(2025, 1), (2024, 12));
    }

    #[test]
    fn test_date_key_round_trip() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 6).unwrap();
        assert_eq!(date_key(d), "2025-08-06");
        assert_eq!(parse_date_key("2025-08-06"), Some(d));
        assert_eq!(parse_date_key("garbage"), None);
    }
}
