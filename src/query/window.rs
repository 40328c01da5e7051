use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::date_util::{last_day_of_month, prev_month};
use crate::error::{Error, Result};

static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());

/// A reporting time window over order date keys.
///
/// Windows always carry their reference date explicitly (a `Rolling`
/// window pins its `as_of`), so the same window value produces the same
/// range no matter when it is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// One calendar day.
    Day(NaiveDate),
    /// A calendar month: the 1st through the last day.
    Month(i32, u8),
    /// The n days ending at the given date, both endpoints inclusive.
    Rolling(u32, NaiveDate),
}

impl Window {
    /// Parse a window string relative to `today`.
    ///
    /// Supported formats:
    /// - `today`, `yesterday`
    /// - `mtd` — the current calendar month
    /// - `7d`, `30d`, `90d`, ... — rolling last N days ending today
    /// - `2025-08-04` — a specific day
    /// - `2025-08` — a specific month
    pub fn parse(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "today" => return Ok(Window::Day(today)),
            "yesterday" => return Ok(Window::Day(today - Duration::days(1))),
            "mtd" => return Ok(Window::Month(today.year(), today.month() as u8)),
            _ => {}
        }

        // Rolling: "30d", "7d", etc.
        if s.ends_with('d') || s.ends_with('D') {
            if let Ok(n) = s[..s.len() - 1].parse::<u32>() {
                if n == 0 {
                    return Err(Error::WindowParse("rolling window of 0 days".into()));
                }
                return Ok(Window::Rolling(n, today));
            }
        }

        // Day: "2025-08-04"
        if let Some(caps) = RE_DAY.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u32 = caps[2].parse().unwrap();
            let day: u32 = caps[3].parse().unwrap();
            if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                return Ok(Window::Day(d));
            }
        }

        // Month: "2025-08"
        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u8 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Window::Month(year, month));
            }
        }

        Err(Error::WindowParse(format!("unrecognized window: {s}")))
    }

    /// The calendar month containing the given date.
    pub fn month_of(d: NaiveDate) -> Self {
        Window::Month(d.year(), d.month() as u8)
    }

    /// Get the date range (inclusive start, inclusive end) for this window.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        match self {
            Window::Day(d) => (*d, *d),
            Window::Month(y, m) => (
                NaiveDate::from_ymd_opt(*y, *m as u32, 1).unwrap(),
                last_day_of_month(*y, *m as u32),
            ),
            Window::Rolling(n, as_of) => (*as_of - Duration::days(*n as i64 - 1), *as_of),
        }
    }

    /// Get the preceding window of the same type: the prior day, the prior
    /// calendar month, or the n-day block ending just before this one.
    pub fn previous(&self) -> Self {
        match self {
            Window::Day(d) => Window::Day(*d - Duration::days(1)),
            Window::Month(y, m) => {
                let (py, pm) = prev_month(*y, *m as u32);
                Window::Month(py, pm as u8)
            }
            Window::Rolling(n, as_of) => Window::Rolling(*n, *as_of - Duration::days(*n as i64)),
        }
    }

    /// Whether the given date falls inside this window.
    pub fn contains(&self, d: NaiveDate) -> bool {
        let (start, end) = self.date_range();
        d >= start && d <= end
    }

    /// Convert to a canonical key string for labels and logs.
    pub fn to_key(&self) -> String {
        match self {
            Window::Day(d) => d.format("%Y-%m-%d").to_string(),
            Window::Month(y, m) => format!("{y}-{m:02}"),
            Window::Rolling(n, _) => format!("{n}d"),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
