use chrono::{NaiveDate, NaiveDateTime};

/// Source of the current instant for window computation.
///
/// Every time-relative query ("today", "this month") resolves its reference
/// date through this trait, so tests can pin the calendar deterministically
/// instead of racing the wall clock.
pub trait Clock: Send + Sync {
    /// Current instant in the mess hall's local time.
    fn now(&self) -> NaiveDateTime;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Production clock backed by the system's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock frozen at a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_pins_today() {
        let instant = NaiveDate::from_ymd_opt(2025, 8, 6)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 8, 6).unwrap());
    }

    #[test]
    fn test_system_clock_is_consistent() {
        let clock = SystemClock;
        let today = clock.today();
        assert_eq!(today, clock.now().date());
    }
}
