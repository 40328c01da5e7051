//! Chart-ready aggregation of order rows into a dense daily series
//! bucketed by meal time.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::MealTime;
use crate::query::builder::{OrderQuery, OrderRow};
use crate::query::window::Window;
use crate::storage::Database;

/// Range selector for the order analytics chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    Last90Days,
}

impl TimeRange {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "7d" => Ok(TimeRange::Last7Days),
            "30d" => Ok(TimeRange::Last30Days),
            "90d" => Ok(TimeRange::Last90Days),
            other => Err(Error::WindowParse(format!(
                "unrecognized range (expected 7d, 30d, or 90d): {other}"
            ))),
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            TimeRange::Last7Days => 7,
            TimeRange::Last30Days => 30,
            TimeRange::Last90Days => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
            TimeRange::Last90Days => "90d",
        }
    }

    /// The rolling window this range covers, ending at `as_of` inclusive.
    pub fn window(&self, as_of: NaiveDate) -> Window {
        Window::Rolling(self.days(), as_of)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day's order quantities per meal slot. Quantities, not amounts: the
/// chart counts plates served, the money metrics live in `metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyMealCounts {
    pub date: NaiveDate,
    pub breakfast: u32,
    pub lunch: u32,
    pub snacks: u32,
    pub dinner: u32,
}

impl DailyMealCounts {
    fn zero(date: NaiveDate) -> Self {
        DailyMealCounts {
            date,
            breakfast: 0,
            lunch: 0,
            snacks: 0,
            dinner: 0,
        }
    }

    fn add(&mut self, meal: MealTime, quantity: u32) {
        match meal {
            MealTime::Breakfast => self.breakfast += quantity,
            MealTime::Lunch => self.lunch += quantity,
            MealTime::Snacks => self.snacks += quantity,
            MealTime::Dinner => self.dinner += quantity,
        }
    }

    pub fn total(&self) -> u32 {
        self.breakfast + self.lunch + self.snacks + self.dinner
    }
}

/// Bucket order rows into a dense daily series over the range.
///
/// Every day in the window appears exactly once, zero-valued when nothing
/// was ordered; without the fill, empty days would vanish from the chart
/// axis. Rows dated outside the window are dropped. No status or payment
/// filtering happens here: a cancelled order still counts.
pub fn build_meal_series(
    rows: &[OrderRow],
    range: TimeRange,
    as_of: NaiveDate,
) -> Vec<DailyMealCounts> {
    let (start, end) = range.window(as_of).date_range();

    let mut buckets: BTreeMap<NaiveDate, DailyMealCounts> = BTreeMap::new();
    let mut day = start;
    while day <= end {
        buckets.insert(day, DailyMealCounts::zero(day));
        day += Duration::days(1);
    }

    for row in rows {
        if let Some(bucket) = buckets.get_mut(&row.order_date) {
            bucket.add(row.meal_time, row.quantity);
        }
    }

    // BTreeMap iteration is already ascending by date.
    buckets.into_values().collect()
}

/// Fetch the order⋈menu rows for the range (optionally one user's) and
/// build the series.
pub async fn meal_series(
    db: &Database,
    user_id: Option<&str>,
    range: TimeRange,
    as_of: NaiveDate,
) -> Result<Vec<DailyMealCounts>> {
    let mut query = OrderQuery::new().in_window(&range.window(as_of));
    if let Some(uid) = user_id {
        query = query.user(uid);
    }
    let rows = query.rows(db).await?;
    Ok(build_meal_series(&rows, range, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Menu, MenuDay, MenuType, Order, OrderStatus, PaymentMethod, PaymentStatus,
    };
    use crate::storage::{repository, Database};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(
        date: NaiveDate,
        meal_time: MealTime,
        quantity: u32,
        total_amount_paise: i64,
        status: OrderStatus,
    ) -> OrderRow {
        OrderRow {
            order_id: "o".into(),
            user_id: "u1".into(),
            menu_id: "m1".into(),
            order_date: date,
            order_time: format!("{date} 12:00:00"),
            quantity,
            total_amount_paise,
            status,
            payment_status: PaymentStatus::Unpaid,
            payment_method: PaymentMethod::Cash,
            special_request: None,
            description: "thali".into(),
            menu_type: MenuType::Veg,
            meal_time,
            day: MenuDay::Monday,
        }
    }

    #[test]
    fn test_parse_ranges() {
        assert_eq!(TimeRange::parse("7d").unwrap(), TimeRange::Last7Days);
        assert_eq!(TimeRange::parse("30d").unwrap(), TimeRange::Last30Days);
        assert_eq!(TimeRange::parse("90d").unwrap(), TimeRange::Last90Days);
        assert!(TimeRange::parse("14d").is_err());
        assert!(TimeRange::parse("").is_err());
    }

    #[test]
    fn test_zero_fill_produces_dense_series() {
        let as_of = d(2025, 8, 6);
        // Orders on only 2 of the 7 days
        let rows = vec![
            row(d(2025, 8, 1), MealTime::Lunch, 1, 5000, OrderStatus::Delivered),
            row(d(2025, 8, 6), MealTime::Dinner, 2, 9000, OrderStatus::Pending),
        ];
        let series = build_meal_series(&rows, TimeRange::Last7Days, as_of);

        assert_eq!(series.len(), 7);
        assert_eq!(series.first().unwrap().date, d(2025, 7, 31));
        assert_eq!(series.last().unwrap().date, d(2025, 8, 6));

        let empty_days = series.iter().filter(|b| b.total() == 0).count();
        assert_eq!(empty_days, 5);
        for bucket in &series {
            if bucket.total() == 0 {
                assert_eq!(bucket.breakfast, 0);
                assert_eq!(bucket.lunch, 0);
                assert_eq!(bucket.snacks, 0);
                assert_eq!(bucket.dinner, 0);
            }
        }
    }

    #[test]
    fn test_buckets_sum_quantity_not_amount() {
        let as_of = d(2025, 8, 6);
        // Same day and meal, different prices: 2 + 3 plates = 5
        let rows = vec![
            row(d(2025, 8, 5), MealTime::Lunch, 2, 10000, OrderStatus::Delivered),
            row(d(2025, 8, 5), MealTime::Lunch, 3, 450, OrderStatus::Delivered),
        ];
        let series = build_meal_series(&rows, TimeRange::Last7Days, as_of);
        let day = series.iter().find(|b| b.date == d(2025, 8, 5)).unwrap();
        assert_eq!(day.lunch, 5);
        assert_eq!(day.breakfast, 0);
    }

    #[test]
    fn test_cancelled_orders_still_count() {
        let as_of = d(2025, 8, 6);
        let rows = vec![row(
            d(2025, 8, 4),
            MealTime::Snacks,
            4,
            200,
            OrderStatus::Cancelled,
        )];
        let series = build_meal_series(&rows, TimeRange::Last7Days, as_of);
        let day = series.iter().find(|b| b.date == d(2025, 8, 4)).unwrap();
        assert_eq!(day.snacks, 4);
    }

    #[test]
    fn test_out_of_window_rows_dropped() {
        let as_of = d(2025, 8, 6);
        let rows = vec![
            row(d(2025, 7, 30), MealTime::Lunch, 9, 100, OrderStatus::Delivered),
            row(d(2025, 8, 7), MealTime::Lunch, 9, 100, OrderStatus::Delivered),
            row(d(2025, 8, 3), MealTime::Lunch, 1, 100, OrderStatus::Delivered),
        ];
        let series = build_meal_series(&rows, TimeRange::Last7Days, as_of);
        assert_eq!(series.len(), 7);
        let total: u32 = series.iter().map(|b| b.total()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_series_sorted_ascending() {
        let as_of = d(2025, 8, 6);
        let series = build_meal_series(&[], TimeRange::Last30Days, as_of);
        assert_eq!(series.len(), 30);
        for pair in series.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[tokio::test]
    async fn test_meal_series_from_store() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let dosa = Menu {
                    menu_id: "m1".into(),
                    description: "Masala dosa".into(),
                    menu_type: MenuType::Veg,
                    meal_time: MealTime::Breakfast,
                    day: MenuDay::Monday,
                    price_paise: 4000,
                    image_url: None,
                };
                repository::upsert_menu(conn, &dosa)?;
                let when = d(2025, 8, 4).and_hms_opt(8, 15, 0).unwrap();
                repository::insert_order(
                    conn,
                    &Order::place("o1", "u1", &dosa, 2, PaymentMethod::Cash, None, when),
                )?;
                repository::insert_order(
                    conn,
                    &Order::place("o2", "u2", &dosa, 1, PaymentMethod::Cash, None, when),
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let as_of = d(2025, 8, 6);
        let all = meal_series(&db, None, TimeRange::Last7Days, as_of)
            .await
            .unwrap();
        assert_eq!(all.len(), 7);
        let day = all.iter().find(|b| b.date == d(2025, 8, 4)).unwrap();
        assert_eq!(day.breakfast, 3);

        let mine = meal_series(&db, Some("u1"), TimeRange::Last7Days, as_of)
            .await
            .unwrap();
        let day = mine.iter().find(|b| b.date == d(2025, 8, 4)).unwrap();
        assert_eq!(day.breakfast, 2);
    }
}
