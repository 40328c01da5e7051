//! UI-facing reporting surface.
//!
//! Every function here returns the same envelope shape regardless of the
//! metric behind it. There is exactly one failure mode at this layer —
//! data-access failure — and it is handled uniformly: log it, report
//! `success = false`, and hand back a zeroed/empty `data` value so numeric
//! consumers never see a null. A dashboard rendering these envelopes
//! degrades to "no data" instead of crashing.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{self, DailyMealCounts, TimeRange};
use crate::error::Result;
use crate::metrics::{self, change, AdminDashboard, StudentDashboard};
use crate::model::Menu;
use crate::query::window::Window;
use crate::storage::Database;

/// Upper bound on any single envelope call's data access. The underlying
/// queries are single round trips; anything slower than this means the
/// store is wedged and the caller should get its fallback value now.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Uniform response wrapper for the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Envelope {
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl<T: Default> Envelope<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Envelope {
            success: false,
            message: message.into(),
            data: T::default(),
        }
    }
}

async fn run<T, F>(what: &str, fut: F) -> Envelope<T>
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(Ok(data)) => Envelope::success(format!("{what} fetched successfully"), data),
        Ok(Err(e)) => {
            log::error!("{what} query failed: {e}");
            Envelope::failure(format!("Failed to fetch {what}"))
        }
        Err(_) => {
            log::error!("{what} query timed out after {QUERY_TIMEOUT:?}");
            Envelope::failure(format!("Failed to fetch {what}"))
        }
    }
}

// ── Student cards ──────────────────────────────────────────────────

pub async fn total_amount_spent(db: &Database, user_id: &str) -> Envelope<i64> {
    run("total spent", metrics::total_spent_by_user(db, user_id)).await
}

pub async fn monthly_amount_spent(
    db: &Database,
    user_id: &str,
    as_of: NaiveDate,
) -> Envelope<i64> {
    let month = Window::month_of(as_of);
    run("monthly spend", metrics::spent_by_user_in(db, user_id, &month)).await
}

pub async fn monthly_change_percent_for_user(
    db: &Database,
    user_id: &str,
    as_of: NaiveDate,
) -> Envelope<f64> {
    run(
        "monthly change",
        change::monthly_change_for_user(db, user_id, as_of),
    )
    .await
}

pub async fn most_ordered_item(db: &Database, user_id: &str) -> Envelope<Option<Menu>> {
    run("most ordered item", metrics::most_ordered_item(db, user_id)).await
}

pub async fn issues_count(db: &Database, user_id: &str) -> Envelope<u64> {
    run("issues count", metrics::issue_count_by_user(db, user_id)).await
}

/// All student cards in one call.
pub async fn student_cards(
    db: &Database,
    user_id: &str,
    as_of: NaiveDate,
) -> Envelope<StudentDashboard> {
    run(
        "student dashboard",
        metrics::student_dashboard(db, user_id, as_of),
    )
    .await
}

// ── Admin cards ────────────────────────────────────────────────────

pub async fn todays_orders(db: &Database, as_of: NaiveDate) -> Envelope<i64> {
    run(
        "today's orders",
        metrics::order_total_in(db, &Window::Day(as_of)),
    )
    .await
}

pub async fn monthly_orders(db: &Database, as_of: NaiveDate) -> Envelope<i64> {
    run(
        "monthly orders",
        metrics::order_total_in(db, &Window::month_of(as_of)),
    )
    .await
}

pub async fn daily_change_percent(db: &Database, as_of: NaiveDate) -> Envelope<f64> {
    run("daily change", change::daily_change(db, as_of)).await
}

pub async fn monthly_change_percent(db: &Database, as_of: NaiveDate) -> Envelope<f64> {
    run("monthly change", change::monthly_change(db, as_of)).await
}

pub async fn todays_unique_diners(db: &Database, as_of: NaiveDate) -> Envelope<u64> {
    run(
        "unique diners",
        metrics::unique_diners_in(db, &Window::Day(as_of)),
    )
    .await
}

pub async fn open_issues_count(db: &Database) -> Envelope<u64> {
    run("open issues", metrics::open_issue_count(db)).await
}

/// All admin cards in one call.
pub async fn admin_cards(db: &Database, as_of: NaiveDate) -> Envelope<AdminDashboard> {
    run("admin dashboard", metrics::admin_dashboard(db, as_of)).await
}

// ── Chart series ───────────────────────────────────────────────────

/// The dense daily meal series for the analytics chart. A bad range string
/// or a failed fetch both degrade to an empty series.
pub async fn order_series(
    db: &Database,
    user_id: Option<&str>,
    range: &str,
    as_of: NaiveDate,
) -> Envelope<Vec<DailyMealCounts>> {
    let range = match TimeRange::parse(range) {
        Ok(r) => r,
        Err(e) => {
            log::error!("order series rejected: {e}");
            return Envelope::failure(e.to_string());
        }
    };
    run(
        "order series",
        analytics::meal_series(db, user_id, range, as_of),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MealTime, MenuDay, MenuType, Order, PaymentMethod};
    use crate::storage::repository;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_succeeds_with_zeros() {
        let db = Database::open_memory().await.unwrap();
        let as_of = d(2025, 8, 6);

        let total = total_amount_spent(&db, "u1").await;
        assert!(total.success);
        assert_eq!(total.data, 0);

        let change = monthly_change_percent_for_user(&db, "u1", as_of).await;
        assert!(change.success);
        assert_eq!(change.data, 0.0);

        let best = most_ordered_item(&db, "u1").await;
        assert!(best.success);
        assert!(best.data.is_none());

        let cards = admin_cards(&db, as_of).await;
        assert!(cards.success);
        assert_eq!(cards.data.today_total_paise, 0);
        assert_eq!(cards.data.unique_diners_today, 0);
    }

    #[tokio::test]
    async fn test_order_series_rejects_bad_range_with_empty_data() {
        let db = Database::open_memory().await.unwrap();
        let env = order_series(&db, None, "14d", d(2025, 8, 6)).await;
        assert!(!env.success);
        assert!(env.data.is_empty());
        assert!(env.message.contains("14d"));
    }

    #[tokio::test]
    async fn test_order_series_success_is_dense() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let menu = Menu {
                    menu_id: "m1".into(),
                    description: "Poha".into(),
                    menu_type: MenuType::Veg,
                    meal_time: MealTime::Breakfast,
                    day: MenuDay::Tuesday,
                    price_paise: 2000,
                    image_url: None,
                };
                repository::upsert_menu(conn, &menu)?;
                repository::insert_order(
                    conn,
                    &Order::place(
                        "o1",
                        "u1",
                        &menu,
                        1,
                        PaymentMethod::Cash,
                        None,
                        d(2025, 8, 5).and_hms_opt(8, 0, 0).unwrap(),
                    ),
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let env = order_series(&db, None, "7d", d(2025, 8, 6)).await;
        assert!(env.success);
        assert_eq!(env.data.len(), 7);
        assert_eq!(
            env.data.iter().map(|b| b.total()).sum::<u32>(),
            1
        );
    }

    #[tokio::test]
    async fn test_student_cards_envelope() {
        let db = Database::open_memory().await.unwrap();
        let env = student_cards(&db, "u1", d(2025, 8, 6)).await;
        assert!(env.success);
        assert_eq!(env.data.user_id, "u1");
        assert_eq!(env.data.total_spent_paise, 0);
        assert_eq!(env.data.month_key, "2025-08");
    }
}
