//! Scalar and composite aggregates over the order and issue tables.
//!
//! Every operation here is a pure read: nothing mutates, every call is one
//! bounded round trip (composites batch their statements inside a single
//! reader call), and concurrent invocations need no coordination. Empty
//! inputs produce zeros, never NULLs.

pub mod change;
pub mod types;

pub use types::*;

use chrono::NaiveDate;

use crate::date_util::date_key;
use crate::error::Result;
use crate::model::Menu;
use crate::query::window::Window;
use crate::storage::Database;

fn range_keys(window: &Window) -> (String, String) {
    let (start, end) = window.date_range();
    (date_key(start), date_key(end))
}

/// Lifetime spend of one user, in paise.
pub async fn total_spent_by_user(db: &Database, user_id: &str) -> Result<i64> {
    let user_id = user_id.to_string();
    db.reader()
        .call(move |conn| sum_orders_sql(conn, Some(&user_id), None))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// One user's spend inside a window, in paise.
pub async fn spent_by_user_in(db: &Database, user_id: &str, window: &Window) -> Result<i64> {
    let user_id = user_id.to_string();
    let (start, end) = range_keys(window);
    db.reader()
        .call(move |conn| sum_orders_sql(conn, Some(&user_id), Some((&start, &end))))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// Global order amount inside a window, in paise.
pub async fn order_total_in(db: &Database, window: &Window) -> Result<i64> {
    let (start, end) = range_keys(window);
    db.reader()
        .call(move |conn| sum_orders_sql(conn, None, Some((&start, &end))))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// Number of distinct users who ordered inside a window.
pub async fn unique_diners_in(db: &Database, window: &Window) -> Result<u64> {
    let (start, end) = range_keys(window);
    db.reader()
        .call(move |conn| unique_diners_sql(conn, &start, &end))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// Issues currently in the Open state, across all users.
pub async fn open_issue_count(db: &Database) -> Result<u64> {
    db.reader()
        .call(|conn| open_issues_sql(conn))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// All issues ever reported by one user, regardless of state.
pub async fn issue_count_by_user(db: &Database, user_id: &str) -> Result<u64> {
    let user_id = user_id.to_string();
    db.reader()
        .call(move |conn| issues_by_user_sql(conn, &user_id))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// The menu item with the highest summed order amount for one user.
/// Grouped sums, not order counts: two ₹10 orders of A lose to one ₹30
/// order of B. Equal sums resolve to the lowest menu id. `None` when the
/// user has no orders.
pub async fn most_ordered_item(db: &Database, user_id: &str) -> Result<Option<Menu>> {
    let user_id = user_id.to_string();
    db.reader()
        .call(move |conn| most_ordered_sql(conn, &user_id))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// Compute the full set of student dashboard cards in one reader call.
pub async fn student_dashboard(
    db: &Database,
    user_id: &str,
    as_of: NaiveDate,
) -> Result<StudentDashboard> {
    let user_id = user_id.to_string();
    let month = Window::month_of(as_of);
    let month_key = month.to_key();
    let (ms, me) = range_keys(&month);
    let (ps, pe) = range_keys(&month.previous());

    db.reader()
        .call(move |conn| {
            let total_spent = sum_orders_sql(conn, Some(&user_id), None)?;
            let month_spent = sum_orders_sql(conn, Some(&user_id), Some((&ms, &me)))?;
            let prev_spent = sum_orders_sql(conn, Some(&user_id), Some((&ps, &pe)))?;
            let most_ordered = most_ordered_sql(conn, &user_id)?;
            let issues_reported = issues_by_user_sql(conn, &user_id)?;

            Ok::<StudentDashboard, rusqlite::Error>(StudentDashboard {
                user_id,
                month_key,
                total_spent_paise: total_spent,
                month_spent_paise: month_spent,
                monthly_change_pct: change::change_percent(prev_spent, month_spent),
                most_ordered,
                issues_reported,
            })
        })
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

/// Compute the full set of admin dashboard cards in one reader call.
pub async fn admin_dashboard(db: &Database, as_of: NaiveDate) -> Result<AdminDashboard> {
    let day = Window::Day(as_of);
    let day_key = day.to_key();
    let (ds, de) = range_keys(&day);
    let (ys, ye) = range_keys(&day.previous());
    let month = Window::month_of(as_of);
    let month_key = month.to_key();
    let (ms, me) = range_keys(&month);
    let (ps, pe) = range_keys(&month.previous());

    db.reader()
        .call(move |conn| {
            let today_total = sum_orders_sql(conn, None, Some((&ds, &de)))?;
            let yesterday_total = sum_orders_sql(conn, None, Some((&ys, &ye)))?;
            let month_total = sum_orders_sql(conn, None, Some((&ms, &me)))?;
            let prev_month_total = sum_orders_sql(conn, None, Some((&ps, &pe)))?;
            let unique_diners = unique_diners_sql(conn, &ds, &de)?;
            let open_issues = open_issues_sql(conn)?;

            Ok::<AdminDashboard, rusqlite::Error>(AdminDashboard {
                day_key,
                month_key,
                today_total_paise: today_total,
                daily_change_pct: change::change_percent(yesterday_total, today_total),
                month_total_paise: month_total,
                monthly_change_pct: change::change_percent(prev_month_total, month_total),
                unique_diners_today: unique_diners,
                open_issues,
            })
        })
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))
}

// ── Internal SQL helpers ───────────────────────────────────────────

fn sum_orders_sql(
    conn: &rusqlite::Connection,
    user_id: Option<&str>,
    range: Option<(&str, &str)>,
) -> std::result::Result<i64, rusqlite::Error> {
    let mut sql = String::from("SELECT COALESCE(SUM(total_amount_paise), 0) FROM orders");
    let mut wheres: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(uid) = user_id {
        wheres.push(format!("user_id = ?{}", params.len() + 1));
        params.push(Box::new(uid.to_string()));
    }
    if let Some((start, end)) = range {
        wheres.push(format!("order_date_key >= ?{}", params.len() + 1));
        params.push(Box::new(start.to_string()));
        wheres.push(format!("order_date_key <= ?{}", params.len() + 1));
        params.push(Box::new(end.to_string()));
    }
    if !wheres.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&wheres.join(" AND "));
    }

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
}

fn unique_diners_sql(
    conn: &rusqlite::Connection,
    start: &str,
    end: &str,
) -> std::result::Result<u64, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM orders
         WHERE order_date_key >= ?1 AND order_date_key <= ?2",
        rusqlite::params![start, end],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn open_issues_sql(conn: &rusqlite::Connection) -> std::result::Result<u64, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM issues WHERE status = 'Open'",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn issues_by_user_sql(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> std::result::Result<u64, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM issues WHERE user_id = ?1",
        rusqlite::params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn most_ordered_sql(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> std::result::Result<Option<Menu>, rusqlite::Error> {
    use rusqlite::OptionalExtension;

    conn.query_row(
        "SELECT m.menu_id, m.description, m.menu_type, m.meal_time, m.day,
                m.price_paise, m.image_url
         FROM orders o
         JOIN menus m ON m.menu_id = o.menu_id
         WHERE o.user_id = ?1
         GROUP BY m.menu_id
         ORDER BY SUM(o.total_amount_paise) DESC, m.menu_id ASC
         LIMIT 1",
        rusqlite::params![user_id],
        |row| {
            Ok(Menu {
                menu_id: row.get(0)?,
                description: row.get(1)?,
                menu_type: row.get(2)?,
                meal_time: row.get(3)?,
                day: row.get(4)?,
                price_paise: row.get(5)?,
                image_url: row.get(6)?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Issue, IssueStatus, MealTime, Menu, MenuDay, MenuType, Order, PaymentMethod,
    };
    use crate::storage::repository;
    use chrono::NaiveDateTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ts(y: i32, m: u32, day: u32, h: u32) -> NaiveDateTime {
        d(y, m, day).and_hms_opt(h, 0, 0).unwrap()
    }

    fn menu(id: &str, price_paise: i64, meal_time: MealTime) -> Menu {
        Menu {
            menu_id: id.into(),
            description: format!("menu {id}"),
            menu_type: MenuType::Veg,
            meal_time,
            day: MenuDay::Monday,
            price_paise,
            image_url: None,
        }
    }

    fn seed_order(
        conn: &rusqlite::Connection,
        id: &str,
        user: &str,
        menu: &Menu,
        qty: u32,
        when: NaiveDateTime,
    ) -> std::result::Result<(), rusqlite::Error> {
        repository::insert_order(
            conn,
            &Order::place(id, user, menu, qty, PaymentMethod::Online, None, when),
        )
    }

    #[tokio::test]
    async fn test_empty_store_yields_zeros() {
        let db = Database::open_memory().await.unwrap();
        let today = d(2025, 8, 6);

        assert_eq!(total_spent_by_user(&db, "u1").await.unwrap(), 0);
        assert_eq!(
            spent_by_user_in(&db, "u1", &Window::month_of(today))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            order_total_in(&db, &Window::Day(today)).await.unwrap(),
            0
        );
        assert_eq!(
            unique_diners_in(&db, &Window::Day(today)).await.unwrap(),
            0
        );
        assert_eq!(open_issue_count(&db).await.unwrap(), 0);
        assert_eq!(issue_count_by_user(&db, "u1").await.unwrap(), 0);
        assert!(most_ordered_item(&db, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_total_and_windowed_spend() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let dosa = menu("m1", 4000, MealTime::Breakfast);
                repository::upsert_menu(conn, &dosa)?;
                // July: 2 × 4000; August: 1 × 4000; another user in August
                seed_order(conn, "o1", "u1", &dosa, 1, ts(2025, 7, 10, 8))?;
                seed_order(conn, "o2", "u1", &dosa, 1, ts(2025, 7, 20, 8))?;
                seed_order(conn, "o3", "u1", &dosa, 1, ts(2025, 8, 2, 8))?;
                seed_order(conn, "o4", "u2", &dosa, 2, ts(2025, 8, 2, 9))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert_eq!(total_spent_by_user(&db, "u1").await.unwrap(), 12000);
        assert_eq!(
            spent_by_user_in(&db, "u1", &Window::Month(2025, 7))
                .await
                .unwrap(),
            8000
        );
        assert_eq!(
            spent_by_user_in(&db, "u1", &Window::Month(2025, 8))
                .await
                .unwrap(),
            4000
        );
        // Global totals include both users
        assert_eq!(
            order_total_in(&db, &Window::Month(2025, 8)).await.unwrap(),
            12000
        );
        assert_eq!(
            order_total_in(&db, &Window::Day(d(2025, 8, 2)))
                .await
                .unwrap(),
            12000
        );
        assert_eq!(
            unique_diners_in(&db, &Window::Day(d(2025, 8, 2)))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_most_ordered_uses_summed_amount_not_frequency() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                // A ordered twice at ₹10, B once at ₹30. B's sum (30) beats
                // A's (20) even though A is more frequent.
                let a = menu("ma", 1000, MealTime::Lunch);
                let b = menu("mb", 3000, MealTime::Dinner);
                repository::upsert_menu(conn, &a)?;
                repository::upsert_menu(conn, &b)?;
                seed_order(conn, "o1", "u1", &a, 1, ts(2025, 8, 1, 12))?;
                seed_order(conn, "o2", "u1", &a, 1, ts(2025, 8, 2, 12))?;
                seed_order(conn, "o3", "u1", &b, 1, ts(2025, 8, 3, 19))?;
                // Another user's orders must not leak in
                seed_order(conn, "o4", "u2", &a, 10, ts(2025, 8, 3, 12))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let best = most_ordered_item(&db, "u1").await.unwrap().unwrap();
        assert_eq!(best.menu_id, "mb");
    }

    #[tokio::test]
    async fn test_most_ordered_tie_breaks_to_lowest_menu_id() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let a = menu("m1", 2000, MealTime::Lunch);
                let b = menu("m2", 2000, MealTime::Dinner);
                repository::upsert_menu(conn, &a)?;
                repository::upsert_menu(conn, &b)?;
                seed_order(conn, "o1", "u1", &b, 1, ts(2025, 8, 1, 19))?;
                seed_order(conn, "o2", "u1", &a, 1, ts(2025, 8, 2, 12))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let best = most_ordered_item(&db, "u1").await.unwrap().unwrap();
        assert_eq!(best.menu_id, "m1");
    }

    #[tokio::test]
    async fn test_issue_counts() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                for (id, user, status) in [
                    ("i1", "u1", IssueStatus::Open),
                    ("i2", "u1", IssueStatus::Resolved),
                    ("i3", "u2", IssueStatus::Open),
                    ("i4", "u2", IssueStatus::Hold),
                ] {
                    repository::insert_issue(
                        conn,
                        &Issue {
                            issue_id: id.into(),
                            user_id: user.into(),
                            title: "t".into(),
                            description: "d".into(),
                            image_url: None,
                            status,
                        },
                    )?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert_eq!(open_issue_count(&db).await.unwrap(), 2);
        assert_eq!(issue_count_by_user(&db, "u1").await.unwrap(), 2);
        assert_eq!(issue_count_by_user(&db, "u3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_monthly_change_for_user_end_to_end() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                // ₹100 in July, ₹150 in August → +50%
                let thali = menu("m1", 5000, MealTime::Lunch);
                repository::upsert_menu(conn, &thali)?;
                seed_order(conn, "o1", "u1", &thali, 2, ts(2025, 7, 15, 13))?;
                seed_order(conn, "o2", "u1", &thali, 3, ts(2025, 8, 3, 13))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let pct = change::monthly_change_for_user(&db, "u1", d(2025, 8, 6))
            .await
            .unwrap();
        assert_eq!(pct, 50.0);
    }

    #[tokio::test]
    async fn test_daily_change_with_zero_yesterday() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let snack = menu("m1", 50, MealTime::Snacks);
                repository::upsert_menu(conn, &snack)?;
                seed_order(conn, "o1", "u1", &snack, 1, ts(2025, 8, 6, 16))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        // Yesterday's total is 0, so the substituted denominator applies:
        // (50 - 0) / 1 * 100 = 5000.
        let pct = change::daily_change(&db, d(2025, 8, 6)).await.unwrap();
        assert_eq!(pct, 5000.0);
    }

    #[tokio::test]
    async fn test_student_dashboard_composite() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let dosa = menu("m1", 4000, MealTime::Breakfast);
                repository::upsert_menu(conn, &dosa)?;
                seed_order(conn, "o1", "u1", &dosa, 1, ts(2025, 7, 10, 8))?;
                seed_order(conn, "o2", "u1", &dosa, 2, ts(2025, 8, 2, 8))?;
                repository::insert_issue(
                    conn,
                    &Issue {
                        issue_id: "i1".into(),
                        user_id: "u1".into(),
                        title: "t".into(),
                        description: "d".into(),
                        image_url: None,
                        status: IssueStatus::Open,
                    },
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let dash = student_dashboard(&db, "u1", d(2025, 8, 6)).await.unwrap();
        assert_eq!(dash.month_key, "2025-08");
        assert_eq!(dash.total_spent_paise, 12000);
        assert_eq!(dash.month_spent_paise, 8000);
        assert_eq!(dash.monthly_change_pct, 100.0);
        assert_eq!(dash.most_ordered.unwrap().menu_id, "m1");
        assert_eq!(dash.issues_reported, 1);
    }

    #[tokio::test]
    async fn test_admin_dashboard_composite() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let dosa = menu("m1", 4000, MealTime::Breakfast);
                repository::upsert_menu(conn, &dosa)?;
                seed_order(conn, "o1", "u1", &dosa, 1, ts(2025, 8, 5, 8))?;
                seed_order(conn, "o2", "u1", &dosa, 1, ts(2025, 8, 6, 8))?;
                seed_order(conn, "o3", "u2", &dosa, 2, ts(2025, 8, 6, 9))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let dash = admin_dashboard(&db, d(2025, 8, 6)).await.unwrap();
        assert_eq!(dash.day_key, "2025-08-06");
        assert_eq!(dash.today_total_paise, 12000);
        // Yesterday 4000 → today 12000 is +200%
        assert_eq!(dash.daily_change_pct, 200.0);
        assert_eq!(dash.month_total_paise, 16000);
        // No July orders: substituted denominator
        assert_eq!(dash.monthly_change_pct, 1600000.0);
        assert_eq!(dash.unique_diners_today, 2);
        assert_eq!(dash.open_issues, 0);
    }
}
