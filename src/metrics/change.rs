//! Period-over-period change for the dashboard trend badges.

use chrono::NaiveDate;

use crate::error::Result;
use crate::query::window::Window;
use crate::storage::Database;

/// Percentage change from `previous` to `current`.
///
/// When the previous total is exactly zero the denominator is substituted
/// with 1 instead of reporting an undefined ratio, so a jump from 0 to 50
/// reads as +5000%. Downstream display assumes a finite number; keep this
/// substitution intact. Output is signed and unclamped; rounding to one
/// decimal is the presentation layer's job.
pub fn change_percent(previous: i64, current: i64) -> f64 {
    let denominator = if previous == 0 { 1 } else { previous };
    (current - previous) as f64 / denominator as f64 * 100.0
}

/// Today's global order total vs. yesterday's.
pub async fn daily_change(db: &Database, as_of: NaiveDate) -> Result<f64> {
    let today = Window::Day(as_of);
    let current = super::order_total_in(db, &today).await?;
    let previous = super::order_total_in(db, &today.previous()).await?;
    Ok(change_percent(previous, current))
}

/// This calendar month's global order total vs. the previous month's.
pub async fn monthly_change(db: &Database, as_of: NaiveDate) -> Result<f64> {
    let month = Window::month_of(as_of);
    let current = super::order_total_in(db, &month).await?;
    let previous = super::order_total_in(db, &month.previous()).await?;
    Ok(change_percent(previous, current))
}

/// One user's spend this calendar month vs. the previous month.
pub async fn monthly_change_for_user(
    db: &Database,
    user_id: &str,
    as_of: NaiveDate,
) -> Result<f64> {
    let month = Window::month_of(as_of);
    let current = super::spent_by_user_in(db, user_id, &month).await?;
    let previous = super::spent_by_user_in(db, user_id, &month.previous()).await?;
    Ok(change_percent(previous, current))
}
