use serde::Serialize;

use crate::model::Menu;

/// Card metrics backing a student's dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentDashboard {
    pub user_id: String,
    /// Calendar month the monthly figures cover, e.g. `2025-08`.
    pub month_key: String,
    pub total_spent_paise: i64,
    pub month_spent_paise: i64,
    /// Spend change vs. the previous calendar month, unclamped percent.
    pub monthly_change_pct: f64,
    /// The menu item with the highest summed order amount for this user,
    /// absent when the user has never ordered.
    pub most_ordered: Option<Menu>,
    pub issues_reported: u64,
}

/// Card metrics backing the admin dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminDashboard {
    /// Day the daily figures cover, e.g. `2025-08-06`.
    pub day_key: String,
    pub month_key: String,
    pub today_total_paise: i64,
    /// Order-amount change vs. yesterday, unclamped percent.
    pub daily_change_pct: f64,
    pub month_total_paise: i64,
    pub monthly_change_pct: f64,
    pub unique_diners_today: u64,
    pub open_issues: u64,
}
