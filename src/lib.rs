pub mod analytics;
pub mod clock;
pub mod dashboard;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod model;
pub mod query;
pub mod storage;

pub use analytics::{DailyMealCounts, TimeRange};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dashboard::Envelope;
pub use error::{Error, Result};
pub use metrics::{AdminDashboard, StudentDashboard};
pub use model::{
    Issue, IssueStatus, MealTime, Menu, MenuDay, MenuType, Notice, Order, OrderStatus,
    PaymentMethod, PaymentStatus,
};
pub use query::builder::{OrderQuery, OrderRow};
pub use query::window::Window;
pub use storage::Database;

use std::sync::Arc;

use storage::repository;

/// Main entry point for the mess warehouse.
///
/// Owns the database handle and the clock that anchors every
/// time-relative query; callers pass user ids explicitly, so there is no
/// ambient session state anywhere below this point.
pub struct MessDW {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl MessDW {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The reference date all "today"/"this month" queries resolve against.
    pub fn today(&self) -> chrono::NaiveDate {
        self.clock.today()
    }

    pub fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    // ── Dashboards ─────────────────────────────────────────────────

    pub async fn student_cards(&self, user_id: &str) -> Envelope<StudentDashboard> {
        dashboard::student_cards(&self.db, user_id, self.clock.today()).await
    }

    pub async fn admin_cards(&self) -> Envelope<AdminDashboard> {
        dashboard::admin_cards(&self.db, self.clock.today()).await
    }

    pub async fn order_series(
        &self,
        user_id: Option<&str>,
        range: &str,
    ) -> Envelope<Vec<DailyMealCounts>> {
        dashboard::order_series(&self.db, user_id, range, self.clock.today()).await
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
