use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::model::{MealTime, MenuDay, MenuType, OrderStatus, PaymentMethod, PaymentStatus};
use crate::query::window::Window;
use crate::storage::Database;

/// A row from an order query: the order joined with its menu item.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    pub order_id: String,
    pub user_id: String,
    pub menu_id: String,
    pub order_date: NaiveDate,
    pub order_time: String,
    pub quantity: u32,
    pub total_amount_paise: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub special_request: Option<String>,
    pub description: String,
    pub menu_type: MenuType,
    pub meal_time: MealTime,
    pub day: MenuDay,
}

/// Builder for constructing order queries with optional filters.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    user_id: Option<String>,
    menu_id: Option<String>,
    status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
    meal_time: Option<MealTime>,
    ordered_after: Option<NaiveDate>,
    ordered_before: Option<NaiveDate>,
    limit: Option<u32>,
    order_by: Option<String>,
    order_desc: bool,
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn menu(mut self, menu_id: &str) -> Self {
        self.menu_id = Some(menu_id.to_string());
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn meal_time(mut self, meal_time: MealTime) -> Self {
        self.meal_time = Some(meal_time);
        self
    }

    pub fn ordered_after(mut self, date: NaiveDate) -> Self {
        self.ordered_after = Some(date);
        self
    }

    pub fn ordered_before(mut self, date: NaiveDate) -> Self {
        self.ordered_before = Some(date);
        self
    }

    /// Restrict to orders whose date key falls inside the window.
    pub fn in_window(self, window: &Window) -> Self {
        let (start, end) = window.date_range();
        self.ordered_after(start).ordered_before(end)
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    pub fn descending(mut self) -> Self {
        self.order_desc = true;
        self
    }

    /// Build and execute the query, returning joined order rows.
    pub async fn rows(self, db: &Database) -> Result<Vec<OrderRow>> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (sql, params) = builder.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(param_refs.as_slice(), |row| {
                    let key: String = row.get(3)?;
                    let order_date = crate::date_util::parse_date_key(&key).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            format!("bad date key: {key}").into(),
                        )
                    })?;
                    Ok(OrderRow {
                        order_id: row.get(0)?,
                        user_id: row.get(1)?,
                        menu_id: row.get(2)?,
                        order_date,
                        order_time: row.get(4)?,
                        quantity: row.get(5)?,
                        total_amount_paise: row.get(6)?,
                        status: row.get(7)?,
                        payment_status: row.get(8)?,
                        payment_method: row.get(9)?,
                        special_request: row.get(10)?,
                        description: row.get(11)?,
                        menu_type: row.get(12)?,
                        meal_time: row.get(13)?,
                        day: row.get(14)?,
                    })
                })?;
                let result: std::result::Result<Vec<OrderRow>, _> = rows.collect();
                result
            })
            .await
            .map_err(|e| crate::error::Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning a count of matching orders.
    pub async fn count(self, db: &Database) -> Result<u64> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (inner_sql, params) = builder.build_sql();
                let sql = format!("SELECT COUNT(*) FROM ({inner_sql})");
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
                Ok::<u64, rusqlite::Error>(count as u64)
            })
            .await
            .map_err(|e| crate::error::Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning results as JSON.
    pub async fn to_json(self, db: &Database) -> Result<String> {
        let rows = self.rows(db).await?;
        serde_json::to_string_pretty(&rows).map_err(|e| crate::error::Error::Other(e.to_string()))
    }

    /// Build and execute the query, returning results as CSV.
    pub async fn to_csv(self, db: &Database) -> Result<String> {
        let rows = self.rows(db).await?;
        let mut out = String::new();
        out.push_str("order_id,user_id,menu_id,order_date,order_time,quantity,total_amount_paise,status,payment_status,payment_method,special_request,description,menu_type,meal_time,day\n");
        for row in &rows {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                csv_escape(&row.order_id),
                csv_escape(&row.user_id),
                csv_escape(&row.menu_id),
                row.order_date,
                csv_escape(&row.order_time),
                row.quantity,
                row.total_amount_paise,
                row.status,
                row.payment_status,
                row.payment_method,
                csv_escape(row.special_request.as_deref().unwrap_or("")),
                csv_escape(&row.description),
                row.menu_type,
                row.meal_time,
                row.day,
            ));
        }
        Ok(out)
    }

    fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        let select = "SELECT o.order_id, o.user_id, o.menu_id, o.order_date_key, o.order_time,
                o.quantity, o.total_amount_paise, o.status, o.payment_status, o.payment_method,
                o.special_request, m.description, m.menu_type, m.meal_time, m.day
            FROM orders o
            JOIN menus m ON m.menu_id = o.menu_id";

        if let Some(ref user_id) = self.user_id {
            wheres.push(format!("o.user_id = ?{param_idx}"));
            params.push(Box::new(user_id.clone()));
            param_idx += 1;
        }
        if let Some(ref menu_id) = self.menu_id {
            wheres.push(format!("o.menu_id = ?{param_idx}"));
            params.push(Box::new(menu_id.clone()));
            param_idx += 1;
        }
        if let Some(status) = self.status {
            wheres.push(format!("o.status = ?{param_idx}"));
            params.push(Box::new(status));
            param_idx += 1;
        }
        if let Some(payment_status) = self.payment_status {
            wheres.push(format!("o.payment_status = ?{param_idx}"));
            params.push(Box::new(payment_status));
            param_idx += 1;
        }
        if let Some(meal_time) = self.meal_time {
            wheres.push(format!("m.meal_time = ?{param_idx}"));
            params.push(Box::new(meal_time));
            param_idx += 1;
        }
        // Date keys sort lexicographically, so string comparison is range
        // comparison.
        if let Some(date) = self.ordered_after {
            wheres.push(format!("o.order_date_key >= ?{param_idx}"));
            params.push(Box::new(date.format("%Y-%m-%d").to_string()));
            param_idx += 1;
        }
        if let Some(date) = self.ordered_before {
            wheres.push(format!("o.order_date_key <= ?{param_idx}"));
            params.push(Box::new(date.format("%Y-%m-%d").to_string()));
            param_idx += 1;
        }

        let mut sql = select.to_string();
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }

        let order_field = self.order_by.as_deref().unwrap_or("o.order_time");
        let order_dir = if self.order_desc { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {order_field} {order_dir}"));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT ?{param_idx}"));
            params.push(Box::new(limit));
        }

        (sql, params)
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
