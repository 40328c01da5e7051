//! Plain-connection CRUD for the warehouse tables. Every function takes a
//! `&Connection` and runs inside a `tokio_rusqlite` call on the owning
//! side; nothing here touches the clock or ambient state.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::date_util::date_key;
use crate::model::{Issue, Menu, Notice, Order, TIMESTAMP_FMT};

fn format_ts(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FMT).to_string()
}

fn parse_ts(idx: usize, s: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ── Menus ──────────────────────────────────────────────────────────

pub fn upsert_menu(conn: &Connection, menu: &Menu) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO menus (menu_id, description, menu_type, meal_time, day, price_paise, image_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(menu_id) DO UPDATE SET
             description=excluded.description, menu_type=excluded.menu_type,
             meal_time=excluded.meal_time, day=excluded.day,
             price_paise=excluded.price_paise, image_url=excluded.image_url,
             updated_at=datetime('now', 'localtime')",
        params![
            menu.menu_id,
            menu.description,
            menu.menu_type,
            menu.meal_time,
            menu.day,
            menu.price_paise,
            menu.image_url,
        ],
    )?;
    Ok(())
}

pub fn delete_menu(conn: &Connection, menu_id: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM menus WHERE menu_id = ?1", params![menu_id])?;
    Ok(n > 0)
}

fn menu_from_row(row: &rusqlite::Row<'_>) -> Result<Menu, rusqlite::Error> {
    Ok(Menu {
        menu_id: row.get(0)?,
        description: row.get(1)?,
        menu_type: row.get(2)?,
        meal_time: row.get(3)?,
        day: row.get(4)?,
        price_paise: row.get(5)?,
        image_url: row.get(6)?,
    })
}

const MENU_COLS: &str = "menu_id, description, menu_type, meal_time, day, price_paise, image_url";

pub fn get_menu(conn: &Connection, menu_id: &str) -> Result<Option<Menu>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {MENU_COLS} FROM menus WHERE menu_id = ?1"),
        params![menu_id],
        menu_from_row,
    )
    .optional()
}

pub fn list_menus(conn: &Connection) -> Result<Vec<Menu>, rusqlite::Error> {
    let mut stmt =
        conn.prepare(&format!("SELECT {MENU_COLS} FROM menus ORDER BY created_at ASC"))?;
    let rows = stmt.query_map([], menu_from_row)?;
    rows.collect()
}

// ── Orders ─────────────────────────────────────────────────────────

/// Insert a new order. The date key is derived from `order_time` here,
/// once; windowed queries and the analytics series only ever compare keys.
pub fn insert_order(conn: &Connection, order: &Order) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO orders (
            order_id, user_id, menu_id, order_time, order_date_key, quantity,
            special_request, status, payment_status, payment_method, total_amount_paise
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            order.order_id,
            order.user_id,
            order.menu_id,
            format_ts(order.order_time),
            date_key(order.order_time.date()),
            order.quantity,
            order.special_request,
            order.status,
            order.payment_status,
            order.payment_method,
            order.total_amount_paise,
        ],
    )?;
    Ok(())
}

/// Overwrite the mutable fields of an order in place. Orders are never
/// versioned; the previous state is gone after this.
pub fn update_order(conn: &Connection, order: &Order) -> Result<bool, rusqlite::Error> {
    let n = conn.execute(
        "UPDATE orders SET quantity = ?2, total_amount_paise = ?3, status = ?4,
             payment_status = ?5, payment_method = ?6, special_request = ?7
         WHERE order_id = ?1",
        params![
            order.order_id,
            order.quantity,
            order.total_amount_paise,
            order.status,
            order.payment_status,
            order.payment_method,
            order.special_request,
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_order(conn: &Connection, order_id: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM orders WHERE order_id = ?1", params![order_id])?;
    Ok(n > 0)
}

pub fn get_order(conn: &Connection, order_id: &str) -> Result<Option<Order>, rusqlite::Error> {
    conn.query_row(
        "SELECT order_id, user_id, menu_id, order_time, quantity, special_request,
                status, payment_status, payment_method, total_amount_paise
         FROM orders WHERE order_id = ?1",
        params![order_id],
        |row| {
            let ts: String = row.get(3)?;
            Ok(Order {
                order_id: row.get(0)?,
                user_id: row.get(1)?,
                menu_id: row.get(2)?,
                order_time: parse_ts(3, &ts)?,
                quantity: row.get(4)?,
                special_request: row.get(5)?,
                status: row.get(6)?,
                payment_status: row.get(7)?,
                payment_method: row.get(8)?,
                total_amount_paise: row.get(9)?,
            })
        },
    )
    .optional()
}

// ── Notices ────────────────────────────────────────────────────────

pub fn insert_notice(conn: &Connection, notice: &Notice) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO notices (notice_id, title, content, image_url, posted_by, posted_at, valid_until)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notice.notice_id,
            notice.title,
            notice.content,
            notice.image_url,
            notice.posted_by,
            format_ts(notice.posted_at),
            notice.valid_until.map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn update_notice(conn: &Connection, notice: &Notice) -> Result<bool, rusqlite::Error> {
    let n = conn.execute(
        "UPDATE notices SET title = ?2, content = ?3, image_url = ?4, posted_by = ?5,
             valid_until = ?6
         WHERE notice_id = ?1",
        params![
            notice.notice_id,
            notice.title,
            notice.content,
            notice.image_url,
            notice.posted_by,
            notice.valid_until.map(format_ts),
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_notice(conn: &Connection, notice_id: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute(
        "DELETE FROM notices WHERE notice_id = ?1",
        params![notice_id],
    )?;
    Ok(n > 0)
}

/// Notices still valid at `now`: no expiry, or expiry in the future.
pub fn list_active_notices(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<Vec<Notice>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT notice_id, title, content, image_url, posted_by, posted_at, valid_until
         FROM notices
         WHERE valid_until IS NULL OR valid_until > ?1
         ORDER BY posted_at DESC",
    )?;
    let rows = stmt.query_map(params![format_ts(now)], |row| {
        let posted: String = row.get(5)?;
        let valid: Option<String> = row.get(6)?;
        Ok(Notice {
            notice_id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            image_url: row.get(3)?,
            posted_by: row.get(4)?,
            posted_at: parse_ts(5, &posted)?,
            valid_until: match valid {
                Some(v) => Some(parse_ts(6, &v)?),
                None => None,
            },
        })
    })?;
    rows.collect()
}

// ── Issues ─────────────────────────────────────────────────────────

pub fn insert_issue(conn: &Connection, issue: &Issue) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO issues (issue_id, user_id, title, description, image_url, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            issue.issue_id,
            issue.user_id,
            issue.title,
            issue.description,
            issue.image_url,
            issue.status,
        ],
    )?;
    Ok(())
}

pub fn update_issue(conn: &Connection, issue: &Issue) -> Result<bool, rusqlite::Error> {
    let n = conn.execute(
        "UPDATE issues SET user_id = ?2, title = ?3, description = ?4, image_url = ?5,
             status = ?6, updated_at = datetime('now', 'localtime')
         WHERE issue_id = ?1",
        params![
            issue.issue_id,
            issue.user_id,
            issue.title,
            issue.description,
            issue.image_url,
            issue.status,
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_issue(conn: &Connection, issue_id: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM issues WHERE issue_id = ?1", params![issue_id])?;
    Ok(n > 0)
}

pub fn get_issue(conn: &Connection, issue_id: &str) -> Result<Option<Issue>, rusqlite::Error> {
    conn.query_row(
        "SELECT issue_id, user_id, title, description, image_url, status
         FROM issues WHERE issue_id = ?1",
        params![issue_id],
        |row| {
            Ok(Issue {
                issue_id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                image_url: row.get(4)?,
                status: row.get(5)?,
            })
        },
    )
    .optional()
}

pub fn list_issues(conn: &Connection) -> Result<Vec<Issue>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT issue_id, user_id, title, description, image_url, status
         FROM issues ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Issue {
            issue_id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            image_url: row.get(4)?,
            status: row.get(5)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now', 'localtime'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
