use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Timestamp format used everywhere in the store: hostel-local naive time.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Declare a category enum whose variants round-trip through a fixed
/// string form in serde, SQLite, and `FromStr`. The string form is the
/// canonical one stored in the database and shown in the CLI.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!(
                        "unknown {}: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|e: Error| {
                    rusqlite::types::FromSqlError::Other(e.to_string().into())
                })
            }
        }
    };
}

str_enum! {
    /// Dietary category of a menu item.
    MenuType {
        Veg => "Veg",
        NonVeg => "Non-veg",
        Jain => "Jain",
    }
}

str_enum! {
    /// Meal slot a menu item is served in. Also the bucketing axis for the
    /// order analytics series.
    MealTime {
        Breakfast => "Breakfast",
        Lunch => "Lunch",
        Snacks => "Snacks",
        Dinner => "Dinner",
    }
}

str_enum! {
    /// Day of week a menu item is offered on.
    MenuDay {
        Monday => "Monday",
        Tuesday => "Tuesday",
        Wednesday => "Wednesday",
        Thursday => "Thursday",
        Friday => "Friday",
        Saturday => "Saturday",
        Sunday => "Sunday",
    }
}

str_enum! {
    /// Fulfilment state of an order. Admin-mutated; students only create.
    OrderStatus {
        Pending => "Pending",
        Confirmed => "Confirmed",
        Delivered => "Delivered",
        Cancelled => "Cancelled",
    }
}

str_enum! {
    PaymentStatus {
        Paid => "Paid",
        Unpaid => "Unpaid",
        Refunded => "Refunded",
    }
}

str_enum! {
    PaymentMethod {
        Cash => "Cash",
        Card => "Card",
        Online => "Online",
    }
}

str_enum! {
    IssueStatus {
        Open => "Open",
        Resolved => "Resolved",
        Progress => "Progress",
        Hold => "Hold",
    }
}

/// A menu item. Prices are stored in paise so that sums stay exact
/// integer arithmetic all the way through the metrics layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub menu_id: String,
    pub description: String,
    pub menu_type: MenuType,
    pub meal_time: MealTime,
    pub day: MenuDay,
    pub price_paise: i64,
    pub image_url: Option<String>,
}

/// A placed order. `total_amount_paise` is fixed at creation as
/// `price × quantity`; the reporting layer never recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub menu_id: String,
    pub order_time: NaiveDateTime,
    pub quantity: u32,
    pub special_request: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount_paise: i64,
}

impl Order {
    /// Build a fresh order for `menu` in the state a student submission
    /// produces: Pending, Unpaid, amount derived from the menu price.
    pub fn place(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        menu: &Menu,
        quantity: u32,
        payment_method: PaymentMethod,
        special_request: Option<String>,
        order_time: NaiveDateTime,
    ) -> Self {
        Order {
            order_id: order_id.into(),
            user_id: user_id.into(),
            menu_id: menu.menu_id.clone(),
            order_time,
            quantity,
            special_request,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method,
            total_amount_paise: menu.price_paise * i64::from(quantity),
        }
    }
}

/// A notice on the mess notice board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub notice_id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub posted_by: String,
    pub posted_at: NaiveDateTime,
    pub valid_until: Option<NaiveDateTime>,
}

/// A reported issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub status: IssueStatus,
}

/// Format paise as a rupee string for terminal output, e.g. `₹123.50`.
pub fn format_inr(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.abs();
    format!("{sign}₹{}.{:02}", abs / 100, abs % 100)
}
