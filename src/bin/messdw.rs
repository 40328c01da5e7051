use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};

use messdw::model::format_inr;
use messdw::storage::repository;
use messdw::{
    Clock, Database, Issue, IssueStatus, MealTime, Menu, MenuDay, MenuType, MessDW, Notice, Order,
    OrderQuery, OrderStatus, PaymentMethod, PaymentStatus, SystemClock, Window,
};

#[derive(Parser)]
#[command(name = "messdw", about = "Hostel mess warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.messdw/messdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage menu items
    Menu {
        #[command(subcommand)]
        action: MenuAction,
    },
    /// Place and manage orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Manage the notice board
    Notice {
        #[command(subcommand)]
        action: NoticeAction,
    },
    /// Report and manage issues
    Issue {
        #[command(subcommand)]
        action: IssueAction,
    },
    /// Show dashboard cards
    Dashboard {
        #[command(subcommand)]
        target: DashboardTarget,
    },
    /// Daily meal-count series for the analytics chart
    Series {
        /// Range: 7d, 30d, or 90d
        #[arg(long, default_value = "90d")]
        range: String,
        /// Restrict to one user's orders
        #[arg(long)]
        user: Option<String>,
        /// Reference date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum MenuAction {
    /// Add or replace a menu item
    Add {
        /// Dish description
        description: String,
        /// Type: Veg, Non-veg, or Jain
        #[arg(long, default_value = "Veg")]
        r#type: String,
        /// Meal: Breakfast, Lunch, Snacks, or Dinner
        #[arg(long)]
        meal: String,
        /// Day of week, e.g. Monday
        #[arg(long)]
        day: String,
        /// Price in rupees, e.g. 45.50
        #[arg(long)]
        price: String,
        /// Image URL
        #[arg(long)]
        image: Option<String>,
        /// Reuse an existing menu id instead of generating one
        #[arg(long)]
        id: Option<String>,
    },
    /// List menu items
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a menu item
    Remove { menu_id: String },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Place an order for a menu item
    Place {
        /// Ordering user id
        user_id: String,
        /// Menu item id
        menu_id: String,
        #[arg(long, default_value = "1")]
        quantity: u32,
        /// Payment method: Cash, Card, or Online
        #[arg(long, default_value = "Online")]
        method: String,
        /// Special request to the kitchen
        #[arg(long)]
        request: Option<String>,
    },
    /// List orders with filters
    List {
        /// Filter by user id
        #[arg(long)]
        user: Option<String>,
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Filter by meal time
        #[arg(long)]
        meal: Option<String>,
        /// Restrict to a window: today, yesterday, mtd, 7d, 2025-08, ...
        #[arg(long)]
        window: Option<String>,
        /// Maximum results
        #[arg(long, default_value = "100")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
        /// Count only (no output rows)
        #[arg(long)]
        count: bool,
    },
    /// Update an order's status, payment, or quantity
    Update {
        order_id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        payment_status: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
    },
    /// Delete an order
    Remove { order_id: String },
}

#[derive(Subcommand)]
enum NoticeAction {
    /// Post a notice
    Post {
        title: String,
        content: String,
        /// Name shown as the poster
        #[arg(long, default_value = "admin")]
        posted_by: String,
        /// Expiry (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS"); omit for no expiry
        #[arg(long)]
        valid_until: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// List currently valid notices
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a notice
    Remove { notice_id: String },
}

#[derive(Subcommand)]
enum IssueAction {
    /// Report a new issue
    Report {
        /// Reporting user id
        user_id: String,
        title: String,
        description: String,
        #[arg(long)]
        image: Option<String>,
    },
    /// List issues
    List {
        #[arg(long)]
        json: bool,
    },
    /// Set an issue's status: Open, Resolved, Progress, or Hold
    SetStatus { issue_id: String, status: String },
    /// Remove an issue
    Remove { issue_id: String },
}

#[derive(Subcommand)]
enum DashboardTarget {
    /// Cards for a student
    Student {
        user_id: String,
        /// Reference date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cards for the mess admin
    Admin {
        #[arg(long)]
        as_of: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

/// Parse a rupee amount ("45", "45.5", "45.50") into paise without going
/// through floating point.
fn parse_rupees(s: &str) -> anyhow::Result<i64> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("invalid amount: {s}");
    }
    let whole: i64 = whole
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid amount: {s}"))?;
    let mut paise = whole * 100;
    if !frac.is_empty() {
        let mut f: i64 = frac
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid amount: {s}"))?;
        if frac.len() == 1 {
            f *= 10;
        }
        paise += f;
    }
    Ok(paise)
}

fn parse_as_of(as_of: Option<&str>) -> anyhow::Result<NaiveDate> {
    match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("invalid date (expected YYYY-MM-DD): {s}")),
        None => Ok(SystemClock.today()),
    }
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_hms_opt(0, 0, 0).unwrap());
    }
    anyhow::bail!("invalid timestamp: {s}")
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => Database::open_at(path).await?,
        None => Database::open().await?,
    };

    match cli.command {
        Commands::Menu { action } => handle_menu(&db, action).await?,
        Commands::Order { action } => handle_order(&db, action).await?,
        Commands::Notice { action } => handle_notice(&db, action).await?,
        Commands::Issue { action } => handle_issue(&db, action).await?,
        Commands::Dashboard { target } => handle_dashboard(&db, target).await?,
        Commands::Series {
            range,
            user,
            as_of,
            json,
        } => handle_series(&db, &range, user.as_deref(), as_of.as_deref(), json).await?,
        Commands::Config { action } => {
            let dw = MessDW::new(db);
            handle_config(&dw, action).await?;
        }
        Commands::Status => print_status(&db).await?,
    }

    Ok(())
}

async fn handle_menu(db: &Database, action: MenuAction) -> anyhow::Result<()> {
    match action {
        MenuAction::Add {
            description,
            r#type,
            meal,
            day,
            price,
            image,
            id,
        } => {
            let menu = Menu {
                menu_id: id.unwrap_or_else(new_id),
                description,
                menu_type: r#type.parse::<MenuType>()?,
                meal_time: meal.parse::<MealTime>()?,
                day: day.parse::<MenuDay>()?,
                price_paise: parse_rupees(&price)?,
                image_url: image,
            };
            let menu_id = menu.menu_id.clone();
            db.writer()
                .call(move |conn| repository::upsert_menu(conn, &menu))
                .await?;
            println!("Added menu item: {menu_id}");
        }
        MenuAction::List { json } => {
            let menus = db.reader().call(|conn| repository::list_menus(conn)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&menus)?);
            } else if menus.is_empty() {
                println!("No menu items.");
            } else {
                for m in menus {
                    println!(
                        "{} {} {} {} {} {}",
                        m.menu_id,
                        m.day,
                        m.meal_time,
                        m.menu_type,
                        format_inr(m.price_paise),
                        m.description
                    );
                }
            }
        }
        MenuAction::Remove { menu_id } => {
            let id = menu_id.clone();
            let removed = db
                .writer()
                .call(move |conn| repository::delete_menu(conn, &id))
                .await?;
            if removed {
                println!("Removed: {menu_id}");
            } else {
                println!("Not found: {menu_id}");
            }
        }
    }
    Ok(())
}

async fn handle_order(db: &Database, action: OrderAction) -> anyhow::Result<()> {
    match action {
        OrderAction::Place {
            user_id,
            menu_id,
            quantity,
            method,
            request,
        } => {
            let method = method.parse::<PaymentMethod>()?;
            let now = SystemClock.now();
            let lookup_id = menu_id.clone();
            let menu = db
                .reader()
                .call(move |conn| repository::get_menu(conn, &lookup_id))
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such menu item: {menu_id}"))?;
            let order = Order::place(new_id(), user_id, &menu, quantity, method, request, now);
            let order_id = order.order_id.clone();
            let total = order.total_amount_paise;
            db.writer()
                .call(move |conn| repository::insert_order(conn, &order))
                .await?;
            println!("Placed order {order_id} for {}", format_inr(total));
        }
        OrderAction::List {
            user,
            status,
            meal,
            window,
            limit,
            json,
            csv,
            count,
        } => {
            let mut query = OrderQuery::new().limit(limit);
            if let Some(ref user) = user {
                query = query.user(user);
            }
            if let Some(ref status) = status {
                query = query.status(status.parse::<OrderStatus>()?);
            }
            if let Some(ref meal) = meal {
                query = query.meal_time(meal.parse::<MealTime>()?);
            }
            if let Some(ref window) = window {
                let w = Window::parse(window, SystemClock.today())?;
                query = query.in_window(&w);
            }
            if count {
                println!("{}", query.count(db).await?);
            } else if json {
                println!("{}", query.to_json(db).await?);
            } else if csv {
                print!("{}", query.to_csv(db).await?);
            } else {
                let rows = query.rows(db).await?;
                if rows.is_empty() {
                    println!("No orders.");
                }
                for r in rows {
                    println!(
                        "{} {} {} x{} {} {} {} {}",
                        r.order_id,
                        r.order_date,
                        r.meal_time,
                        r.quantity,
                        format_inr(r.total_amount_paise),
                        r.status,
                        r.payment_status,
                        r.description
                    );
                }
            }
        }
        OrderAction::Update {
            order_id,
            status,
            payment_status,
            quantity,
        } => {
            let lookup_id = order_id.clone();
            let mut order = db
                .reader()
                .call(move |conn| repository::get_order(conn, &lookup_id))
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such order: {order_id}"))?;
            if let Some(s) = status {
                order.status = s.parse::<OrderStatus>()?;
            }
            if let Some(p) = payment_status {
                order.payment_status = p.parse::<PaymentStatus>()?;
            }
            if let Some(q) = quantity {
                let menu_id = order.menu_id.clone();
                let menu = db
                    .reader()
                    .call(move |conn| repository::get_menu(conn, &menu_id))
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("menu item for order is gone"))?;
                order.quantity = q;
                order.total_amount_paise = menu.price_paise * i64::from(q);
            }
            db.writer()
                .call(move |conn| repository::update_order(conn, &order))
                .await?;
            println!("Order updated.");
        }
        OrderAction::Remove { order_id } => {
            let id = order_id.clone();
            let removed = db
                .writer()
                .call(move |conn| repository::delete_order(conn, &id))
                .await?;
            if removed {
                println!("Removed: {order_id}");
            } else {
                println!("Not found: {order_id}");
            }
        }
    }
    Ok(())
}

async fn handle_notice(db: &Database, action: NoticeAction) -> anyhow::Result<()> {
    match action {
        NoticeAction::Post {
            title,
            content,
            posted_by,
            valid_until,
            image,
        } => {
            let valid_until = valid_until.as_deref().map(parse_datetime).transpose()?;
            let notice = Notice {
                notice_id: new_id(),
                title,
                content,
                image_url: image,
                posted_by,
                posted_at: SystemClock.now(),
                valid_until,
            };
            let notice_id = notice.notice_id.clone();
            db.writer()
                .call(move |conn| repository::insert_notice(conn, &notice))
                .await?;
            println!("Posted notice: {notice_id}");
        }
        NoticeAction::List { json } => {
            let now = SystemClock.now();
            let notices = db
                .reader()
                .call(move |conn| repository::list_active_notices(conn, now))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&notices)?);
            } else if notices.is_empty() {
                println!("No active notices.");
            } else {
                for n in notices {
                    let until = n
                        .valid_until
                        .map(|v| format!(" (until {v})"))
                        .unwrap_or_default();
                    println!("{} [{}]{} {}", n.notice_id, n.posted_by, until, n.title);
                }
            }
        }
        NoticeAction::Remove { notice_id } => {
            let id = notice_id.clone();
            let removed = db
                .writer()
                .call(move |conn| repository::delete_notice(conn, &id))
                .await?;
            if removed {
                println!("Removed: {notice_id}");
            } else {
                println!("Not found: {notice_id}");
            }
        }
    }
    Ok(())
}

async fn handle_issue(db: &Database, action: IssueAction) -> anyhow::Result<()> {
    match action {
        IssueAction::Report {
            user_id,
            title,
            description,
            image,
        } => {
            let issue = Issue {
                issue_id: new_id(),
                user_id,
                title,
                description,
                image_url: image,
                status: IssueStatus::Open,
            };
            let issue_id = issue.issue_id.clone();
            db.writer()
                .call(move |conn| repository::insert_issue(conn, &issue))
                .await?;
            println!("Reported issue: {issue_id}");
        }
        IssueAction::List { json } => {
            let issues = db.reader().call(|conn| repository::list_issues(conn)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("No issues.");
            } else {
                for i in issues {
                    println!("{} [{}] {} — {}", i.issue_id, i.status, i.user_id, i.title);
                }
            }
        }
        IssueAction::SetStatus { issue_id, status } => {
            let status = status.parse::<IssueStatus>()?;
            let lookup_id = issue_id.clone();
            let mut issue = db
                .reader()
                .call(move |conn| repository::get_issue(conn, &lookup_id))
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such issue: {issue_id}"))?;
            issue.status = status;
            db.writer()
                .call(move |conn| repository::update_issue(conn, &issue))
                .await?;
            println!("Issue updated.");
        }
        IssueAction::Remove { issue_id } => {
            let id = issue_id.clone();
            let removed = db
                .writer()
                .call(move |conn| repository::delete_issue(conn, &id))
                .await?;
            if removed {
                println!("Removed: {issue_id}");
            } else {
                println!("Not found: {issue_id}");
            }
        }
    }
    Ok(())
}

async fn handle_dashboard(db: &Database, target: DashboardTarget) -> anyhow::Result<()> {
    match target {
        DashboardTarget::Student {
            user_id,
            as_of,
            json,
        } => {
            let as_of = parse_as_of(as_of.as_deref())?;
            let env = messdw::dashboard::student_cards(db, &user_id, as_of).await;
            if !env.success {
                anyhow::bail!(env.message);
            }
            let cards = env.data;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else {
                println!("Student dashboard for {user_id} ({})", cards.month_key);
                println!("  Total spent:    {}", format_inr(cards.total_spent_paise));
                println!(
                    "  This month:     {} ({:+.1}% vs last month)",
                    format_inr(cards.month_spent_paise),
                    cards.monthly_change_pct
                );
                match cards.most_ordered {
                    Some(m) => println!(
                        "  Most ordered:   {} — {} {} ({})",
                        m.description, m.day, m.meal_time, m.menu_type
                    ),
                    None => println!("  Most ordered:   (no orders yet)"),
                }
                println!("  Issues raised:  {}", cards.issues_reported);
            }
        }
        DashboardTarget::Admin { as_of, json } => {
            let as_of = parse_as_of(as_of.as_deref())?;
            let env = messdw::dashboard::admin_cards(db, as_of).await;
            if !env.success {
                anyhow::bail!(env.message);
            }
            let cards = env.data;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else {
                println!("Admin dashboard ({})", cards.day_key);
                println!(
                    "  Today's orders:  {} ({:+.1}% vs yesterday)",
                    format_inr(cards.today_total_paise),
                    cards.daily_change_pct
                );
                println!(
                    "  Month orders:    {} ({:+.1}% vs last month)",
                    format_inr(cards.month_total_paise),
                    cards.monthly_change_pct
                );
                println!("  Unique diners:   {}", cards.unique_diners_today);
                println!("  Open issues:     {}", cards.open_issues);
            }
        }
    }
    Ok(())
}

async fn handle_series(
    db: &Database,
    range: &str,
    user: Option<&str>,
    as_of: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let as_of = parse_as_of(as_of)?;
    let env = messdw::dashboard::order_series(db, user, range, as_of).await;
    if !env.success {
        anyhow::bail!(env.message);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&env.data)?);
    } else {
        println!("date        breakfast lunch snacks dinner");
        for b in env.data {
            println!(
                "{}  {:>9} {:>5} {:>6} {:>6}",
                b.date, b.breakfast, b.lunch, b.snacks, b.dinner
            );
        }
    }
    Ok(())
}

async fn handle_config(dw: &MessDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(db: &Database) -> anyhow::Result<()> {
    let stats = db
        .reader()
        .call(|conn| {
            let menus: i64 = conn.query_row("SELECT COUNT(*) FROM menus", [], |row| row.get(0))?;
            let orders: i64 =
                conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
            let notices: i64 =
                conn.query_row("SELECT COUNT(*) FROM notices", [], |row| row.get(0))?;
            let issues: i64 =
                conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
            let last_order: Option<String> = conn
                .query_row("SELECT MAX(order_time) FROM orders", [], |row| row.get(0))
                .ok();
            Ok::<_, rusqlite::Error>((menus, orders, notices, issues, last_order))
        })
        .await?;

    let (menus, orders, notices, issues, last_order) = stats;
    println!("Warehouse Status");
    println!("  Menu items: {menus}");
    println!("  Orders:     {orders}");
    println!("  Notices:    {notices}");
    println!("  Issues:     {issues}");
    println!(
        "  Last order: {}",
        last_order.unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}
