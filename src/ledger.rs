use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    models::{BookingRow, BookingStatus, RevenueRecordRow},
    slots,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Cannot delete completed booking with revenue")]
    ProtectedBooking,
    #[error("Booking not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub service_id: i64,
    pub booking_date: String,
    pub booking_time: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StatusUpdate {
    pub id: i64,
    pub status: String,
    pub revenue: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UpdateOutcome {
    pub id: i64,
    pub applied: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_bookings: i64,
    pub today_bookings: i64,
    pub pending_bookings: i64,
    pub monthly_revenue: f64,
}

#[derive(Debug, Clone)]
pub enum RevenueFilter {
    All,
    Day(String),
    Month(String),
    Year(String),
}

// Stored booking ids are stable; listings carry a contiguous display
// number computed over creation order at query time.
const BOOKING_SELECT: &str = r#"SELECT * FROM (
    SELECT b.id, ROW_NUMBER() OVER (ORDER BY b.created_at, b.id) AS display_no,
           b.customer_name, b.phone, b.email, b.address, b.service_id,
           s.name AS service_name, b.booking_date, b.booking_time,
           b.status, b.revenue, b.created_at
    FROM bookings b
    JOIN services s ON b.service_id = s.id
)"#;

pub async fn create_booking(pool: &SqlitePool, booking: &NewBooking) -> Result<i64, LedgerError> {
    let result = sqlx::query(
        r#"INSERT INTO bookings
           (customer_name, phone, email, address, service_id, booking_date, booking_time, status, revenue, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)"#,
    )
    .bind(&booking.customer_name)
    .bind(&booking.phone)
    .bind(&booking.email)
    .bind(&booking.address)
    .bind(booking.service_id)
    .bind(&booking.booking_date)
    .bind(&booking.booking_time)
    .bind(BookingStatus::Pending.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list_month(
    pool: &SqlitePool,
    month: &str,
    status: Option<&str>,
) -> Result<Vec<BookingRow>, LedgerError> {
    let rows = match status {
        Some(status) => {
            let sql = format!(
                "{BOOKING_SELECT} WHERE substr(created_at, 1, 7) = ? AND status = ? ORDER BY created_at DESC, id DESC"
            );
            sqlx::query_as::<_, BookingRow>(&sql)
                .bind(month)
                .bind(status)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!(
                "{BOOKING_SELECT} WHERE substr(created_at, 1, 7) = ? ORDER BY created_at DESC, id DESC"
            );
            sqlx::query_as::<_, BookingRow>(&sql)
                .bind(month)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}

pub async fn recent_bookings(pool: &SqlitePool, limit: i64) -> Result<Vec<BookingRow>, LedgerError> {
    let sql = format!("{BOOKING_SELECT} ORDER BY created_at DESC, id DESC LIMIT ?");
    Ok(sqlx::query_as::<_, BookingRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

pub async fn all_bookings(pool: &SqlitePool) -> Result<Vec<BookingRow>, LedgerError> {
    let sql = format!("{BOOKING_SELECT} ORDER BY created_at DESC, id DESC");
    Ok(sqlx::query_as::<_, BookingRow>(&sql).fetch_all(pool).await?)
}

/// Delete one booking. Completed bookings with recorded revenue are
/// protected and the ledger is left untouched.
pub async fn delete_booking(pool: &SqlitePool, id: i64) -> Result<(), LedgerError> {
    let row = sqlx::query_as::<_, (String, f64)>(
        "SELECT status, revenue FROM bookings WHERE id = ? LIMIT 1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some((status, revenue)) = row else {
        return Err(LedgerError::NotFound);
    };
    if status == BookingStatus::Completed.as_str() && revenue > 0.0 {
        return Err(LedgerError::ProtectedBooking);
    }

    sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply a batch of status updates. Each record is checked against the
/// transition table independently; rejected records do not block the rest.
/// Completing with a revenue figure updates both fields in one statement
/// and records the amount in the revenue ledger.
pub async fn apply_status_updates(
    pool: &SqlitePool,
    updates: &[StatusUpdate],
) -> Result<Vec<UpdateOutcome>, LedgerError> {
    let mut outcomes = Vec::with_capacity(updates.len());

    for update in updates {
        outcomes.push(apply_one_update(pool, update).await?);
    }

    Ok(outcomes)
}

async fn apply_one_update(
    pool: &SqlitePool,
    update: &StatusUpdate,
) -> Result<UpdateOutcome, LedgerError> {
    let rejected = |message: String| UpdateOutcome {
        id: update.id,
        applied: false,
        message: Some(message),
    };

    let Some(next) = BookingStatus::parse(&update.status) else {
        return Ok(rejected(format!("Unknown status '{}'", update.status)));
    };

    let row = sqlx::query_as::<_, (String,)>("SELECT status FROM bookings WHERE id = ? LIMIT 1")
        .bind(update.id)
        .fetch_optional(pool)
        .await?;
    let Some((current,)) = row else {
        return Ok(rejected("Booking not found".to_string()));
    };
    let Some(current) = BookingStatus::parse(&current) else {
        return Ok(rejected(format!("Stored status '{current}' is invalid")));
    };

    if !current.can_transition_to(next) {
        return Ok(rejected(format!("Cannot move booking from {current} to {next}")));
    }

    match (next, update.revenue) {
        (BookingStatus::Completed, Some(revenue)) => {
            sqlx::query("UPDATE bookings SET status = ?, revenue = ? WHERE id = ?")
                .bind(next.as_str())
                .bind(revenue)
                .bind(update.id)
                .execute(pool)
                .await?;
            sqlx::query("INSERT INTO revenue_ledger (booking_id, amount, created_at) VALUES (?, ?, ?)")
                .bind(update.id)
                .bind(revenue)
                .bind(Utc::now().to_rfc3339())
                .execute(pool)
                .await?;
        }
        _ => {
            sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
                .bind(next.as_str())
                .bind(update.id)
                .execute(pool)
                .await?;
        }
    }

    Ok(UpdateOutcome {
        id: update.id,
        applied: true,
        message: None,
    })
}

pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats, LedgerError> {
    let now = Utc::now();
    let today = now.format("%Y-%m-%d").to_string();
    let month = now.format("%Y-%m").to_string();

    let total_bookings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
        .fetch_one(pool)
        .await?;
    let today_bookings = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE substr(created_at, 1, 10) = ?",
    )
    .bind(&today)
    .fetch_one(pool)
    .await?;
    let pending_bookings = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE status = 'pending'",
    )
    .fetch_one(pool)
    .await?;
    let monthly_revenue = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(revenue), 0.0) FROM bookings WHERE status = 'completed' AND substr(created_at, 1, 7) = ?",
    )
    .bind(&month)
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_bookings,
        today_bookings,
        pending_bookings,
        monthly_revenue,
    })
}

/// Completed bookings with recorded revenue matching the filter, newest
/// first, together with their summed total.
pub async fn revenue_report(
    pool: &SqlitePool,
    filter: &RevenueFilter,
) -> Result<(Vec<RevenueRecordRow>, f64), LedgerError> {
    let base = r#"SELECT * FROM (
        SELECT b.id, ROW_NUMBER() OVER (ORDER BY b.created_at, b.id) AS display_no,
               b.customer_name, b.revenue, s.name AS service_name, b.created_at, b.status
        FROM bookings b
        JOIN services s ON b.service_id = s.id
    ) WHERE status = 'completed' AND revenue > 0"#;

    let (prefix_len, value) = match filter {
        RevenueFilter::All => (0usize, ""),
        RevenueFilter::Day(value) => (10, value.as_str()),
        RevenueFilter::Month(value) => (7, value.as_str()),
        RevenueFilter::Year(value) => (4, value.as_str()),
    };

    let records = if prefix_len == 0 {
        let sql = format!("{base} ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, RevenueRecordRow>(&sql).fetch_all(pool).await?
    } else {
        let sql = format!(
            "{base} AND substr(created_at, 1, {prefix_len}) = ? ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, RevenueRecordRow>(&sql)
            .bind(value)
            .fetch_all(pool)
            .await?
    };

    let total = records.iter().map(|record| record.revenue).sum();
    Ok((records, total))
}

/// Full booking backup as CSV bytes, newest first, with slot codes
/// replaced by their display ranges.
pub async fn export_csv(pool: &SqlitePool) -> Result<Vec<u8>, LedgerError> {
    let bookings = all_bookings(pool).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "ID",
        "Customer Name",
        "Phone",
        "Email",
        "Address",
        "Service",
        "Booking Date",
        "Booking Time",
        "Status",
        "Created At",
    ])?;

    for booking in bookings {
        writer.write_record([
            booking.display_no.to_string().as_str(),
            &booking.customer_name,
            &booking.phone,
            booking.email.as_deref().unwrap_or(""),
            &booking.address,
            &booking.service_name,
            &booking.booking_date,
            slots::slot_label(&booking.booking_time),
            &booking.status,
            &booking.created_at,
        ])?;
    }

    Ok(writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?)
}
