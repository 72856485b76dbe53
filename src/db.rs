use std::{fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{auth::hash_password, config::AppConfig};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool, config: &AppConfig) -> Result<(), sqlx::Error> {
    seed_admin(pool, config).await?;
    seed_services(pool).await?;
    seed_settings(pool).await?;
    Ok(())
}

/// Queue a one-shot message shown on the admin's next dashboard visit.
pub async fn queue_admin_flash(pool: &SqlitePool, message: &str) {
    let result = sqlx::query("INSERT INTO admin_flash (message, created_at) VALUES (?, ?)")
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await;
    if let Err(err) = result {
        log::warn!("Failed to queue admin notification: {err}");
    }
}

pub async fn drain_admin_flash(pool: &SqlitePool) -> Vec<String> {
    let messages = sqlx::query_scalar::<_, String>(
        "SELECT message FROM admin_flash ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await
    .unwrap_or_default();

    if !messages.is_empty() {
        let _ = sqlx::query("DELETE FROM admin_flash").execute(pool).await;
    }

    messages
}

async fn seed_admin(pool: &SqlitePool, config: &AppConfig) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, (i64,)>("SELECT id FROM admin_users LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.admin_password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        "INSERT INTO admin_users (username, password_hash, created_at) VALUES (?, ?, ?)",
    )
    .bind(&config.admin_username)
    .bind(password_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let defaults = [
        ("AC Installation", "Professional AC installation service", 2500.0, "2-3 hours", "AC"),
        ("AC Repair", "Expert AC repair and maintenance", 800.0, "1-2 hours", "AC"),
        ("AC Cleaning", "Deep cleaning and sanitization", 600.0, "1 hour", "AC"),
        ("AC Gas Refilling", "Gas refilling and pressure check", 1200.0, "30 minutes", "AC"),
        ("AC Servicing", "Complete AC servicing package", 1000.0, "1.5 hours", "AC"),
        ("Fridge Repair", "Complete refrigerator repair service", 900.0, "1-2 hours", "Fridge"),
        ("Fridge Gas Refilling", "Refrigerant gas refilling service", 1500.0, "1 hour", "Fridge"),
        ("Fridge Cleaning", "Deep cleaning and maintenance", 500.0, "45 minutes", "Fridge"),
        ("Washing Machine Repair", "Complete washing machine repair", 700.0, "1-2 hours", "Washing Machine"),
        ("Washing Machine Installation", "Professional installation service", 400.0, "30 minutes", "Washing Machine"),
        ("Washing Machine Cleaning", "Deep cleaning and maintenance", 350.0, "30 minutes", "Washing Machine"),
    ];

    for (name, description, price, duration, category) in defaults {
        sqlx::query(
            "INSERT INTO services (name, description, price, duration, category) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(duration)
        .bind(category)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_settings(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let defaults = [
        ("site_title", "Green Breeze AC Services"),
        ("site_description", "Professional AC Services in Your City"),
        ("contact_phone", "+91 9876543210"),
        ("contact_email", "info@greenbreeze.com"),
        ("address", "123 Service Street, Your City - 560001"),
        ("show_prices", "1"),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
pub mod test_utils {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    use super::*;

    /// Fresh in-memory database with the full schema applied. Shared-cache
    /// named databases keep the schema alive across pool connections.
    pub async fn test_pool() -> SqlitePool {
        let url = format!(
            "sqlite:file:memdb_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        let options = SqliteConnectOptions::from_str(&url)
            .expect("test db options")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("test db connect");
        run_migrations(&pool).await.expect("migrations");
        pool
    }

    /// Insert a service row directly and return its id.
    pub async fn insert_service(pool: &SqlitePool, name: &str, category: &str) -> i64 {
        sqlx::query(
            "INSERT INTO services (name, description, price, duration, category) VALUES (?, '', 500.0, '1 hour', ?)",
        )
        .bind(name)
        .bind(category)
        .execute(pool)
        .await
        .expect("insert service")
        .last_insert_rowid()
    }
}
