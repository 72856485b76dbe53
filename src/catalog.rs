use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{OfferRow, ServiceRow};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(String),
    #[error("Record not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub category: String,
    pub services: Vec<ServiceRow>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServiceInput {
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub category: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OfferInput {
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub discount_percent: f64,
    pub valid_until: String,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsStats {
    pub total_services: i64,
    pub active_offers: i64,
    pub monthly_bookings: i64,
}

/// Active services grouped by category, ordered category then name.
pub async fn active_services_grouped(
    pool: &SqlitePool,
) -> Result<Vec<CategoryGroup>, CatalogError> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, description, price, duration, category, image, active FROM services WHERE active = 1 ORDER BY category, name",
    )
    .fetch_all(pool)
    .await?;

    let mut groups: Vec<CategoryGroup> = Vec::new();
    for service in rows {
        match groups.last_mut() {
            Some(group) if group.category == service.category => group.services.push(service),
            _ => groups.push(CategoryGroup {
                category: service.category.clone(),
                services: vec![service],
            }),
        }
    }
    Ok(groups)
}

pub async fn all_services(pool: &SqlitePool) -> Result<Vec<ServiceRow>, CatalogError> {
    Ok(sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, description, price, duration, category, image, active FROM services ORDER BY id",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn service_name(pool: &SqlitePool, id: i64) -> Result<String, CatalogError> {
    sqlx::query_scalar::<_, String>("SELECT name FROM services WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound)
}

fn accepted_image(candidate: Option<&str>, allowed_exts: &[String]) -> Option<String> {
    let name = candidate?.trim();
    if name.is_empty() {
        return None;
    }
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    if allowed_exts.iter().any(|allowed| *allowed == ext) {
        Some(name.to_string())
    } else {
        log::warn!("Ignoring service image '{name}': extension not allowed");
        None
    }
}

/// Create (no id) or fully update (id) a service. A new image reference is
/// taken only when its extension is allowed; otherwise the stored image is
/// preserved.
pub async fn upsert_service(
    pool: &SqlitePool,
    input: &ServiceInput,
    allowed_exts: &[String],
) -> Result<i64, CatalogError> {
    if input.name.trim().is_empty() {
        return Err(CatalogError::Invalid("Service name is required".to_string()));
    }
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(CatalogError::Invalid("Price must be non-negative".to_string()));
    }

    let image = accepted_image(input.image.as_deref(), allowed_exts);

    match input.id {
        Some(id) => {
            let result = if let Some(image) = image {
                sqlx::query(
                    "UPDATE services SET name = ?, description = ?, price = ?, duration = ?, category = ?, image = ? WHERE id = ?",
                )
                .bind(input.name.trim())
                .bind(&input.description)
                .bind(input.price)
                .bind(&input.duration)
                .bind(&input.category)
                .bind(image)
                .bind(id)
                .execute(pool)
                .await?
            } else {
                sqlx::query(
                    "UPDATE services SET name = ?, description = ?, price = ?, duration = ?, category = ? WHERE id = ?",
                )
                .bind(input.name.trim())
                .bind(&input.description)
                .bind(input.price)
                .bind(&input.duration)
                .bind(&input.category)
                .bind(id)
                .execute(pool)
                .await?
            };
            if result.rows_affected() == 0 {
                return Err(CatalogError::NotFound);
            }
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO services (name, description, price, duration, category, image) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(input.price)
            .bind(&input.duration)
            .bind(&input.category)
            .bind(image)
            .execute(pool)
            .await?;
            Ok(result.last_insert_rowid())
        }
    }
}

pub async fn toggle_service(pool: &SqlitePool, id: i64) -> Result<(), CatalogError> {
    let result = sqlx::query("UPDATE services SET active = 1 - active WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound);
    }
    Ok(())
}

/// Offers that may be displayed: active and not past their valid-until
/// date relative to `today`.
pub async fn valid_offers(
    pool: &SqlitePool,
    today: NaiveDate,
) -> Result<Vec<OfferRow>, CatalogError> {
    Ok(sqlx::query_as::<_, OfferRow>(
        "SELECT id, title, description, discount_percent, valid_until, active FROM offers WHERE active = 1 AND date(valid_until) >= date(?) ORDER BY id DESC",
    )
    .bind(today.format("%Y-%m-%d").to_string())
    .fetch_all(pool)
    .await?)
}

pub async fn all_offers(pool: &SqlitePool) -> Result<Vec<OfferRow>, CatalogError> {
    Ok(sqlx::query_as::<_, OfferRow>(
        "SELECT id, title, description, discount_percent, valid_until, active FROM offers ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn upsert_offer(pool: &SqlitePool, input: &OfferInput) -> Result<i64, CatalogError> {
    if input.title.trim().is_empty() {
        return Err(CatalogError::Invalid("Offer title is required".to_string()));
    }

    match input.id {
        Some(id) => {
            let result = sqlx::query(
                "UPDATE offers SET title = ?, description = ?, discount_percent = ?, valid_until = ? WHERE id = ?",
            )
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(input.discount_percent)
            .bind(&input.valid_until)
            .bind(id)
            .execute(pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(CatalogError::NotFound);
            }
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO offers (title, description, discount_percent, valid_until) VALUES (?, ?, ?, ?)",
            )
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(input.discount_percent)
            .bind(&input.valid_until)
            .execute(pool)
            .await?;
            Ok(result.last_insert_rowid())
        }
    }
}

pub async fn delete_offer(pool: &SqlitePool, id: i64) -> Result<(), CatalogError> {
    let result = sqlx::query("DELETE FROM offers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound);
    }
    Ok(())
}

pub async fn settings_map(
    pool: &SqlitePool,
) -> Result<std::collections::HashMap<String, String>, CatalogError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn show_prices(pool: &SqlitePool) -> Result<bool, CatalogError> {
    let value = sqlx::query_scalar::<_, String>(
        "SELECT value FROM settings WHERE key = 'show_prices' LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(value.map(|value| value == "1").unwrap_or(true))
}

/// Batch-update settings values. The key set is fixed at seed time, so
/// unknown keys are ignored rather than inserted. `show_prices` is
/// normalized to "1"/"0".
pub async fn update_settings(
    pool: &SqlitePool,
    updates: &[(String, String)],
) -> Result<(), CatalogError> {
    for (key, value) in updates {
        let value = if key == "show_prices" {
            let truthy = matches!(value.as_str(), "1" | "true" | "on");
            if truthy { "1" } else { "0" }.to_string()
        } else {
            value.clone()
        };
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(value)
            .bind(key)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Counters shown on the settings page: active services, currently valid
/// offers, and bookings created this month.
pub async fn settings_stats(
    pool: &SqlitePool,
    today: NaiveDate,
) -> Result<SettingsStats, CatalogError> {
    let total_services =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services WHERE active = 1")
            .fetch_one(pool)
            .await?;
    let active_offers = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM offers WHERE active = 1 AND date(valid_until) >= date(?)",
    )
    .bind(today.format("%Y-%m-%d").to_string())
    .fetch_one(pool)
    .await?;
    let monthly_bookings = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE substr(created_at, 1, 7) = ?",
    )
    .bind(Utc::now().format("%Y-%m").to_string())
    .fetch_one(pool)
    .await?;

    Ok(SettingsStats {
        total_services,
        active_offers,
        monthly_bookings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_pool;

    fn exts() -> Vec<String> {
        vec!["png".into(), "jpg".into(), "jpeg".into(), "gif".into()]
    }

    async fn insert_offer(pool: &SqlitePool, title: &str, valid_until: &str, active: i64) -> i64 {
        sqlx::query(
            "INSERT INTO offers (title, description, discount_percent, valid_until, active) VALUES (?, '', 10.0, ?, ?)",
        )
        .bind(title)
        .bind(valid_until)
        .bind(active)
        .execute(pool)
        .await
        .expect("insert offer")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn offer_validity_flips_at_the_date_boundary() {
        let pool = test_pool().await;
        insert_offer(&pool, "Monsoon Special", "2024-06-15", 1).await;
        insert_offer(&pool, "Disabled", "2024-12-31", 0).await;

        let on_the_day = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let offers = valid_offers(&pool, on_the_day).await.expect("offers");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].title, "Monsoon Special");

        let day_after = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        let offers = valid_offers(&pool, day_after).await.expect("offers");
        assert!(offers.is_empty());
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_active_flag() {
        let pool = test_pool().await;
        let id = upsert_service(
            &pool,
            &ServiceInput {
                id: None,
                name: "AC Repair".into(),
                description: String::new(),
                price: 800.0,
                duration: "1 hour".into(),
                category: "AC".into(),
                image: None,
            },
            &exts(),
        )
        .await
        .expect("create");

        let active = |pool: SqlitePool, id: i64| async move {
            sqlx::query_scalar::<_, i64>("SELECT active FROM services WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .expect("active")
        };

        assert_eq!(active(pool.clone(), id).await, 1);
        toggle_service(&pool, id).await.expect("toggle");
        assert_eq!(active(pool.clone(), id).await, 0);
        toggle_service(&pool, id).await.expect("toggle");
        assert_eq!(active(pool.clone(), id).await, 1);
    }

    #[tokio::test]
    async fn image_preserved_unless_a_valid_replacement_arrives() {
        let pool = test_pool().await;
        let mut input = ServiceInput {
            id: None,
            name: "AC Repair".into(),
            description: String::new(),
            price: 800.0,
            duration: "1 hour".into(),
            category: "AC".into(),
            image: Some("repair.png".into()),
        };
        let id = upsert_service(&pool, &input, &exts()).await.expect("create");

        let stored_image = |pool: SqlitePool, id: i64| async move {
            sqlx::query_scalar::<_, Option<String>>("SELECT image FROM services WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .expect("image")
        };
        assert_eq!(stored_image(pool.clone(), id).await.as_deref(), Some("repair.png"));

        input.id = Some(id);
        input.image = None;
        upsert_service(&pool, &input, &exts()).await.expect("update");
        assert_eq!(stored_image(pool.clone(), id).await.as_deref(), Some("repair.png"));

        input.image = Some("script.exe".into());
        upsert_service(&pool, &input, &exts()).await.expect("update");
        assert_eq!(stored_image(pool.clone(), id).await.as_deref(), Some("repair.png"));

        input.image = Some("fresh.jpg".into());
        upsert_service(&pool, &input, &exts()).await.expect("update");
        assert_eq!(stored_image(pool.clone(), id).await.as_deref(), Some("fresh.jpg"));
    }

    #[tokio::test]
    async fn services_group_by_category_in_stable_order() {
        let pool = test_pool().await;
        for (name, category) in [
            ("Washer Fix", "Washing Machine"),
            ("AC Repair", "AC"),
            ("AC Cleaning", "AC"),
            ("Fridge Repair", "Fridge"),
        ] {
            crate::db::test_utils::insert_service(&pool, name, category).await;
        }

        let groups = active_services_grouped(&pool).await.expect("groups");
        let categories: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(categories, ["AC", "Fridge", "Washing Machine"]);
        let ac_names: Vec<&str> = groups[0].services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(ac_names, ["AC Cleaning", "AC Repair"]);
    }

    #[tokio::test]
    async fn negative_prices_are_rejected() {
        let pool = test_pool().await;
        let result = upsert_service(
            &pool,
            &ServiceInput {
                id: None,
                name: "AC Repair".into(),
                description: String::new(),
                price: -1.0,
                duration: String::new(),
                category: "AC".into(),
                image: None,
            },
            &exts(),
        )
        .await;
        assert!(matches!(result, Err(CatalogError::Invalid(_))));
    }

    #[tokio::test]
    async fn settings_updates_touch_existing_keys_only() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO settings (key, value) VALUES ('site_title', 'Old Title'), ('show_prices', '1')")
            .execute(&pool)
            .await
            .expect("seed");

        update_settings(
            &pool,
            &[
                ("site_title".to_string(), "Green Breeze".to_string()),
                ("show_prices".to_string(), "false".to_string()),
                ("not_a_key".to_string(), "ignored".to_string()),
            ],
        )
        .await
        .expect("update");

        let map = settings_map(&pool).await.expect("map");
        assert_eq!(map.get("site_title").map(String::as_str), Some("Green Breeze"));
        assert_eq!(map.get("show_prices").map(String::as_str), Some("0"));
        assert!(!map.contains_key("not_a_key"));
        assert!(!show_prices(&pool).await.expect("flag"));
    }

    #[tokio::test]
    async fn offers_can_be_created_updated_and_deleted() {
        let pool = test_pool().await;
        let id = upsert_offer(
            &pool,
            &OfferInput {
                id: None,
                title: "Summer Sale".into(),
                description: "Flat discount".into(),
                discount_percent: 15.0,
                valid_until: "2024-08-31".into(),
            },
        )
        .await
        .expect("create");

        upsert_offer(
            &pool,
            &OfferInput {
                id: Some(id),
                title: "Summer Sale".into(),
                description: "Flat discount".into(),
                discount_percent: 20.0,
                valid_until: "2024-09-30".into(),
            },
        )
        .await
        .expect("update");

        let offers = all_offers(&pool).await.expect("list");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].discount_percent, 20.0);

        delete_offer(&pool, id).await.expect("delete");
        assert!(all_offers(&pool).await.expect("list").is_empty());
        assert!(matches!(delete_offer(&pool, id).await, Err(CatalogError::NotFound)));
    }
}
