use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::admin_api_gate,
    catalog,
    catalog::{CatalogError, OfferInput, ServiceInput},
    ledger,
    ledger::{LedgerError, StatusUpdate},
    state::AppState,
};

#[derive(Deserialize)]
pub struct StatusBatch {
    updates: Vec<StatusUpdate>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(from_fn(admin_api_gate))
            .service(web::resource("/delete_booking/{id}").route(web::delete().to(delete_booking)))
            .service(web::resource("/update_service").route(web::post().to(update_service)))
            .service(web::resource("/toggle_service/{id}").route(web::post().to(toggle_service)))
            .service(web::resource("/update_offer").route(web::post().to(update_offer)))
            .service(web::resource("/delete_offer/{id}").route(web::delete().to(delete_offer)))
            .service(web::resource("/update_settings").route(web::post().to(update_settings)))
            .service(
                web::resource("/update_booking_statuses")
                    .route(web::post().to(update_booking_statuses)),
            )
            .service(web::resource("/backup_data").route(web::get().to(backup_data))),
    );
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

fn rejected(message: String) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": false, "message": message }))
}

async fn delete_booking(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ledger::delete_booking(&state.db, path.into_inner()).await {
        Ok(()) => Ok(ok()),
        Err(err @ (LedgerError::ProtectedBooking | LedgerError::NotFound)) => {
            Ok(rejected(err.to_string()))
        }
        Err(err) => Err(actix_web::error::ErrorInternalServerError(err)),
    }
}

async fn update_service(
    state: web::Data<AppState>,
    payload: web::Json<ServiceInput>,
) -> Result<HttpResponse> {
    match catalog::upsert_service(&state.db, &payload, &state.config.allowed_image_exts).await {
        Ok(id) => Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id }))),
        Err(err @ (CatalogError::Invalid(_) | CatalogError::NotFound)) => {
            Ok(rejected(err.to_string()))
        }
        Err(err) => Err(actix_web::error::ErrorInternalServerError(err)),
    }
}

async fn toggle_service(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match catalog::toggle_service(&state.db, path.into_inner()).await {
        Ok(()) => Ok(ok()),
        Err(err @ CatalogError::NotFound) => Ok(rejected(err.to_string())),
        Err(err) => Err(actix_web::error::ErrorInternalServerError(err)),
    }
}

async fn update_offer(
    state: web::Data<AppState>,
    payload: web::Json<OfferInput>,
) -> Result<HttpResponse> {
    match catalog::upsert_offer(&state.db, &payload).await {
        Ok(id) => Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id }))),
        Err(err @ (CatalogError::Invalid(_) | CatalogError::NotFound)) => {
            Ok(rejected(err.to_string()))
        }
        Err(err) => Err(actix_web::error::ErrorInternalServerError(err)),
    }
}

async fn delete_offer(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    match catalog::delete_offer(&state.db, path.into_inner()).await {
        Ok(()) => Ok(ok()),
        Err(err @ CatalogError::NotFound) => Ok(rejected(err.to_string())),
        Err(err) => Err(actix_web::error::ErrorInternalServerError(err)),
    }
}

async fn update_settings(
    state: web::Data<AppState>,
    payload: web::Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<HttpResponse> {
    let updates: Vec<(String, String)> = payload
        .into_inner()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(value) => value,
                serde_json::Value::Bool(flag) => if flag { "1" } else { "0" }.to_string(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    catalog::update_settings(&state.db, &updates)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(ok())
}

async fn update_booking_statuses(
    state: web::Data<AppState>,
    payload: web::Json<StatusBatch>,
) -> Result<HttpResponse> {
    let outcomes = ledger::apply_status_updates(&state.db, &payload.updates)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let success = outcomes.iter().all(|outcome| outcome.applied);
    Ok(HttpResponse::Ok().json(json!({ "success": success, "results": outcomes })))
}

async fn backup_data(state: web::Data<AppState>) -> Result<HttpResponse> {
    let bytes = ledger::export_csv(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let filename = format!(
        "bookings_backup_{}.csv",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            actix_web::http::header::CONTENT_DISPOSITION,
            format!("attachment; filename={filename}"),
        ))
        .body(bytes))
}
