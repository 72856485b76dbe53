use actix_web::{http::header, middleware::from_fn, web, HttpRequest, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{self, admin_page_gate, AdminSession, SESSION_COOKIE},
    catalog, db, ledger,
    ledger::RevenueFilter,
    models::{BookingRow, BookingStatus},
    state::AppState,
    templates::{fmt_amount, fmt_price, render},
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: String,
}

#[derive(Clone, Debug)]
struct BookingView {
    display_no: i64,
    id: i64,
    customer_name: String,
    phone: String,
    email: String,
    has_email: bool,
    address: String,
    service_name: String,
    booking_date: String,
    booking_time: String,
    status: String,
    revenue: String,
    created_at: String,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: &'static str,
    selected: bool,
}

#[derive(Clone, Debug)]
struct AdminServiceView {
    id: i64,
    name: String,
    description: String,
    price: String,
    duration: String,
    category: String,
    image: String,
    has_image: bool,
    active: bool,
}

#[derive(Clone, Debug)]
struct AdminOfferView {
    id: i64,
    title: String,
    description: String,
    discount: String,
    valid_until: String,
    active: bool,
    currently_valid: bool,
}

#[derive(Clone, Debug)]
struct RevenueView {
    display_no: i64,
    customer_name: String,
    service_name: String,
    revenue: String,
    created_at: String,
}

#[derive(Template)]
#[template(path = "admin_login.html")]
struct LoginTemplate {
    error: String,
    has_error: bool,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct DashboardTemplate {
    admin_name: String,
    flashes: Vec<String>,
    stats: Vec<StatCard>,
    recent: Vec<BookingView>,
}

#[derive(Template)]
#[template(path = "admin_bookings.html")]
struct BookingsTemplate {
    bookings: Vec<BookingView>,
    month: String,
    status_filter: String,
    statuses: Vec<StatusOption>,
}

#[derive(Template)]
#[template(path = "admin_services.html")]
struct ServicesTemplate {
    services: Vec<AdminServiceView>,
}

#[derive(Template)]
#[template(path = "admin_offers.html")]
struct OffersTemplate {
    offers: Vec<AdminOfferView>,
}

#[derive(Template)]
#[template(path = "admin_settings.html")]
struct SettingsTemplate {
    site_title: String,
    site_description: String,
    contact_phone: String,
    contact_email: String,
    address: String,
    show_prices: bool,
    total_services: i64,
    active_offers: i64,
    monthly_bookings: i64,
}

#[derive(Template)]
#[template(path = "admin_revenue.html")]
struct RevenueTemplate {
    records: Vec<RevenueView>,
    total: String,
    filter_type: String,
    filter_value: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct BookingsQuery {
    month: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct RevenueQuery {
    filter: Option<String>,
    value: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/admin/login")
            .route(web::get().to(login_page))
            .route(web::post().to(login_submit)),
    )
    .service(web::resource("/admin/logout").route(web::get().to(logout)))
    .service(
        web::scope("/admin")
            .wrap(from_fn(admin_page_gate))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/bookings").route(web::get().to(bookings)))
            .service(web::resource("/services").route(web::get().to(services)))
            .service(web::resource("/offers").route(web::get().to(offers)))
            .service(web::resource("/settings").route(web::get().to(settings_page)))
            .service(web::resource("/revenue").route(web::get().to(revenue))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/admin/dashboard"))
        .finish()
}

async fn login_page() -> HttpResponse {
    render(LoginTemplate {
        error: String::new(),
        has_error: false,
    })
}

async fn login_submit(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let ttl = state.config.session_ttl_hours;

    let token = auth::login(&state.db, form.username.trim(), &form.password, ttl)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    match token {
        Some(token) => Ok(HttpResponse::SeeOther()
            .append_header((header::LOCATION, "/admin/dashboard"))
            .cookie(auth::session_cookie(&req, token, ttl))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .finish()),
        None => Ok(render(LoginTemplate {
            error: "Invalid credentials".to_string(),
            has_error: true,
        })),
    }
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        auth::logout(&state.db, cookie.value()).await;
    }
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .cookie(auth::clear_session_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

async fn dashboard(
    state: web::Data<AppState>,
    session: web::ReqData<AdminSession>,
) -> Result<HttpResponse> {
    let stats = ledger::dashboard_stats(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let recent = ledger::recent_bookings(&state.db, 5)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let flashes = db::drain_admin_flash(&state.db).await;

    let stats = vec![
        StatCard {
            label: "Total bookings".to_string(),
            value: stats.total_bookings.to_string(),
        },
        StatCard {
            label: "Today's bookings".to_string(),
            value: stats.today_bookings.to_string(),
        },
        StatCard {
            label: "Pending".to_string(),
            value: stats.pending_bookings.to_string(),
        },
        StatCard {
            label: "Revenue this month".to_string(),
            value: fmt_amount(stats.monthly_revenue),
        },
    ];

    Ok(render(DashboardTemplate {
        admin_name: session.username.clone(),
        flashes,
        stats,
        recent: recent.into_iter().map(to_view).collect(),
    }))
}

async fn bookings(
    state: web::Data<AppState>,
    query: web::Query<BookingsQuery>,
) -> Result<HttpResponse> {
    let month = query
        .month
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());
    let status_filter = query
        .status
        .clone()
        .filter(|value| !value.is_empty() && value != "all")
        .unwrap_or_default();

    let rows = if status_filter.is_empty() {
        ledger::list_month(&state.db, &month, None).await
    } else {
        ledger::list_month(&state.db, &month, Some(&status_filter)).await
    }
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let statuses = BookingStatus::ALL
        .iter()
        .map(|status| StatusOption {
            value: status.as_str(),
            selected: status.as_str() == status_filter,
        })
        .collect();

    Ok(render(BookingsTemplate {
        bookings: rows.into_iter().map(to_view).collect(),
        month,
        status_filter,
        statuses,
    }))
}

async fn services(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = catalog::all_services(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let services = rows
        .into_iter()
        .map(|service| {
            let image = service.image.unwrap_or_default();
            AdminServiceView {
                id: service.id,
                name: service.name,
                description: service.description,
                price: fmt_price(service.price),
                duration: service.duration,
                category: service.category,
                has_image: !image.is_empty(),
                image,
                active: service.active == 1,
            }
        })
        .collect();

    Ok(render(ServicesTemplate { services }))
}

async fn offers(state: web::Data<AppState>) -> Result<HttpResponse> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let rows = catalog::all_offers(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let offers = rows
        .into_iter()
        .map(|offer| AdminOfferView {
            id: offer.id,
            title: offer.title,
            description: offer.description,
            discount: fmt_price(offer.discount_percent),
            currently_valid: offer.active == 1 && offer.valid_until.as_str() >= today.as_str(),
            valid_until: offer.valid_until,
            active: offer.active == 1,
        })
        .collect();

    Ok(render(OffersTemplate { offers }))
}

async fn settings_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let settings = catalog::settings_map(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let stats = catalog::settings_stats(&state.db, Utc::now().date_naive())
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let get = |key: &str| settings.get(key).cloned().unwrap_or_default();
    Ok(render(SettingsTemplate {
        site_title: get("site_title"),
        site_description: get("site_description"),
        contact_phone: get("contact_phone"),
        contact_email: get("contact_email"),
        address: get("address"),
        show_prices: get("show_prices") == "1",
        total_services: stats.total_services,
        active_offers: stats.active_offers,
        monthly_bookings: stats.monthly_bookings,
    }))
}

async fn revenue(
    state: web::Data<AppState>,
    query: web::Query<RevenueQuery>,
) -> Result<HttpResponse> {
    let filter_type = query.filter.clone().unwrap_or_else(|| "all".to_string());
    let filter_value = query.value.clone().unwrap_or_default();

    let filter = match (filter_type.as_str(), filter_value.is_empty()) {
        ("day", false) => RevenueFilter::Day(filter_value.clone()),
        ("month", false) => RevenueFilter::Month(filter_value.clone()),
        ("year", false) => RevenueFilter::Year(filter_value.clone()),
        _ => RevenueFilter::All,
    };

    let (records, total) = ledger::revenue_report(&state.db, &filter)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let records = records
        .into_iter()
        .map(|record| RevenueView {
            display_no: record.display_no,
            customer_name: record.customer_name,
            service_name: record.service_name,
            revenue: fmt_amount(record.revenue),
            created_at: record.created_at,
        })
        .collect();

    Ok(render(RevenueTemplate {
        records,
        total: fmt_amount(total),
        filter_type,
        filter_value,
    }))
}

fn to_view(row: BookingRow) -> BookingView {
    let email = row.email.unwrap_or_default();
    BookingView {
        display_no: row.display_no,
        id: row.id,
        customer_name: row.customer_name,
        phone: row.phone,
        has_email: !email.trim().is_empty(),
        email,
        address: row.address,
        service_name: row.service_name,
        booking_date: row.booking_date,
        booking_time: row.booking_time,
        status: row.status,
        revenue: fmt_amount(row.revenue),
        created_at: row.created_at,
    }
}
