use actix_web::{web, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    catalog, db, ledger,
    ledger::NewBooking,
    notify::{self, BookingSummary},
    slots,
    state::AppState,
    templates::{fmt_price, render},
};

#[derive(Clone, Debug)]
struct ServiceView {
    id: i64,
    name: String,
    description: String,
    price: String,
    duration: String,
    selected: bool,
}

#[derive(Clone, Debug)]
struct CategoryView {
    name: String,
    services: Vec<ServiceView>,
}

#[derive(Clone, Debug)]
struct OfferView {
    title: String,
    description: String,
    discount: String,
    valid_until: String,
}

#[derive(Clone, Debug)]
struct SlotView {
    code: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Clone, Debug, Default)]
struct SiteView {
    title: String,
    description: String,
    contact_phone: String,
    contact_email: String,
    address: String,
}

#[derive(Clone, Debug, Default)]
struct BookingFormView {
    customer_name: String,
    phone: String,
    email: String,
    address: String,
    service_id: String,
    booking_date: String,
    booking_time: String,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    site: SiteView,
    groups: Vec<CategoryView>,
    offers: Vec<OfferView>,
    show_prices: bool,
}

#[derive(Template)]
#[template(path = "book.html")]
struct BookTemplate {
    site: SiteView,
    groups: Vec<CategoryView>,
    slots: Vec<SlotView>,
    form: BookingFormView,
    errors: Vec<String>,
    show_prices: bool,
}

#[derive(Template)]
#[template(path = "book_success.html")]
struct BookSuccessTemplate {
    site: SiteView,
    customer_name: String,
}

#[derive(Deserialize)]
pub struct BookingForm {
    customer_name: String,
    phone: String,
    email: Option<String>,
    address: String,
    service_id: String,
    booking_date: String,
    booking_time: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/book")
                .route(web::get().to(show_booking_form))
                .route(web::post().to(create_booking)),
        )
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

fn site_view(settings: &HashMap<String, String>) -> SiteView {
    let get = |key: &str| settings.get(key).cloned().unwrap_or_default();
    SiteView {
        title: get("site_title"),
        description: get("site_description"),
        contact_phone: get("contact_phone"),
        contact_email: get("contact_email"),
        address: get("address"),
    }
}

fn category_views(groups: Vec<catalog::CategoryGroup>, selected_service: i64) -> Vec<CategoryView> {
    groups
        .into_iter()
        .map(|group| CategoryView {
            name: group.category,
            services: group
                .services
                .into_iter()
                .map(|service| ServiceView {
                    selected: service.id == selected_service,
                    id: service.id,
                    name: service.name,
                    description: service.description,
                    price: fmt_price(service.price),
                    duration: service.duration,
                })
                .collect(),
        })
        .collect()
}

fn slot_views(selected: &str) -> Vec<SlotView> {
    slots::TIME_SLOTS
        .iter()
        .map(|&(code, label)| SlotView {
            code,
            label,
            selected: code == selected,
        })
        .collect()
}

async fn home(state: web::Data<AppState>) -> Result<HttpResponse> {
    let settings = catalog::settings_map(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let groups = catalog::active_services_grouped(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let offers = catalog::valid_offers(&state.db, Utc::now().date_naive())
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let show_prices = catalog::show_prices(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(render(HomeTemplate {
        site: site_view(&settings),
        groups: category_views(groups, 0),
        offers: offers
            .into_iter()
            .map(|offer| OfferView {
                title: offer.title,
                description: offer.description,
                discount: fmt_price(offer.discount_percent),
                valid_until: offer.valid_until,
            })
            .collect(),
        show_prices,
    }))
}

async fn show_booking_form(state: web::Data<AppState>) -> Result<HttpResponse> {
    booking_form_page(&state, BookingFormView::default(), Vec::new()).await
}

async fn booking_form_page(
    state: &web::Data<AppState>,
    form: BookingFormView,
    errors: Vec<String>,
) -> Result<HttpResponse> {
    let settings = catalog::settings_map(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let groups = catalog::active_services_grouped(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let show_prices = catalog::show_prices(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let selected_service = form.service_id.trim().parse::<i64>().unwrap_or_default();
    Ok(render(BookTemplate {
        site: site_view(&settings),
        groups: category_views(groups, selected_service),
        slots: slot_views(&form.booking_time),
        form,
        errors,
        show_prices,
    }))
}

async fn create_booking(
    state: web::Data<AppState>,
    form: web::Form<BookingForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();

    if form.customer_name.trim().is_empty() {
        errors.push("Full name is required.".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("Phone number is required.".to_string());
    }
    if form.address.trim().is_empty() {
        errors.push("Service address is required.".to_string());
    }
    if form.booking_date.trim().is_empty() {
        errors.push("Please pick a date.".to_string());
    }
    if !slots::is_valid_slot(&form.booking_time) {
        errors.push("Please pick a time slot.".to_string());
    }

    let service_id = form.service_id.trim().parse::<i64>().ok();
    let service_name = match service_id {
        Some(id) => match catalog::service_name(&state.db, id).await {
            Ok(name) => Some(name),
            Err(_) => None,
        },
        None => None,
    };
    if service_name.is_none() {
        errors.push("Please select a service.".to_string());
    }

    if !errors.is_empty() {
        return booking_form_page(
            &state,
            BookingFormView {
                customer_name: form.customer_name,
                phone: form.phone,
                email: form.email.unwrap_or_default(),
                address: form.address,
                service_id: form.service_id,
                booking_date: form.booking_date,
                booking_time: form.booking_time,
            },
            errors,
        )
        .await;
    }

    let service_id = service_id.unwrap_or_default();
    let service_name = service_name.unwrap_or_default();
    let email = form
        .email
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let booking = NewBooking {
        customer_name: form.customer_name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        email,
        address: form.address.trim().to_string(),
        service_id,
        booking_date: form.booking_date.trim().to_string(),
        booking_time: form.booking_time.clone(),
    };

    ledger::create_booking(&state.db, &booking)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    // Side effects are best-effort: the booking row is the only
    // durability guarantee.
    db::queue_admin_flash(
        &state.db,
        &format!(
            "New booking: {} ({}) booked {} for {} at {}",
            booking.customer_name,
            booking.phone,
            service_name,
            booking.booking_date,
            booking.booking_time
        ),
    )
    .await;

    notify::notify_booking(
        &state.config.smtp,
        &BookingSummary {
            customer_name: booking.customer_name.clone(),
            phone: booking.phone.clone(),
            email: booking.email.clone(),
            address: booking.address.clone(),
            service_name,
            booking_date: booking.booking_date.clone(),
            booking_time: booking.booking_time.clone(),
        },
    )
    .await;

    let settings = catalog::settings_map(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(render(BookSuccessTemplate {
        site: site_view(&settings),
        customer_name: booking.customer_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceRow;

    fn service(id: i64, name: &str) -> ServiceRow {
        ServiceRow {
            id,
            name: name.to_string(),
            description: String::new(),
            price: 800.0,
            duration: "1 hour".to_string(),
            category: "AC".to_string(),
            image: None,
            active: 1,
        }
    }

    #[test]
    fn slot_selection_survives_a_form_rerender() {
        let views = slot_views("14:00");
        for view in &views {
            assert_eq!(view.selected, view.code == "14:00");
        }
        assert!(views.iter().any(|view| view.selected));

        // Nothing chosen yet: every slot stays unselected.
        assert!(slot_views("").iter().all(|view| !view.selected));
    }

    #[test]
    fn service_selection_survives_a_form_rerender() {
        let groups = vec![catalog::CategoryGroup {
            category: "AC".to_string(),
            services: vec![service(1, "AC Repair"), service(2, "AC Cleaning")],
        }];

        let views = category_views(groups.clone(), 2);
        assert!(!views[0].services[0].selected);
        assert!(views[0].services[1].selected);

        let views = category_views(groups, 0);
        assert!(views[0].services.iter().all(|view| !view.selected));
    }
}
