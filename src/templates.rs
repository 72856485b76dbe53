use actix_web::HttpResponse;
use askama::Template;

/// Whole rupees for catalog listings.
pub fn fmt_price(value: f64) -> String {
    format!("{value:.0}")
}

/// Two decimal places for revenue figures.
pub fn fmt_amount(value: f64) -> String {
    format!("{value:.2}")
}

pub fn render<T: Template>(template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(err) => {
            log::error!("Template render error: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
