use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, Message, SmtpTransport,
    Transport,
};

use crate::{config::SmtpConfig, slots};

/// Everything the operator email needs about a fresh booking.
#[derive(Debug, Clone)]
pub struct BookingSummary {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub service_name: String,
    pub booking_date: String,
    pub booking_time: String,
}

/// Send the new-booking email to the operator address. Best-effort: every
/// failure is logged and swallowed so the booking itself never fails.
pub async fn notify_booking(config: &SmtpConfig, summary: &BookingSummary) {
    if !config.enabled() {
        return;
    }

    let config = config.clone();
    let subject = format!("New Booking - {}", summary.service_name);
    let body = format_body(summary);

    let result = tokio::task::spawn_blocking(move || send_mail(&config, &subject, body)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("Booking notification failed: {err}"),
        Err(err) => log::warn!("Booking notification task failed: {err}"),
    }
}

fn format_body(summary: &BookingSummary) -> String {
    format!(
        "New Booking Received!\n\n\
         Customer Details:\n\
         Name: {}\n\
         Phone: {}\n\
         Email: {}\n\
         Address: {}\n\n\
         Booking Details:\n\
         Service: {}\n\
         Date: {}\n\
         Time: {}\n\n\
         Please contact the customer to confirm the appointment.\n\n\
         Green Breeze Admin Panel\n",
        summary.customer_name,
        summary.phone,
        summary.email.as_deref().unwrap_or("Not provided"),
        summary.address,
        summary.service_name,
        summary.booking_date,
        slots::slot_label(&summary.booking_time),
    )
}

fn send_mail(
    config: &SmtpConfig,
    subject: &str,
    body: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let operator: Mailbox = config.operator_email.parse()?;
    let message = Message::builder()
        .from(operator.clone())
        .to(operator)
        .subject(subject)
        .body(body)?;

    let mut builder = SmtpTransport::relay(&config.server)?.port(config.port);
    if !config.username.trim().is_empty() {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
    }

    builder.build().send(&message)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> BookingSummary {
        BookingSummary {
            customer_name: "Asha Rao".into(),
            phone: "9000000000".into(),
            email: None,
            address: "12 Lake Road".into(),
            service_name: "AC Repair".into(),
            booking_date: "2024-06-01".into(),
            booking_time: "14:00".into(),
        }
    }

    #[test]
    fn body_uses_slot_labels_and_marks_missing_email() {
        let body = format_body(&summary());
        assert!(body.contains("Time: 02:00 PM - 03:00 PM"));
        assert!(body.contains("Email: Not provided"));
        assert!(body.contains("Service: AC Repair"));
    }

    #[test]
    fn unknown_slot_codes_render_verbatim() {
        let mut summary = summary();
        summary.booking_time = "13:30".into();
        summary.email = Some("asha@example.com".into());
        let body = format_body(&summary);
        assert!(body.contains("Time: 13:30"));
        assert!(body.contains("Email: asha@example.com"));
    }

    #[tokio::test]
    async fn disabled_transport_is_a_silent_no_op() {
        let config = SmtpConfig {
            server: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            operator_email: String::new(),
        };
        notify_booking(&config, &summary()).await;
    }
}
