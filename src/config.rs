use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub admin_username: String,
    pub admin_password: String,
    pub allowed_image_exts: Vec<String>,
    pub smtp: SmtpConfig,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub operator_email: String,
}

impl SmtpConfig {
    pub fn enabled(&self) -> bool {
        !(self.server.trim().is_empty() || self.operator_email.trim().is_empty())
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        if admin_password == "admin" {
            log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/green_breeze.db".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8080),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(12),
            admin_username: env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string()),
            admin_password,
            allowed_image_exts: env::var("ALLOWED_IMAGE_EXTS")
                .unwrap_or_else(|_| "png,jpg,jpeg,gif".to_string())
                .split(',')
                .map(|ext| ext.trim().to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            smtp: SmtpConfig {
                server: env::var("SMTP_SERVER").unwrap_or_default(),
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                operator_email: env::var("OPERATOR_EMAIL").unwrap_or_default(),
            },
        }
    }
}
