use actix_web::{
    body::{BoxBody, MessageBody},
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand_core::OsRng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "gb_session";

/// Authenticated admin identity attached to the request by the gates.
#[derive(Clone, Debug)]
pub struct AdminSession {
    pub username: String,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Check a login attempt against the stored admin record and, when it
/// verifies, issue a session token with an expiry.
pub async fn login(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT password_hash FROM admin_users WHERE username = ? LIMIT 1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some((password_hash,)) = row else {
        return Ok(None);
    };
    if !verify_password(password, &password_hash) {
        return Ok(None);
    }

    purge_expired_sessions(pool).await;

    let token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::hours(ttl_hours)).to_rfc3339();
    sqlx::query("INSERT INTO sessions (token, username, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(username)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(Some(token))
}

pub async fn logout(pool: &SqlitePool, token: &str) {
    let _ = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await;
}

/// Resolve a token to a live session. Expired tokens are deleted and
/// treated as absent.
pub async fn validate_session(pool: &SqlitePool, token: &str) -> Option<AdminSession> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT username, expires_at FROM sessions WHERE token = ? LIMIT 1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .ok()??;

    let (username, expires_at) = row;
    let live = DateTime::parse_from_rfc3339(&expires_at)
        .map(|expiry| expiry > Utc::now())
        .unwrap_or(false);

    if !live {
        logout(pool, token).await;
        return None;
    }

    Some(AdminSession { username })
}

async fn purge_expired_sessions(pool: &SqlitePool) {
    let _ = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await;
}

async fn session_from_request(req: &HttpRequest) -> Option<AdminSession> {
    let state = req.app_data::<web::Data<AppState>>()?;
    let cookie = req.cookie(SESSION_COOKIE)?;
    validate_session(&state.db, cookie.value()).await
}

/// Gate for admin HTML pages: unauthenticated requests are redirected to
/// the login page before any handler work happens.
pub async fn admin_page_gate<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    match session_from_request(req.request()).await {
        Some(session) => {
            req.extensions_mut().insert(session);
            let res = next.call(req).await?;
            Ok(res.map_into_boxed_body())
        }
        None => {
            let response = HttpResponse::SeeOther()
                .append_header((header::LOCATION, "/admin/login"))
                .insert_header((header::CACHE_CONTROL, "no-store"))
                .finish();
            Ok(req.into_response(response))
        }
    }
}

/// Gate for JSON mutation endpoints: unauthenticated calls get a uniform
/// unauthorized payload and nothing executes.
pub async fn admin_api_gate<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    match session_from_request(req.request()).await {
        Some(session) => {
            req.extensions_mut().insert(session);
            let res = next.call(req).await?;
            Ok(res.map_into_boxed_body())
        }
        None => {
            let response = HttpResponse::Unauthorized()
                .json(serde_json::json!({ "success": false, "message": "Unauthorized" }));
            Ok(req.into_response(response))
        }
    }
}

pub fn session_cookie(req: &HttpRequest, token: String, ttl_hours: i64) -> Cookie<'static> {
    let mut builder = Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::hours(ttl_hours));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn clear_session_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(0));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_pool;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }

    #[tokio::test]
    async fn login_issues_token_only_for_valid_credentials() {
        let pool = test_pool().await;
        let hash = hash_password("secret").expect("hash");
        sqlx::query(
            "INSERT INTO admin_users (username, password_hash, created_at) VALUES ('admin', ?, '2024-01-01T00:00:00+00:00')",
        )
        .bind(hash)
        .execute(&pool)
        .await
        .expect("seed admin");

        assert!(login(&pool, "admin", "wrong", 12).await.expect("query").is_none());
        assert!(login(&pool, "nobody", "secret", 12).await.expect("query").is_none());

        let token = login(&pool, "admin", "secret", 12)
            .await
            .expect("query")
            .expect("token");
        let session = validate_session(&pool, &token).await.expect("session");
        assert_eq!(session.username, "admin");
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_removed() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO sessions (token, username, expires_at) VALUES ('stale', 'admin', '2020-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("seed session");

        assert!(validate_session(&pool, "stale").await.is_none());

        let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let pool = test_pool().await;
        let hash = hash_password("secret").expect("hash");
        sqlx::query(
            "INSERT INTO admin_users (username, password_hash, created_at) VALUES ('admin', ?, '2024-01-01T00:00:00+00:00')",
        )
        .bind(hash)
        .execute(&pool)
        .await
        .expect("seed admin");

        let token = login(&pool, "admin", "secret", 12)
            .await
            .expect("query")
            .expect("token");
        logout(&pool, &token).await;
        assert!(validate_session(&pool, &token).await.is_none());
    }
}
