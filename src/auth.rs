use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::db::DbPool;
use crate::models::settings::Setting;

pub const SESSION_COOKIE: &str = "pickbettr_session";

/// Minimum admin password length accepted by the setup wizard.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Guard for admin pages. Forwards with 401 so the login redirect catches it.
pub struct AdminUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if session_is_valid(request).await {
            Outcome::Success(AdminUser)
        } else {
            Outcome::Forward(Status::Unauthorized)
        }
    }
}

/// Guard for REST writes. Fails with 401, answered by the JSON catcher on `/api`.
pub struct ApiUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ApiUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if session_is_valid(request).await {
            Outcome::Success(ApiUser)
        } else {
            Outcome::Error((Status::Unauthorized, ()))
        }
    }
}

async fn session_is_valid(request: &Request<'_>) -> bool {
    let pool = match request.guard::<&State<DbPool>>().await {
        Outcome::Success(p) => p,
        _ => return false,
    };

    let cookies = request.cookies();
    let session_id = match cookies.get_private(SESSION_COOKIE) {
        Some(c) => c.value().to_string(),
        None => return false,
    };

    if validate_session(pool, &session_id) {
        true
    } else {
        cookies.remove_private(Cookie::from(SESSION_COOKIE));
        false
    }
}

/// Real client address. Proxy headers are checked in order:
/// CF-Connecting-IP, True-Client-IP, X-Real-IP, then the first hop of
/// X-Forwarded-For. Falls back to the socket peer.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientIp(client_ip(request)))
    }
}

pub fn client_ip(request: &Request<'_>) -> String {
    let headers = request.headers();

    for name in ["CF-Connecting-IP", "True-Client-IP", "X-Real-IP"] {
        if let Some(ip) = headers.get_one(name) {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    request
        .client_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// True on a fresh install, before the admin account exists.
pub fn needs_setup(pool: &DbPool) -> bool {
    let email = Setting::get_or(pool, "admin_email", "");
    let hash = Setting::get_or(pool, "admin_password_hash", "");
    email.is_empty() || hash.is_empty()
}

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Email must match case-insensitively and the password must verify.
pub fn check_credentials(pool: &DbPool, email: &str, password: &str) -> bool {
    let admin_email = Setting::get_or(pool, "admin_email", "");
    let stored_hash = Setting::get(pool, "admin_password_hash").unwrap_or_default();
    if admin_email.is_empty() || stored_hash.is_empty() {
        return false;
    }
    if !admin_email.eq_ignore_ascii_case(email.trim()) {
        return false;
    }
    verify_password(password, &stored_hash)
}

pub fn create_session(pool: &DbPool, ip: Option<&str>, ua: Option<&str>) -> Result<String, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    let expiry_hours = Setting::get_i64(pool, "session_expiry_hours").max(1);
    let session_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires = now + Duration::hours(expiry_hours);
    let ip_hash = ip.map(hash_ip);

    conn.execute(
        "INSERT INTO sessions (id, created_at, expires_at, ip_hash, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, now, expires, ip_hash, ua],
    )
    .map_err(|e| e.to_string())?;

    Ok(session_id)
}

pub fn validate_session(pool: &DbPool, session_id: &str) -> bool {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return false,
    };

    let now = Utc::now().naive_utc();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sessions WHERE id = ?1 AND expires_at > ?2",
            params![session_id, now],
            |row| row.get(0),
        )
        .unwrap_or(0);

    count > 0
}

pub fn destroy_session(pool: &DbPool, session_id: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])
        .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn set_session_cookie(cookies: &CookieJar<'_>, session_id: &str) {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(rocket::http::SameSite::Strict);
    cookie.set_path("/");
    cookies.add_private(cookie);
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the number of sessions removed.
pub fn cleanup_expired_sessions(pool: &DbPool) -> Result<usize, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let now = Utc::now().naive_utc();
    conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_hash_is_stable_hex() {
        let a = hash_ip("203.0.113.7");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_ip("203.0.113.7"));
        assert_ne!(a, hash_ip("203.0.113.8"));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
