use rocket::form::Form;
use rocket::http::{CookieJar, Header, Status};
use rocket::response::{self, Redirect, Responder};
use rocket::{Request, State};
use rocket_dyn_templates::Template;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, AdminUser, ClientIp, MIN_PASSWORD_LEN, SESSION_COOKIE};
use crate::db::DbPool;
use crate::models::analytics::VisitMeta;
use crate::models::settings::Setting;
use crate::rate_limit::{RateLimiter, LOGIN_WINDOW};

/// Template response that must never be cached by the browser.
pub struct NoCacheTemplate(pub Template);

impl<'r> Responder<'r, 'static> for NoCacheTemplate {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut resp = self.0.respond_to(req)?;
        resp.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
        resp.set_header(Header::new("Pragma", "no-cache"));
        Ok(resp)
    }
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn login_template(pool: &DbPool, error: Option<&str>, email: &str) -> Template {
    Template::render(
        "admin/login",
        &json!({
            "error": error,
            "email": email,
            "site_name": Setting::get_or(pool, "site_name", "PickBettr"),
        }),
    )
}

#[get("/login")]
pub fn login_page(pool: &State<DbPool>) -> Result<NoCacheTemplate, Redirect> {
    if auth::needs_setup(pool) {
        return Err(Redirect::to("/admin/setup"));
    }
    Ok(NoCacheTemplate(login_template(pool, None, "")))
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    form: Form<LoginForm>,
    pool: &State<DbPool>,
    limiter: &State<Arc<RateLimiter>>,
    client: ClientIp,
    visit: VisitMeta,
    cookies: &CookieJar<'_>,
) -> Result<Redirect, Template> {
    let rate_key = format!("login:{}", auth::hash_ip(&client.0));
    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;

    if !limiter.check_and_record(&rate_key, max_attempts, LOGIN_WINDOW) {
        log::warn!("Login rate limit hit");
        return Err(login_template(
            pool,
            Some("Too many login attempts. Please try again in 15 minutes."),
            &form.email,
        ));
    }

    if !auth::check_credentials(pool, &form.email, &form.password) {
        return Err(login_template(pool, Some("Invalid credentials"), &form.email));
    }

    match auth::create_session(pool, Some(&client.0), visit.user_agent.as_deref()) {
        Ok(session_id) => {
            limiter.reset(&rate_key);
            auth::set_session_cookie(cookies, &session_id);
            log::info!("Admin signed in");
            Ok(Redirect::to("/admin"))
        }
        Err(e) => {
            log::error!("Session creation failed: {}", e);
            Err(login_template(pool, Some("Session creation failed"), &form.email))
        }
    }
}

#[get("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(e) = auth::destroy_session(pool, cookie.value()) {
            log::warn!("Could not remove session: {}", e);
        }
    }
    auth::clear_session_cookie(cookies);
    Redirect::to("/admin/login")
}

/// Catch-all for any /admin/* route whose `AdminUser` guard forwarded.
/// A signed-in admin reaching it asked for a page that does not exist.
#[get("/<_path..>", rank = 99)]
pub fn admin_redirect_to_login(
    _path: std::path::PathBuf,
    admin: Option<AdminUser>,
    pool: &State<DbPool>,
) -> Result<Redirect, Status> {
    if admin.is_some() {
        return Err(Status::NotFound);
    }
    if auth::needs_setup(pool) {
        Ok(Redirect::to("/admin/setup"))
    } else {
        Ok(Redirect::to("/admin/login"))
    }
}

// ── First-Time Setup Wizard ──────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SetupContext {
    error: Option<String>,
    site_name: String,
    site_url: String,
    admin_email: String,
}

#[derive(Debug, FromForm)]
pub struct SetupForm {
    pub site_name: String,
    pub site_url: String,
    pub admin_email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Error text for an invalid setup submission.
pub fn validate_setup(form: &SetupForm) -> Option<&'static str> {
    if form.admin_email.trim().is_empty() || !form.admin_email.contains('@') {
        return Some("A valid email is required.");
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters.");
    }
    if form.password != form.confirm_password {
        return Some("Passwords do not match.");
    }
    None
}

#[get("/setup")]
pub fn setup_page(pool: &State<DbPool>) -> Result<NoCacheTemplate, Redirect> {
    if !auth::needs_setup(pool) {
        return Err(Redirect::to("/admin/login"));
    }
    let ctx = SetupContext {
        error: None,
        site_name: Setting::get_or(pool, "site_name", "PickBettr"),
        site_url: Setting::get_or(pool, "site_url", "http://localhost:8000"),
        admin_email: String::new(),
    };
    Ok(NoCacheTemplate(Template::render("admin/setup", &ctx)))
}

#[post("/setup", data = "<form>")]
pub fn setup_submit(form: Form<SetupForm>, pool: &State<DbPool>) -> Result<Redirect, Template> {
    if !auth::needs_setup(pool) {
        return Ok(Redirect::to("/admin/login"));
    }
    let form = form.into_inner();

    let make_err = |msg: &str, form: &SetupForm| {
        let ctx = SetupContext {
            error: Some(msg.to_string()),
            site_name: form.site_name.clone(),
            site_url: form.site_url.clone(),
            admin_email: form.admin_email.clone(),
        };
        Template::render("admin/setup", &ctx)
    };

    if let Some(msg) = validate_setup(&form) {
        return Err(make_err(msg, &form));
    }

    let hash = auth::hash_password(&form.password)
        .map_err(|_| make_err("Failed to hash password.", &form))?;

    let site_name = form.site_name.trim();
    let site_url = form.site_url.trim().trim_end_matches('/');
    let writes = [
        ("site_name", if site_name.is_empty() { "PickBettr" } else { site_name }),
        ("site_url", site_url),
        ("admin_email", form.admin_email.trim()),
        ("admin_password_hash", hash.as_str()),
    ];
    for (key, value) in writes {
        if key == "site_url" && value.is_empty() {
            continue;
        }
        if let Err(e) = Setting::set(pool, key, value) {
            log::error!("Setup could not save {}: {}", key, e);
            return Err(make_err("Failed to save settings.", &form));
        }
    }

    log::info!("Admin account created");
    Ok(Redirect::to("/admin/login"))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login_page, login_submit, logout, admin_redirect_to_login, setup_page, setup_submit]
}
