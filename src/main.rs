#[macro_use]
extern crate rocket;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::FileServer;
use rocket::http::Header;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::figment::Figment;
use rocket::{Build, Request, Rocket};
use rocket_dyn_templates::Template;
use serde_json::json;

mod analytics;
mod auth;
mod boot;
mod db;
mod images;
mod models;
mod preview;
mod rate_limit;
mod routes;
mod rss;
mod seo;
mod slug;
mod tasks;

#[cfg(test)]
mod tests;

use db::DbPool;
use models::settings::Setting;
use rate_limit::RateLimiter;
use std::sync::Arc;

/// Admin pages and their redirects must never be served from cache.
pub struct NoCacheAdmin;

#[rocket::async_trait]
impl Fairing for NoCacheAdmin {
    fn info(&self) -> Info {
        Info { name: "No-Cache Admin Pages", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut rocket::Response<'r>) {
        if req.uri().path().starts_with("/admin") {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Template {
    let site_name = req
        .rocket()
        .state::<DbPool>()
        .map(|pool| Setting::get_or(pool, "site_name", "PickBettr"))
        .unwrap_or_else(|| "PickBettr".to_string());
    Template::render("public/404", &json!({ "site_name": site_name }))
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Something went wrong on our side.</p><a href='/'>← Home</a></body></html>".to_string())
}

/// Form posts to admin pages without a session land here rather than on a bare 401.
#[catch(401)]
fn admin_unauthorized() -> Redirect {
    Redirect::to("/admin/login")
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let figment = rocket::Config::figment();
    let db_path: String = figment
        .extract_inner("db_path")
        .unwrap_or_else(|_| db::DEFAULT_DB_PATH.to_string());
    let template_dir: String = figment
        .extract_inner("template_dir")
        .unwrap_or_else(|_| "templates".to_string());

    boot::run(&db_path, &template_dir);

    let pool = db::init_pool(&db_path).expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed default settings");

    match auth::cleanup_expired_sessions(&pool) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} expired session(s)", n),
        Err(e) => log::warn!("Session cleanup failed: {}", e),
    }
    if auth::needs_setup(&pool) {
        log::warn!("No admin account yet. Visit /admin/setup to create one.");
    }
    log::info!("Database ready at {}", db_path);

    app(figment, pool)
}

/// Mounted routes, catchers and fairings around an initialized pool.
pub fn app(figment: Figment, pool: DbPool) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(pool)
        .manage(Arc::new(RateLimiter::new()))
        .attach(Template::fairing())
        .attach(NoCacheAdmin)
        .attach(tasks::BackgroundTasks)
        .mount("/static", FileServer::from(boot::STATIC_DIR))
        .mount("/uploads", FileServer::from(images::UPLOAD_DIR))
        .mount("/", routes::public::routes())
        .mount("/admin", routes::admin::routes())
        .mount("/admin", routes::auth::routes())
        .mount("/api", routes::api::routes())
        .register("/", catchers![not_found, server_error])
        .register("/admin", catchers![admin_unauthorized])
        .register("/api", routes::api::catchers())
}
