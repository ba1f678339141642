use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::analytics::{summarize, Analytics};
use crate::models::settings::Setting;

// ── Analytics ──────────────────────────────────────────

#[get("/analytics")]
pub fn analytics_page(_admin: AdminUser, pool: &State<DbPool>) -> Template {
    let posts = Analytics::all_post_analytics(pool);
    let summary = summarize(&posts);

    let context = json!({
        "page_title": "Analytics",
        "summary": summary,
        "posts": posts,
        "top_products": Analytics::top_products(pool, 10),
        "devices": Analytics::device_breakdown(pool),
        "recent": Analytics::recent_activity(pool, 10),
        "settings": Setting::public(pool),
    });

    Template::render("admin/analytics", &context)
}
