use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::analytics::Analytics;
use crate::models::category::Category;
use crate::models::post::BlogPost;
use crate::models::settings::Setting;
use crate::models::subcategory::Subcategory;

// ── Dashboard ──────────────────────────────────────────

#[get("/")]
pub fn dashboard(_admin: AdminUser, pool: &State<DbPool>) -> Template {
    let posts_count = BlogPost::count(pool);
    let published_count = BlogPost::count_published(pool);

    let context = json!({
        "page_title": "Dashboard",
        "posts_count": posts_count,
        "published_count": published_count,
        "draft_count": posts_count - published_count,
        "categories_count": Category::count(pool),
        "subcategories_count": Subcategory::count(pool),
        "total_views": Analytics::total_views(pool),
        "total_clicks": Analytics::total_clicks(pool),
        "recent_posts": BlogPost::with_relations(
            pool,
            BlogPost::list(pool, false).into_iter().take(5).collect(),
        ),
        "settings": Setting::public(pool),
    });

    Template::render("admin/dashboard", &context)
}
