use rocket::response::content::{RawText, RawXml};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::post::BlogPost;
use crate::models::related::RelatedArticle;
use crate::models::settings::Setting;
use crate::models::subcategory::Subcategory;
use crate::preview::PreviewPost;
use crate::seo::{self, PageMeta, SiteInfo};

/// Shared layout values every public template expects.
fn layout(pool: &DbPool, site: &SiteInfo, meta: &PageMeta<'_>, ld: &[Value]) -> Value {
    let ld_json: String = ld.iter().map(seo::ld_json_script).collect::<Vec<_>>().join("\n");
    json!({
        "site_name": site.name,
        "site_tagline": site.tagline,
        "settings": Setting::public(pool),
        "nav_categories": Category::list(pool),
        "meta": seo::build_meta(site, meta),
        "ld_json": ld_json,
    })
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

// ── Home ───────────────────────────────────────────────

#[get("/")]
pub fn homepage(pool: &State<DbPool>) -> Template {
    let site = SiteInfo::load(pool);
    let count = match Setting::get_i64(pool, "home_recent_posts") {
        n if n <= 0 => 3,
        n => n.min(12),
    };
    let recent = BlogPost::recent(pool, count);
    let ld = seo::home_jsonld(&site, &recent);
    let meta = PageMeta {
        title: None,
        description: "",
        path: "/",
        og_type: "website",
        image: None,
    };

    let context = merge(
        layout(pool, &site, &meta, &ld),
        json!({ "posts": BlogPost::with_relations(pool, recent) }),
    );
    Template::render("public/home", &context)
}

// ── Blog ───────────────────────────────────────────────

#[get("/blog")]
pub fn blog_list(pool: &State<DbPool>) -> Template {
    let site = SiteInfo::load(pool);
    let posts = BlogPost::with_relations(pool, BlogPost::list(pool, true));
    let meta = PageMeta {
        title: Some("Blog"),
        description: "Product reviews and buying guides",
        path: "/blog",
        og_type: "website",
        image: None,
    };

    let context = merge(
        layout(pool, &site, &meta, &[]),
        json!({ "heading": "All Articles", "posts": posts }),
    );
    Template::render("public/listing", &context)
}

#[get("/blog/<slug>")]
pub fn blog_single(pool: &State<DbPool>, slug: &str) -> Option<Template> {
    let post = BlogPost::find_by_slug(pool, slug, true)?;
    let related = BlogPost::with_relations(pool, RelatedArticle::resolve(pool, &post, true));
    let post = BlogPost::with_relations(pool, vec![post]).into_iter().next()?;

    let products: Vec<Value> = post
        .products
        .iter()
        .map(|p| {
            let mut v = json!(p);
            v["asin"] = json!(p.asin());
            v
        })
        .collect();

    let site = SiteInfo::load(pool);
    let path = format!("/blog/{}", post.post.slug);
    let mut ld = vec![seo::post_jsonld(&site, &post)];
    if let Some(products) = seo::products_jsonld(&site, &post.products) {
        ld.push(products);
    }
    let meta = PageMeta {
        title: Some(&post.post.title),
        description: &post.post.excerpt,
        path: &path,
        og_type: "article",
        image: post.post.featured_image_url.as_deref(),
    };

    let context = merge(
        layout(pool, &site, &meta, &ld),
        json!({
            "post": post,
            "products": products,
            "related": related,
            "preview": false,
        }),
    );
    Some(Template::render("public/post", &context))
}

/// Render the article template from data that has not been saved.
pub fn render_preview(pool: &DbPool, post: &PreviewPost) -> Template {
    let site = SiteInfo::load(pool);
    let title = if post.title.is_empty() { "Preview" } else { post.title.as_str() };
    let meta = PageMeta {
        title: Some(title),
        description: &post.excerpt,
        path: "/admin/posts/preview",
        og_type: "article",
        image: post.featured_image_url.as_deref(),
    };
    let context = merge(
        layout(pool, &site, &meta, &[]),
        json!({
            "post": post,
            "products": post.products,
            "related": post.related_articles,
            "preview": true,
        }),
    );
    Template::render("public/post", &context)
}

// ── Groupings ──────────────────────────────────────────

#[get("/category/<slug>")]
pub fn category_page(pool: &State<DbPool>, slug: &str) -> Option<Template> {
    let category = Category::find_by_slug(pool, slug)?;
    let site = SiteInfo::load(pool);
    let posts = BlogPost::with_relations(pool, BlogPost::by_category_slug(pool, slug, true));
    let path = format!("/category/{}", category.slug);
    let meta = PageMeta {
        title: Some(&category.name),
        description: category.description.as_deref().unwrap_or(""),
        path: &path,
        og_type: "website",
        image: None,
    };

    let context = merge(
        layout(pool, &site, &meta, &[]),
        json!({
            "heading": category.name,
            "description": category.description,
            "subcategories": Subcategory::list(pool, Some(category.id)),
            "posts": posts,
        }),
    );
    Some(Template::render("public/listing", &context))
}

#[get("/subcategory/<slug>")]
pub fn subcategory_page(pool: &State<DbPool>, slug: &str) -> Option<Template> {
    let subcategory = Subcategory::find_by_slug(pool, slug)?;
    let parent = Category::find_by_id(pool, subcategory.category_id);
    let site = SiteInfo::load(pool);
    let posts = BlogPost::with_relations(pool, BlogPost::by_subcategory_slug(pool, slug, true));
    let path = format!("/subcategory/{}", subcategory.slug);
    let meta = PageMeta {
        title: Some(&subcategory.name),
        description: subcategory.description.as_deref().unwrap_or(""),
        path: &path,
        og_type: "website",
        image: None,
    };

    let context = merge(
        layout(pool, &site, &meta, &[]),
        json!({
            "heading": subcategory.name,
            "description": subcategory.description,
            "parent": parent,
            "posts": posts,
        }),
    );
    Some(Template::render("public/listing", &context))
}

// ── Feeds ──────────────────────────────────────────────

#[get("/feed")]
pub fn rss_feed(pool: &State<DbPool>) -> RawXml<String> {
    RawXml(crate::rss::generate_feed(pool))
}

#[get("/sitemap.xml")]
pub fn sitemap(pool: &State<DbPool>) -> RawXml<String> {
    RawXml(seo::generate_sitemap(pool))
}

#[get("/robots.txt")]
pub fn robots(pool: &State<DbPool>) -> RawText<String> {
    RawText(seo::robots_txt(pool))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        homepage,
        blog_list,
        blog_single,
        category_page,
        subcategory_page,
        rss_feed,
        sitemap,
        robots,
    ]
}
