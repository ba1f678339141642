use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Request, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::ApiUser;
use crate::db::DbPool;
use crate::models::analytics::{Analytics, ClickType, VisitMeta};
use crate::models::library::{LibraryForm, LibraryItem, LibraryPatch, MISSING_FIELDS};
use crate::models::post::{parse_read_time, BlogPost, PostForm};
use crate::models::subcategory::Subcategory;
use crate::preview::{build_preview, PreviewPost, PreviewRequest};
use crate::slug::slugify;

pub type ApiResult = Result<Json<Value>, Custom<Json<Value>>>;

fn api_error(status: Status, msg: impl Into<String>) -> Custom<Json<Value>> {
    Custom(status, Json(json!({ "error": msg.into() })))
}

// ── Tracking ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TrackView {
    pub post_id: Option<i64>,
}

#[post("/analytics/track-view", format = "json", data = "<body>")]
pub fn track_view(pool: &State<DbPool>, meta: VisitMeta, body: Json<TrackView>) -> ApiResult {
    let post_id = match body.post_id.filter(|id| *id > 0) {
        Some(id) => id,
        None => return Err(api_error(Status::BadRequest, "Post ID is required")),
    };

    match Analytics::record_view(pool, post_id, &meta) {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => {
            log::error!("Error tracking view: {}", e);
            Err(Custom(
                Status::InternalServerError,
                Json(json!({ "success": false, "error": e })),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackClick {
    pub product_id: Option<i64>,
    pub post_id: Option<i64>,
    pub click_type: Option<String>,
}

#[post("/analytics/track-click", format = "json", data = "<body>")]
pub fn track_click(pool: &State<DbPool>, meta: VisitMeta, body: Json<TrackClick>) -> ApiResult {
    let (product_id, post_id) = match (
        body.product_id.filter(|id| *id > 0),
        body.post_id.filter(|id| *id > 0),
    ) {
        (Some(product), Some(post)) => (product, post),
        _ => {
            return Err(api_error(
                Status::BadRequest,
                "Product ID and Post ID are required",
            ))
        }
    };
    let click_type = match ClickType::parse(body.click_type.as_deref().unwrap_or("buy_now")) {
        Some(t) => t,
        None => return Err(api_error(Status::BadRequest, "Invalid click type")),
    };

    match Analytics::record_click(pool, product_id, post_id, click_type, &meta) {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => {
            log::error!("Error tracking click: {}", e);
            Err(Custom(
                Status::InternalServerError,
                Json(json!({ "success": false, "error": e })),
            ))
        }
    }
}

// ── Blog posts ─────────────────────────────────────────

/// Drafts are listed only for a signed-in admin asking with `published=false`.
#[get("/blog?<category>&<subcategory>&<published>")]
pub fn blog_list(
    pool: &State<DbPool>,
    user: Option<ApiUser>,
    category: Option<&str>,
    subcategory: Option<&str>,
    published: Option<&str>,
) -> Json<Value> {
    let published_only = published != Some("false") || user.is_none();
    let posts = BlogPost::filtered_by_slugs(
        pool,
        category.filter(|s| !s.is_empty()),
        subcategory.filter(|s| !s.is_empty()),
        published_only,
    );
    Json(json!(BlogPost::with_relations(pool, posts)))
}

#[derive(Debug, Deserialize)]
pub struct BlogCreate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub read_time: Option<i64>,
    pub published: Option<bool>,
}

#[post("/blog", format = "json", data = "<body>")]
pub fn blog_create(_user: ApiUser, pool: &State<DbPool>, body: Json<BlogCreate>) -> ApiResult {
    let title = body.title.clone().unwrap_or_default();
    let slug = slugify(body.slug.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&title));
    let read_time = body.read_time.map(|n| n.to_string());

    let form = PostForm {
        title,
        slug,
        excerpt: body.excerpt.clone().unwrap_or_default(),
        content: body.content.clone().unwrap_or_default(),
        category_id: body.category_id.unwrap_or(0),
        subcategory_id: body.subcategory_id.filter(|id| *id > 0),
        featured_image_url: body.featured_image_url.clone(),
        author_name: body.author_name.clone(),
        author_email: body.author_email.clone(),
        read_time: parse_read_time(read_time.as_deref()),
        published: body.published.unwrap_or(false),
    };

    let id = BlogPost::create(pool, &form).map_err(|e| api_error(Status::BadRequest, e))?;
    log::info!("Created post {} via API", id);
    match BlogPost::find_by_id(pool, id) {
        Some(post) => Ok(Json(json!(post))),
        None => Err(api_error(Status::InternalServerError, "Post was not saved")),
    }
}

// ── Product library ────────────────────────────────────

#[get("/product-library?<subcategory_id>")]
pub fn library_list(pool: &State<DbPool>, subcategory_id: Option<i64>) -> ApiResult {
    LibraryItem::list(pool, subcategory_id)
        .map(|items| Json(json!(items)))
        .map_err(|e| api_error(Status::BadRequest, e))
}

#[derive(Debug, Deserialize)]
pub struct LibraryCreate {
    pub subcategory_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub amazon_affiliate_link: Option<String>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
}

#[post("/product-library", format = "json", data = "<body>")]
pub fn library_create(_user: ApiUser, pool: &State<DbPool>, body: Json<LibraryCreate>) -> ApiResult {
    let form = LibraryForm {
        subcategory_id: body.subcategory_id.unwrap_or(0),
        name: body.name.clone().unwrap_or_default(),
        description: body.description.clone().unwrap_or_default(),
        image_url: body.image_url.clone().unwrap_or_default(),
        amazon_affiliate_link: body.amazon_affiliate_link.clone().unwrap_or_default(),
        is_featured: body.is_featured.unwrap_or(false),
    };
    if !form.is_complete() {
        return Err(api_error(Status::BadRequest, MISSING_FIELDS));
    }

    let id = LibraryItem::create_with_order(pool, &form, body.display_order)
        .map_err(|e| api_error(Status::BadRequest, e))?;
    LibraryItem::find_by_id(pool, id)
        .map(|item| Json(json!(item)))
        .ok_or_else(|| api_error(Status::InternalServerError, "Product was not saved"))
}

#[derive(Debug, Deserialize)]
pub struct LibraryUpdate {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub patch: LibraryPatch,
}

#[put("/product-library", format = "json", data = "<body>")]
pub fn library_update(_user: ApiUser, pool: &State<DbPool>, body: Json<LibraryUpdate>) -> ApiResult {
    let id = match body.id.filter(|id| *id > 0) {
        Some(id) => id,
        None => return Err(api_error(Status::BadRequest, "Missing product id")),
    };
    LibraryItem::patch(pool, id, &body.patch)
        .map(|item| Json(json!(item)))
        .map_err(|e| api_error(Status::BadRequest, e))
}

#[delete("/product-library?<id>")]
pub fn library_delete(_user: ApiUser, pool: &State<DbPool>, id: Option<i64>) -> ApiResult {
    let id = match id.filter(|id| *id > 0) {
        Some(id) => id,
        None => return Err(api_error(Status::BadRequest, "Missing product id")),
    };
    LibraryItem::delete(pool, id)
        .map(|()| Json(json!({ "success": true })))
        .map_err(|e| api_error(Status::BadRequest, e))
}

// ── Editor helpers ─────────────────────────────────────

#[get("/subcategories?<category_id>")]
pub fn subcategories(pool: &State<DbPool>, category_id: Option<i64>) -> Json<Vec<Subcategory>> {
    Json(Subcategory::list(pool, category_id))
}

#[post("/preview", format = "json", data = "<body>")]
pub fn preview(_user: ApiUser, pool: &State<DbPool>, body: Json<PreviewRequest>) -> Json<PreviewPost> {
    Json(build_preview(pool, &body))
}

// ── JSON catchers ──────────────────────────────────────

#[catch(400)]
pub fn bad_request() -> Json<Value> {
    Json(json!({ "error": "Bad request" }))
}

#[catch(401)]
pub fn unauthorized() -> Json<Value> {
    Json(json!({ "error": "Unauthorized" }))
}

#[catch(404)]
pub fn not_found(req: &Request<'_>) -> Json<Value> {
    Json(json!({ "error": format!("No endpoint at {}", req.uri().path()) }))
}

#[catch(422)]
pub fn unprocessable() -> Json<Value> {
    Json(json!({ "error": "Invalid request body" }))
}

#[catch(500)]
pub fn server_error() -> Json<Value> {
    Json(json!({ "success": false, "error": "Internal server error" }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        track_view,
        track_click,
        blog_list,
        blog_create,
        library_list,
        library_create,
        library_update,
        library_delete,
        subcategories,
        preview,
    ]
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, server_error]
}
