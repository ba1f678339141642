use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Serialize;
use serde_json::{json, Value};

use super::with_flash;
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::library::LibraryItem;
use crate::models::post::{parse_read_time, BlogPost, PostForm};
use crate::models::product::{
    check_product_count, AffiliateProduct, Direction, ProductInput, MAX_PRODUCTS,
};
use crate::models::related::{clean_related_ids, RelatedArticle, MAX_RELATED};
use crate::models::settings::Setting;
use crate::models::subcategory::Subcategory;
use crate::preview::{build_preview, PreviewRequest};
use crate::routes::public::render_preview;
use crate::slug::slugify;

// ── Form data ───────────────────────────────────────────

#[derive(Debug, FromForm, Serialize, Clone, Default)]
pub struct ProductRow {
    #[field(default = String::new())]
    pub name: String,
    #[field(default = String::new())]
    pub description: String,
    #[field(default = String::new())]
    pub image_url: String,
    #[field(default = String::new())]
    pub amazon_affiliate_link: String,
    pub is_featured: bool,
}

impl From<&ProductRow> for ProductInput {
    fn from(row: &ProductRow) -> Self {
        ProductInput {
            name: row.name.clone(),
            description: row.description.clone(),
            image_url: row.image_url.clone(),
            amazon_affiliate_link: row.amazon_affiliate_link.clone(),
            is_featured: row.is_featured,
        }
    }
}

/// Post editor submission. Product rows arrive as `products[i].field`,
/// related picks as repeated `related_ids`.
#[derive(Debug, FromForm, Serialize, Clone)]
pub struct PostFormData {
    pub title: String,
    #[field(default = String::new())]
    pub slug: String,
    #[field(default = String::new())]
    pub excerpt: String,
    #[field(default = String::new())]
    pub content: String,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    #[field(default = String::new())]
    pub featured_image_url: String,
    #[field(default = String::new())]
    pub author_name: String,
    #[field(default = String::new())]
    pub author_email: String,
    #[field(default = String::new())]
    pub read_time: String,
    pub published: bool,
    pub products: Vec<ProductRow>,
    pub related_ids: Vec<i64>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl PostFormData {
    fn to_model(&self) -> PostForm {
        let source = if self.slug.trim().is_empty() { &self.title } else { &self.slug };
        PostForm {
            title: self.title.clone(),
            slug: slugify(source),
            excerpt: self.excerpt.clone(),
            content: self.content.clone(),
            category_id: self.category_id.unwrap_or(0),
            subcategory_id: self.subcategory_id.filter(|id| *id > 0),
            featured_image_url: non_empty(&self.featured_image_url),
            author_name: non_empty(&self.author_name),
            author_email: non_empty(&self.author_email),
            read_time: parse_read_time(Some(&self.read_time)),
            published: self.published,
        }
    }

    fn product_inputs(&self) -> Vec<ProductInput> {
        self.products.iter().map(ProductInput::from).collect()
    }

    /// Everything that can be rejected before a row is written.
    pub(crate) fn validate(&self, post_id: i64) -> Result<(PostForm, Vec<ProductInput>, Vec<i64>), String> {
        let post = self.to_model();
        post.validate()?;
        let products = self.product_inputs();
        check_product_count(&products)?;
        let related = clean_related_ids(post_id, &self.related_ids);
        if related.len() > MAX_RELATED {
            return Err("You can select at most 3 related articles".to_string());
        }
        Ok((post, products, related))
    }

    fn to_preview(&self) -> PreviewRequest {
        PreviewRequest {
            title: Some(self.title.clone()),
            slug: Some(self.to_model().slug),
            excerpt: Some(self.excerpt.clone()),
            content: Some(self.content.clone()),
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            author_name: non_empty(&self.author_name),
            author_email: non_empty(&self.author_email),
            featured_image_url: non_empty(&self.featured_image_url),
            read_time: Some(parse_read_time(Some(&self.read_time))),
            products: self.product_inputs(),
            related_articles: self.related_ids.clone(),
        }
    }
}

/// Existing products first, then blank rows up to the per-post maximum.
fn editor_rows(products: Vec<Value>) -> Vec<Value> {
    let mut rows = products;
    while rows.len() < MAX_PRODUCTS {
        rows.push(json!(ProductRow::default()));
    }
    rows
}

fn editor_context(
    pool: &DbPool,
    page_title: &str,
    post: Value,
    post_id: Option<i64>,
    rows: Vec<Value>,
    related_ids: Vec<i64>,
) -> Value {
    let candidates: Vec<BlogPost> = BlogPost::list(pool, false)
        .into_iter()
        .filter(|p| Some(p.id) != post_id)
        .collect();
    let subcategory_id = post.get("subcategory_id").and_then(|v| v.as_i64());
    let library = match (post_id, subcategory_id) {
        (Some(_), Some(sid)) => LibraryItem::list(pool, Some(sid)).unwrap_or_else(|e| {
            log::error!("Error fetching product library: {}", e);
            vec![]
        }),
        _ => vec![],
    };

    json!({
        "page_title": page_title,
        "post": post,
        "post_id": post_id,
        "product_rows": editor_rows(rows),
        "products": post_id.map(|id| AffiliateProduct::list_for_post(pool, id)).unwrap_or_default(),
        "related_ids": related_ids,
        "candidates": candidates,
        "library": library,
        "categories": Category::list(pool),
        "subcategories": Subcategory::list_with_parent(pool),
        "max_related": MAX_RELATED,
        "settings": Setting::public(pool),
    })
}

/// Re-render the editor with what was submitted and an error.
fn editor_with_error(pool: &DbPool, form: &PostFormData, post_id: Option<i64>, error: &str) -> Template {
    let title = if post_id.is_some() { "Edit Post" } else { "New Post" };
    let rows = form.products.iter().map(|r| json!(r)).collect();
    let mut context = editor_context(pool, title, json!(form), post_id, rows, form.related_ids.clone());
    context["flash_kind"] = json!("error");
    context["flash_msg"] = json!(error);
    Template::render("admin/posts/edit", &context)
}

// ── Posts ───────────────────────────────────────────────

#[get("/posts")]
pub fn posts_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let posts = BlogPost::with_relations(pool, BlogPost::list(pool, false));
    let context = json!({
        "page_title": "Posts",
        "posts": posts,
        "count_all": BlogPost::count(pool),
        "count_published": BlogPost::count_published(pool),
        "settings": Setting::public(pool),
    });
    Template::render("admin/posts/list", &with_flash(context, flash))
}

#[get("/posts/new")]
pub fn posts_new(_admin: AdminUser, pool: &State<DbPool>) -> Template {
    let post = json!({
        "read_time": crate::models::post::DEFAULT_READ_TIME,
        "published": false,
    });
    let context = editor_context(pool, "New Post", post, None, vec![], vec![]);
    Template::render("admin/posts/edit", &context)
}

#[post("/posts/new", data = "<form>")]
pub fn posts_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    form: Form<PostFormData>,
) -> Result<Flash<Redirect>, Template> {
    let (post, products, related) = form
        .validate(0)
        .map_err(|e| editor_with_error(pool, &form, None, &e))?;

    let id = BlogPost::create(pool, &post).map_err(|e| {
        log::error!("Error creating post: {}", e);
        editor_with_error(pool, &form, None, &e)
    })?;

    let mut warnings = Vec::new();
    if let Err(e) = AffiliateProduct::replace_for_post(pool, id, &products) {
        log::error!("Error saving products for post {}: {}", id, e);
        warnings.push(e);
    }
    if let Err(e) = RelatedArticle::set_for_post(pool, id, &related) {
        log::error!("Error saving related articles for post {}: {}", id, e);
        warnings.push(e);
    }

    log::info!("Created post {} ({})", id, post.slug);
    let target = Redirect::to(format!("/admin/posts/{}/edit", id));
    if warnings.is_empty() {
        Ok(Flash::success(target, "Post created"))
    } else {
        Ok(Flash::warning(target, format!("Post created, but: {}", warnings.join("; "))))
    }
}

#[get("/posts/<id>/edit")]
pub fn posts_edit(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Option<Template> {
    let post = BlogPost::find_by_id(pool, id)?;
    let rows = AffiliateProduct::list_for_post(pool, id)
        .iter()
        .map(|p| json!(p))
        .collect();
    let related_ids = RelatedArticle::ids_for_post(pool, id);
    let context = editor_context(pool, "Edit Post", json!(post), Some(id), rows, related_ids);
    Some(Template::render("admin/posts/edit", &with_flash(context, flash)))
}

#[post("/posts/<id>/edit", data = "<form>")]
pub fn posts_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<PostFormData>,
) -> Result<Flash<Redirect>, Template> {
    let (post, products, related) = form
        .validate(id)
        .map_err(|e| editor_with_error(pool, &form, Some(id), &e))?;

    BlogPost::update(pool, id, &post).map_err(|e| {
        log::error!("Error updating post {}: {}", id, e);
        editor_with_error(pool, &form, Some(id), &e)
    })?;
    AffiliateProduct::replace_for_post(pool, id, &products)
        .map_err(|e| editor_with_error(pool, &form, Some(id), &e))?;
    RelatedArticle::set_for_post(pool, id, &related)
        .map_err(|e| editor_with_error(pool, &form, Some(id), &e))?;

    Ok(Flash::success(
        Redirect::to(format!("/admin/posts/{}/edit", id)),
        "Post updated",
    ))
}

#[post("/posts/<id>/delete")]
pub fn posts_delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    match BlogPost::delete(pool, id) {
        Ok(()) => {
            log::info!("Deleted post {}", id);
            Flash::success(Redirect::to("/admin/posts"), "Post deleted")
        }
        Err(e) => Flash::error(Redirect::to("/admin/posts"), e),
    }
}

/// Render the unsaved editor contents with the public article template.
#[post("/posts/preview", data = "<form>")]
pub fn posts_preview(_admin: AdminUser, pool: &State<DbPool>, form: Form<PostFormData>) -> Template {
    render_preview(pool, &build_preview(pool, &form.to_preview()))
}

// ── Products on a post ──────────────────────────────────

#[derive(Debug, FromForm)]
pub struct LibraryPick {
    pub library_item_id: Option<i64>,
}

#[post("/posts/<id>/products/add", data = "<form>")]
pub fn product_add_from_library(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<LibraryPick>,
) -> Flash<Redirect> {
    let back = Redirect::to(format!("/admin/posts/{}/edit", id));
    let item = match form.library_item_id.and_then(|lid| LibraryItem::find_by_id(pool, lid)) {
        Some(item) => item,
        None => return Flash::error(back, "Choose a product from the library"),
    };
    match AffiliateProduct::add_from_library(pool, id, &item) {
        Ok(_) => Flash::success(back, format!("Added {}", item.name)),
        Err(e) => Flash::error(back, e),
    }
}

#[post("/posts/<id>/products/<product_id>/remove")]
pub fn product_remove(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    product_id: i64,
) -> Flash<Redirect> {
    let back = Redirect::to(format!("/admin/posts/{}/edit", id));
    match AffiliateProduct::remove(pool, id, product_id) {
        Ok(()) => Flash::success(back, "Product removed"),
        Err(e) => Flash::error(back, e),
    }
}

#[post("/posts/<id>/products/<product_id>/move/<direction>")]
pub fn product_move(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    product_id: i64,
    direction: &str,
) -> Flash<Redirect> {
    let back = Redirect::to(format!("/admin/posts/{}/edit", id));
    let direction = match Direction::parse(direction) {
        Some(d) => d,
        None => return Flash::error(back, "Unknown direction"),
    };
    match AffiliateProduct::move_product(pool, id, product_id, direction) {
        Ok(()) => Flash::success(back, "Order updated"),
        Err(e) => Flash::error(back, e),
    }
}
