use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::with_flash;
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::category::{Category, CategoryForm, CATEGORY_COLORS};
use crate::models::settings::Setting;
use crate::slug::slugify;

// ── Categories ─────────────────────────────────────────

#[get("/categories")]
pub fn categories_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let categories: Vec<serde_json::Value> = Category::list(pool)
        .iter()
        .map(|c| {
            json!({
                "category": c,
                "post_count": Category::count_posts(pool, c.id),
            })
        })
        .collect();

    let context = json!({
        "page_title": "Categories",
        "categories": categories,
        "colors": CATEGORY_COLORS,
        "settings": Setting::public(pool),
    });

    Template::render("admin/categories/list", &with_flash(context, flash))
}

#[derive(FromForm)]
pub struct CategoryFormData {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
}

impl CategoryFormData {
    /// The submitted slug, or one built from the name, normalised.
    fn to_model(&self) -> Result<CategoryForm, String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        let source = if self.slug.trim().is_empty() { &self.name } else { &self.slug };
        let slug = slugify(source);
        if slug.is_empty() {
            return Err("Slug is required".to_string());
        }
        Ok(CategoryForm {
            name: self.name.clone(),
            slug,
            description: Some(self.description.clone()),
            color: self.color.clone(),
        })
    }
}

#[post("/categories/new", data = "<form>")]
pub fn category_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    form: Form<CategoryFormData>,
) -> Flash<Redirect> {
    let result = form.to_model().and_then(|c| Category::create(pool, &c));
    match result {
        Ok(id) => {
            log::info!("Created category {}", id);
            Flash::success(Redirect::to("/admin/categories"), "Category created")
        }
        Err(e) => Flash::error(Redirect::to("/admin/categories"), e),
    }
}

#[get("/categories/<id>/edit")]
pub fn category_edit(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Option<Template> {
    let category = Category::find_by_id(pool, id)?;
    let context = json!({
        "page_title": "Edit Category",
        "category": category,
        "colors": CATEGORY_COLORS,
        "settings": Setting::public(pool),
    });
    Some(Template::render("admin/categories/edit", &with_flash(context, flash)))
}

#[post("/categories/<id>/edit", data = "<form>")]
pub fn category_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<CategoryFormData>,
) -> Flash<Redirect> {
    match form.to_model().and_then(|c| Category::update(pool, id, &c)) {
        Ok(()) => Flash::success(Redirect::to("/admin/categories"), "Category updated"),
        Err(e) => Flash::error(Redirect::to(format!("/admin/categories/{}/edit", id)), e),
    }
}

#[post("/categories/<id>/delete")]
pub fn category_delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    match Category::delete(pool, id) {
        Ok(()) => {
            log::info!("Deleted category {}", id);
            Flash::success(Redirect::to("/admin/categories"), "Category deleted")
        }
        Err(e) => Flash::error(Redirect::to("/admin/categories"), e),
    }
}
