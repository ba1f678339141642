use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::with_flash;
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::settings::Setting;
use crate::models::subcategory::{Subcategory, SubcategoryForm};
use crate::slug::slugify;

// ── Subcategories ──────────────────────────────────────

#[get("/subcategories")]
pub fn subcategories_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "page_title": "Subcategories",
        "subcategories": Subcategory::list_with_parent(pool),
        "categories": Category::list(pool),
        "settings": Setting::public(pool),
    });
    Template::render("admin/subcategories/list", &with_flash(context, flash))
}

#[derive(FromForm)]
pub struct SubcategoryFormData {
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
}

impl SubcategoryFormData {
    fn to_model(&self, pool: &DbPool) -> Result<SubcategoryForm, String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        let category_id = self
            .category_id
            .filter(|id| Category::find_by_id(pool, *id).is_some())
            .ok_or_else(|| "Choose an existing category".to_string())?;
        let source = if self.slug.trim().is_empty() { &self.name } else { &self.slug };
        let slug = slugify(source);
        if slug.is_empty() {
            return Err("Slug is required".to_string());
        }
        Ok(SubcategoryForm {
            category_id,
            name: self.name.clone(),
            slug,
            description: Some(self.description.clone()),
        })
    }
}

#[post("/subcategories/new", data = "<form>")]
pub fn subcategory_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    form: Form<SubcategoryFormData>,
) -> Flash<Redirect> {
    match form.to_model(pool).and_then(|s| Subcategory::create(pool, &s)) {
        Ok(id) => {
            log::info!("Created subcategory {}", id);
            Flash::success(Redirect::to("/admin/subcategories"), "Subcategory created")
        }
        Err(e) => Flash::error(Redirect::to("/admin/subcategories"), e),
    }
}

#[get("/subcategories/<id>/edit")]
pub fn subcategory_edit(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Option<Template> {
    let subcategory = Subcategory::find_by_id(pool, id)?;
    let context = json!({
        "page_title": "Edit Subcategory",
        "subcategory": subcategory,
        "categories": Category::list(pool),
        "settings": Setting::public(pool),
    });
    Some(Template::render("admin/subcategories/edit", &with_flash(context, flash)))
}

#[post("/subcategories/<id>/edit", data = "<form>")]
pub fn subcategory_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<SubcategoryFormData>,
) -> Flash<Redirect> {
    match form.to_model(pool).and_then(|s| Subcategory::update(pool, id, &s)) {
        Ok(()) => Flash::success(Redirect::to("/admin/subcategories"), "Subcategory updated"),
        Err(e) => Flash::error(Redirect::to(format!("/admin/subcategories/{}/edit", id)), e),
    }
}

#[post("/subcategories/<id>/delete")]
pub fn subcategory_delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    match Subcategory::delete(pool, id) {
        Ok(()) => {
            log::info!("Deleted subcategory {}", id);
            Flash::success(Redirect::to("/admin/subcategories"), "Subcategory deleted")
        }
        Err(e) => Flash::error(Redirect::to("/admin/subcategories"), e),
    }
}
