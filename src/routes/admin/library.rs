use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::with_flash;
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::library::{LibraryForm, LibraryItem};
use crate::models::product::Direction;
use crate::models::settings::Setting;
use crate::models::subcategory::Subcategory;

// ── Product Library ────────────────────────────────────

#[get("/library?<subcategory_id>&<q>")]
pub fn library_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    subcategory_id: Option<i64>,
    q: Option<String>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let subcategory_id = subcategory_id.filter(|id| *id > 0);
    let query = q.unwrap_or_default();
    let items = LibraryItem::search(pool, subcategory_id, &query);

    let context = json!({
        "page_title": "Product Library",
        "items": items,
        "subcategories": Subcategory::list_with_parent(pool),
        "subcategory_filter": subcategory_id,
        "q": query,
        "settings": Setting::public(pool),
    });
    Template::render("admin/library/list", &with_flash(context, flash))
}

#[get("/library/new?<subcategory_id>")]
pub fn library_new(
    _admin: AdminUser,
    pool: &State<DbPool>,
    subcategory_id: Option<i64>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "page_title": "New Library Product",
        "item": null,
        "selected_subcategory": subcategory_id,
        "subcategories": Subcategory::list_with_parent(pool),
        "settings": Setting::public(pool),
    });
    Template::render("admin/library/edit", &with_flash(context, flash))
}

#[derive(FromForm)]
pub struct LibraryFormData {
    pub subcategory_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub amazon_affiliate_link: String,
    pub is_featured: bool,
}

impl From<&LibraryFormData> for LibraryForm {
    fn from(f: &LibraryFormData) -> Self {
        LibraryForm {
            subcategory_id: f.subcategory_id.unwrap_or(0),
            name: f.name.clone(),
            description: f.description.clone(),
            image_url: f.image_url.clone(),
            amazon_affiliate_link: f.amazon_affiliate_link.clone(),
            is_featured: f.is_featured,
        }
    }
}

fn list_url(subcategory_id: Option<i64>) -> String {
    match subcategory_id.filter(|id| *id > 0) {
        Some(id) => format!("/admin/library?subcategory_id={}", id),
        None => "/admin/library".to_string(),
    }
}

#[post("/library/new", data = "<form>")]
pub fn library_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    form: Form<LibraryFormData>,
) -> Flash<Redirect> {
    match LibraryItem::create(pool, &LibraryForm::from(&*form)) {
        Ok(id) => {
            log::info!("Created library product {}", id);
            Flash::success(Redirect::to(list_url(form.subcategory_id)), "Product added to library")
        }
        Err(e) => Flash::error(Redirect::to("/admin/library/new"), e),
    }
}

#[get("/library/<id>/edit")]
pub fn library_edit(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Option<Template> {
    let item = LibraryItem::find_by_id(pool, id)?;
    let context = json!({
        "page_title": "Edit Library Product",
        "selected_subcategory": item.subcategory_id,
        "item": item,
        "subcategories": Subcategory::list_with_parent(pool),
        "settings": Setting::public(pool),
    });
    Some(Template::render("admin/library/edit", &with_flash(context, flash)))
}

#[post("/library/<id>/edit", data = "<form>")]
pub fn library_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<LibraryFormData>,
) -> Flash<Redirect> {
    match LibraryItem::update(pool, id, &LibraryForm::from(&*form)) {
        Ok(()) => Flash::success(Redirect::to(list_url(form.subcategory_id)), "Product updated"),
        Err(e) => Flash::error(Redirect::to(format!("/admin/library/{}/edit", id)), e),
    }
}

#[post("/library/<id>/delete")]
pub fn library_delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = list_url(LibraryItem::find_by_id(pool, id).map(|i| i.subcategory_id));
    match LibraryItem::delete(pool, id) {
        Ok(()) => Flash::success(Redirect::to(back), "Product removed from library"),
        Err(e) => Flash::error(Redirect::to(back), e),
    }
}

#[post("/library/<id>/move/<direction>")]
pub fn library_move(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    direction: &str,
) -> Flash<Redirect> {
    let back = list_url(LibraryItem::find_by_id(pool, id).map(|i| i.subcategory_id));
    let direction = match Direction::parse(direction) {
        Some(d) => d,
        None => return Flash::error(Redirect::to(back), "Unknown direction"),
    };
    match LibraryItem::move_item(pool, id, direction) {
        Ok(()) => Flash::success(Redirect::to(back), "Order updated"),
        Err(e) => Flash::error(Redirect::to(back), e),
    }
}
