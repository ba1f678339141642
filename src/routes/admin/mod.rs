use rocket::request::FlashMessage;
use serde_json::{json, Value};

pub mod analytics;
pub mod categories;
pub mod dashboard;
pub mod library;
pub mod media;
pub mod posts;
pub mod subcategories;

/// Copy a pending flash message into a template context.
pub(crate) fn with_flash(mut context: Value, flash: Option<FlashMessage<'_>>) -> Value {
    if let Some(ref f) = flash {
        context["flash_kind"] = json!(f.kind());
        context["flash_msg"] = json!(f.message());
    }
    context
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard::dashboard,
        posts::posts_list,
        posts::posts_new,
        posts::posts_create,
        posts::posts_edit,
        posts::posts_update,
        posts::posts_delete,
        posts::posts_preview,
        posts::product_add_from_library,
        posts::product_remove,
        posts::product_move,
        categories::categories_list,
        categories::category_create,
        categories::category_edit,
        categories::category_update,
        categories::category_delete,
        subcategories::subcategories_list,
        subcategories::subcategory_create,
        subcategories::subcategory_edit,
        subcategories::subcategory_update,
        subcategories::subcategory_delete,
        library::library_list,
        library::library_new,
        library::library_create,
        library::library_edit,
        library::library_update,
        library::library_delete,
        library::library_move,
        analytics::analytics_page,
        media::upload_image,
    ]
}
