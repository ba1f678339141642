use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::images::save_upload;

// ── Image Upload API ────────────────────────────────────

#[derive(FromForm)]
pub struct ImageUploadForm<'f> {
    pub file: TempFile<'f>,
    pub folder: Option<String>,
}

/// Multipart upload used by the featured-image and product-image widgets.
#[post("/upload", data = "<form>")]
pub async fn upload_image(
    _admin: AdminUser,
    pool: &State<DbPool>,
    mut form: Form<ImageUploadForm<'_>>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let folder = form.folder.clone();
    match save_upload(&mut form.file, folder.as_deref(), pool).await {
        Ok(url) => {
            log::info!("Uploaded {}", url);
            Ok(Json(json!({ "url": url })))
        }
        Err(e) => {
            log::warn!("Upload rejected: {}", e);
            Err(Custom(Status::BadRequest, Json(json!({ "error": e }))))
        }
    }
}
