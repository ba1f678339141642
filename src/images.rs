use image::GenericImageView;
use rocket::fs::TempFile;
use rocket::http::ContentType;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::DbPool;
use crate::models::settings::Setting;
use crate::slug::slugify;

pub const UPLOAD_DIR: &str = "website/uploads";
const WEBP_QUALITY: f32 = 85.0;

/// Uploads land in a per-purpose subfolder such as `blog-images` or `products`.
pub fn sanitize_folder(folder: Option<&str>) -> String {
    let cleaned = slugify(folder.unwrap_or(""));
    if cleaned.is_empty() {
        "misc".to_string()
    } else {
        cleaned
    }
}

/// Raster `image/*` types only. SVG is refused since it can carry script.
pub fn is_allowed_image(content_type: Option<&ContentType>) -> bool {
    match content_type {
        Some(ct) => ct.top() == "image" && ct.sub() != "svg+xml",
        None => false,
    }
}

pub fn max_upload_bytes(pool: &DbPool) -> u64 {
    let max_mb = Setting::get_i64(pool, "images_max_upload_mb").max(1) as u64;
    max_mb * 1024 * 1024
}

fn extension_for(file: &TempFile<'_>) -> String {
    file.content_type()
        .and_then(|ct| ct.extension())
        .map(|e| e.to_string().to_lowercase())
        .or_else(|| {
            file.raw_name().and_then(|rn| {
                let s = rn.dangerous_unsafe_unsanitized_raw().as_str().to_string();
                s.rsplit('.').next().map(|e| e.to_lowercase())
            })
        })
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()) && e.len() <= 5)
        .unwrap_or_else(|| "jpg".to_string())
}

/// Validate and persist an uploaded image. Returns its public `/uploads/...` URL.
pub async fn save_upload(
    file: &mut TempFile<'_>,
    folder: Option<&str>,
    pool: &DbPool,
) -> Result<String, String> {
    if !is_allowed_image(file.content_type()) {
        return Err("Please select an image file".to_string());
    }
    let limit = max_upload_bytes(pool);
    if file.len() > limit {
        return Err(format!(
            "File size must be less than {}MB",
            limit / (1024 * 1024)
        ));
    }

    let folder = sanitize_folder(folder);
    let dir: PathBuf = Path::new(UPLOAD_DIR).join(&folder);
    fs::create_dir_all(&dir).map_err(|e| e.to_string())?;

    let ext = extension_for(file);
    let uid = uuid::Uuid::new_v4();
    let filename = format!("{}.{}", uid, ext);
    let dest = dir.join(&filename);

    file.persist_to(&dest).await.map_err(|e| e.to_string())?;

    if Setting::get_bool(pool, "images_webp_convert") && ext != "webp" && ext != "gif" {
        let webp_name = format!("{}.webp", uid);
        let (src, dst) = (dest.clone(), dir.join(&webp_name));
        let converted = rocket::tokio::task::spawn_blocking(move || convert_to_webp(&src, &dst))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);
        match converted {
            Ok(()) => {
                let _ = fs::remove_file(&dest);
                return Ok(format!("/uploads/{}/{}", folder, webp_name));
            }
            Err(e) => log::warn!("WebP conversion failed for {}: {}", filename, e),
        }
    }

    Ok(format!("/uploads/{}/{}", folder, filename))
}

/// Re-encode any decodable raster image as lossy WebP.
fn convert_to_webp(src: &Path, dst: &Path) -> Result<(), String> {
    let img = image::open(src).map_err(|e| e.to_string())?;
    let (w, h) = img.dimensions();
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(&rgba, w, h);
    let webp_data = encoder.encode(WEBP_QUALITY);
    fs::write(dst, &*webp_data).map_err(|e| e.to_string())
}
