use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use crate::images::UPLOAD_DIR;

pub const STATIC_DIR: &str = "website/static";

/// Every template a route renders, by Tera name. Layouts and macros are
/// pulled in by these through `extends` and `import`.
const PAGE_TEMPLATES: &[&str] = &[
    "admin/base",
    "admin/login",
    "admin/setup",
    "admin/dashboard",
    "admin/analytics",
    "admin/posts/list",
    "admin/posts/edit",
    "admin/categories/list",
    "admin/categories/edit",
    "admin/subcategories/list",
    "admin/subcategories/edit",
    "admin/library/list",
    "admin/library/edit",
    "public/base",
    "public/macros",
    "public/home",
    "public/listing",
    "public/post",
    "public/404",
];

/// Assets the templates link to, relative to `STATIC_DIR`.
const STATIC_ASSETS: &[&str] = &[
    "css/admin.css",
    "css/site.css",
    "js/admin.js",
    "js/tracking.js",
    "icon.svg",
];

/// Directory that holds the SQLite file. A bare file name lives in the working directory.
pub fn db_dir(db_path: &str) -> PathBuf {
    match Path::new(db_path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Page templates with no `.html.tera` file under `template_dir`.
pub fn missing_templates(template_dir: &Path) -> Vec<&'static str> {
    PAGE_TEMPLATES
        .iter()
        .copied()
        .filter(|name| !template_dir.join(format!("{}.html.tera", name)).is_file())
        .collect()
}

/// Create `dir` when absent, then prove a file can be written in it.
pub fn ensure_writable(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    let probe = dir.join(".write_test");
    fs::write(&probe, b"ok").map_err(|e| format!("{} is not writable: {}", dir.display(), e))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

/// Startup checks for the resolved database path and template directory.
/// Exits the process when the site could not serve pages or store data.
pub fn run(db_path: &str, template_dir: &str) {
    info!("PickBettr boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    let db_file = Path::new(db_path);
    if db_file.is_dir() {
        error!("  Database path {} is a directory", db_path);
        errors += 1;
    } else if let Err(e) = ensure_writable(&db_dir(db_path)) {
        error!("  Database directory: {}", e);
        errors += 1;
    }

    if let Err(e) = ensure_writable(Path::new(UPLOAD_DIR)) {
        warn!("  Uploads directory: {} (image uploads will fail)", e);
        warnings += 1;
    }

    for name in missing_templates(Path::new(template_dir)) {
        error!("  MISSING template {} in {}", name, template_dir);
        errors += 1;
    }

    let static_dir = Path::new(STATIC_DIR);
    for asset in STATIC_ASSETS {
        if !static_dir.join(asset).is_file() {
            warn!("  Missing static asset {}/{} (pages will be unstyled or untracked)", STATIC_DIR, asset);
            warnings += 1;
        }
    }

    if errors > 0 {
        error!("Boot check FAILED: {} error(s), {} warning(s). Aborting.", errors, warnings);
        process::exit(1);
    }
    if warnings > 0 {
        warn!("Boot check passed with {} warning(s).", warnings);
    } else {
        info!("Boot check passed.");
    }
}
