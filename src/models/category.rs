use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// Accent colours a category badge can use on the public site.
pub const CATEGORY_COLORS: &[&str] = &["primary", "secondary", "accent"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
}

/// Unknown colours fall back to `primary`.
pub fn normalize_color(color: &str) -> &'static str {
    CATEGORY_COLORS
        .iter()
        .find(|c| **c == color.trim())
        .copied()
        .unwrap_or("primary")
}

impl Category {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            color: row.get("color")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM categories WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM categories WHERE slug = ?1",
            params![slug],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching categories: {}", e);
                return vec![];
            }
        };

        let mut stmt = match conn.prepare("SELECT * FROM categories ORDER BY name ASC") {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching categories: {}", e);
                return vec![];
            }
        };

        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn count_posts(pool: &DbPool, category_id: i64) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM blog_posts WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &CategoryForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO categories (name, slug, description, color) VALUES (?1, ?2, ?3, ?4)",
            params![
                form.name.trim(),
                form.slug,
                form.description.as_deref().filter(|d| !d.trim().is_empty()),
                normalize_color(&form.color),
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &CategoryForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE categories SET name = ?1, slug = ?2, description = ?3, color = ?4,
             updated_at = CURRENT_TIMESTAMP WHERE id = ?5",
            params![
                form.name.trim(),
                form.slug,
                form.description.as_deref().filter(|d| !d.trim().is_empty()),
                normalize_color(&form.color),
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Fails while posts still reference the category; subcategories go with it.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    "Category still has posts. Move or delete them first.".to_string()
                }
                other => other.to_string(),
            })?;
        Ok(())
    }
}
