use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subcategory {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryForm {
    pub category_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Subcategory row joined with its parent's name and slug, for listings and pickers.
#[derive(Debug, Serialize, Clone)]
pub struct SubcategoryWithParent {
    #[serde(flatten)]
    pub subcategory: Subcategory,
    pub category_name: String,
    pub category_slug: String,
}

impl Subcategory {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subcategory {
            id: row.get("id")?,
            category_id: row.get("category_id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM subcategories WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM subcategories WHERE slug = ?1",
            params![slug],
            Self::from_row,
        )
        .ok()
    }

    /// All subcategories, or only those under `category_id`, ordered by name.
    pub fn list(pool: &DbPool, category_id: Option<i64>) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching subcategories: {}", e);
                return vec![];
            }
        };

        let (sql, params_vec): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match category_id {
            Some(id) => (
                "SELECT * FROM subcategories WHERE category_id = ?1 ORDER BY name ASC",
                vec![Box::new(id)],
            ),
            None => ("SELECT * FROM subcategories ORDER BY name ASC", vec![]),
        };

        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching subcategories: {}", e);
                return vec![];
            }
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_with_parent(pool: &DbPool) -> Vec<SubcategoryWithParent> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut stmt = match conn.prepare(
            "SELECT s.*, c.name AS category_name, c.slug AS category_slug
             FROM subcategories s
             JOIN categories c ON c.id = s.category_id
             ORDER BY c.name ASC, s.name ASC",
        ) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching subcategories: {}", e);
                return vec![];
            }
        };

        stmt.query_map([], |row| {
            Ok(SubcategoryWithParent {
                subcategory: Self::from_row(row)?,
                category_name: row.get("category_name")?,
                category_slug: row.get("category_slug")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM subcategories", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &SubcategoryForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO subcategories (category_id, name, slug, description) VALUES (?1, ?2, ?3, ?4)",
            params![
                form.category_id,
                form.name.trim(),
                form.slug,
                form.description.as_deref().filter(|d| !d.trim().is_empty()),
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &SubcategoryForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE subcategories SET category_id = ?1, name = ?2, slug = ?3, description = ?4,
             updated_at = CURRENT_TIMESTAMP WHERE id = ?5",
            params![
                form.category_id,
                form.name.trim(),
                form.slug,
                form.description.as_deref().filter(|d| !d.trim().is_empty()),
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM subcategories WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
