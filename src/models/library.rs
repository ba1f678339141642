use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::models::product::{swap_adjacent, Direction};

pub const MISSING_FIELDS: &str =
    "Missing required fields: subcategory_id, name, description, image_url, amazon_affiliate_link";

/// A reusable affiliate product filed under a subcategory.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LibraryItem {
    pub id: i64,
    pub subcategory_id: i64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub amazon_affiliate_link: String,
    pub display_order: i64,
    pub is_featured: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Clone)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct SubcategoryRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub category: CategoryRef,
}

#[derive(Debug, Serialize, Clone)]
pub struct LibraryListing {
    #[serde(flatten)]
    pub item: LibraryItem,
    pub subcategory: SubcategoryRef,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LibraryForm {
    pub subcategory_id: i64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub amazon_affiliate_link: String,
    pub is_featured: bool,
}

impl LibraryForm {
    pub fn is_complete(&self) -> bool {
        self.subcategory_id > 0
            && !self.name.trim().is_empty()
            && !self.description.trim().is_empty()
            && !self.image_url.trim().is_empty()
            && !self.amazon_affiliate_link.trim().is_empty()
    }
}

/// Partial update: only the fields present are written.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LibraryPatch {
    pub subcategory_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub amazon_affiliate_link: Option<String>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
}

const LISTING_SQL: &str = "SELECT p.*,
        s.name AS sub_name, s.slug AS sub_slug,
        c.id AS cat_id, c.name AS cat_name, c.slug AS cat_slug
     FROM product_library p
     JOIN subcategories s ON s.id = p.subcategory_id
     JOIN categories c ON c.id = s.category_id";

impl LibraryItem {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LibraryItem {
            id: row.get("id")?,
            subcategory_id: row.get("subcategory_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            image_url: row.get("image_url")?,
            amazon_affiliate_link: row.get("amazon_affiliate_link")?,
            display_order: row.get("display_order")?,
            is_featured: row.get::<_, i64>("is_featured")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn listing_from_row(row: &Row) -> rusqlite::Result<LibraryListing> {
        let item = Self::from_row(row)?;
        Ok(LibraryListing {
            subcategory: SubcategoryRef {
                id: item.subcategory_id,
                name: row.get("sub_name")?,
                slug: row.get("sub_slug")?,
                category: CategoryRef {
                    id: row.get("cat_id")?,
                    name: row.get("cat_name")?,
                    slug: row.get("cat_slug")?,
                },
            },
            item,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM product_library WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Items in display order, each with its subcategory and category.
    pub fn list(pool: &DbPool, subcategory_id: Option<i64>) -> Result<Vec<LibraryListing>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) =
            match subcategory_id {
                Some(id) => (
                    format!(
                        "{} WHERE p.subcategory_id = ?1 ORDER BY p.display_order ASC, p.id ASC",
                        LISTING_SQL
                    ),
                    vec![Box::new(id)],
                ),
                None => (
                    format!("{} ORDER BY p.display_order ASC, p.id ASC", LISTING_SQL),
                    vec![],
                ),
            };

        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::listing_from_row)
            .map_err(|e| e.to_string())?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Admin listing: optional subcategory plus a case-insensitive search over
    /// name, description and subcategory name.
    pub fn search(pool: &DbPool, subcategory_id: Option<i64>, query: &str) -> Vec<LibraryListing> {
        let items = match Self::list(pool, subcategory_id) {
            Ok(items) => items,
            Err(e) => {
                log::error!("Error fetching product library: {}", e);
                return vec![];
            }
        };
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|l| {
                l.item.name.to_lowercase().contains(&needle)
                    || l.item.description.to_lowercase().contains(&needle)
                    || l.subcategory.name.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Admin create: appended after the current last item of the subcategory.
    pub fn create(pool: &DbPool, form: &LibraryForm) -> Result<i64, String> {
        if !form.is_complete() {
            return Err("All fields are required".to_string());
        }
        let next_order = {
            let conn = pool.get().map_err(|e| e.to_string())?;
            conn.query_row(
                "SELECT MAX(display_order) FROM product_library WHERE subcategory_id = ?1",
                params![form.subcategory_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(|e| e.to_string())?
            .map(|m| m + 1)
            .unwrap_or(0)
        };
        Self::insert(pool, form, next_order)
    }

    /// REST create: caller-supplied order, 0 when absent.
    pub fn create_with_order(
        pool: &DbPool,
        form: &LibraryForm,
        display_order: Option<i64>,
    ) -> Result<i64, String> {
        if !form.is_complete() {
            return Err(MISSING_FIELDS.to_string());
        }
        Self::insert(pool, form, display_order.unwrap_or(0))
    }

    fn insert(pool: &DbPool, form: &LibraryForm, display_order: i64) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO product_library (subcategory_id, name, description, image_url,
             amazon_affiliate_link, display_order, is_featured)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                form.subcategory_id,
                form.name.trim(),
                form.description.trim(),
                form.image_url.trim(),
                form.amazon_affiliate_link.trim(),
                display_order,
                form.is_featured,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &LibraryForm) -> Result<(), String> {
        if !form.is_complete() {
            return Err("All fields are required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE product_library SET subcategory_id = ?1, name = ?2, description = ?3,
             image_url = ?4, amazon_affiliate_link = ?5, is_featured = ?6,
             updated_at = CURRENT_TIMESTAMP WHERE id = ?7",
            params![
                form.subcategory_id,
                form.name.trim(),
                form.description.trim(),
                form.image_url.trim(),
                form.amazon_affiliate_link.trim(),
                form.is_featured,
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Apply a partial update and return the stored row.
    pub fn patch(pool: &DbPool, id: i64, patch: &LibraryPatch) -> Result<Self, String> {
        let mut sets: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        macro_rules! push {
            ($col:literal, $val:expr) => {
                if let Some(v) = $val {
                    args.push(Box::new(v));
                    sets.push(format!("{} = ?{}", $col, args.len()));
                }
            };
        }
        push!("subcategory_id", patch.subcategory_id);
        push!("name", patch.name.clone());
        push!("description", patch.description.clone());
        push!("image_url", patch.image_url.clone());
        push!("amazon_affiliate_link", patch.amazon_affiliate_link.clone());
        push!("display_order", patch.display_order);
        push!("is_featured", patch.is_featured);

        if !sets.is_empty() {
            sets.push("updated_at = CURRENT_TIMESTAMP".to_string());
            args.push(Box::new(id));
            let sql = format!(
                "UPDATE product_library SET {} WHERE id = ?{}",
                sets.join(", "),
                args.len()
            );
            let conn = pool.get().map_err(|e| e.to_string())?;
            let refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
            conn.execute(&sql, refs.as_slice())
                .map_err(|e| e.to_string())?;
        }

        Self::find_by_id(pool, id).ok_or_else(|| format!("Library product {} not found", id))
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM product_library WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Swap with the neighbour inside the same subcategory, then renumber
    /// that subcategory from 0.
    pub fn move_item(pool: &DbPool, id: i64, direction: Direction) -> Result<(), String> {
        let item = Self::find_by_id(pool, id).ok_or_else(|| "Product not found".to_string())?;
        let mut ids: Vec<i64> = Self::list(pool, Some(item.subcategory_id))?
            .iter()
            .map(|l| l.item.id)
            .collect();
        let index = ids
            .iter()
            .position(|i| *i == id)
            .ok_or_else(|| "Product not found".to_string())?;
        if !swap_adjacent(&mut ids, index, direction) {
            return Ok(());
        }

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        for (index, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE product_library SET display_order = ?1 WHERE id = ?2",
                params![index as i64, id],
            )
            .map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())
    }
}
