use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::db::DbPool;
use crate::models::library::LibraryItem;

pub const MIN_PRODUCTS: usize = 3;
pub const MAX_PRODUCTS: usize = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AffiliateProduct {
    pub id: i64,
    pub blog_post_id: i64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub amazon_affiliate_link: String,
    pub price: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub display_order: i64,
    pub is_featured: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One product row as submitted from the post form or the preview endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub amazon_affiliate_link: String,
    #[serde(default)]
    pub is_featured: bool,
}

impl ProductInput {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.description.trim().is_empty()
            && !self.image_url.trim().is_empty()
            && !self.amazon_affiliate_link.trim().is_empty()
    }
}

/// Complete rows must number 3 to 5, or none at all.
pub fn check_product_count(inputs: &[ProductInput]) -> Result<(), String> {
    let complete = inputs.iter().filter(|p| p.is_complete()).count();
    if complete != 0 && !(MIN_PRODUCTS..=MAX_PRODUCTS).contains(&complete) {
        return Err("You must add between 3-5 products".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Swap the item at `index` with its neighbour. Returns false at either end.
pub fn swap_adjacent<T>(items: &mut [T], index: usize, direction: Direction) -> bool {
    let target = match direction {
        Direction::Up if index > 0 => index - 1,
        Direction::Down if index + 1 < items.len() => index + 1,
        _ => return false,
    };
    items.swap(index, target);
    true
}

/// ASIN from an Amazon product URL: `/dp/<ASIN>`, `/gp/product/<ASIN>` or `?asin=`.
pub fn extract_asin(link: &str) -> Option<String> {
    static PATH_RE: OnceLock<Regex> = OnceLock::new();
    let re = PATH_RE.get_or_init(|| {
        Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").expect("valid ASIN regex")
    });

    let url = url::Url::parse(link.trim()).ok()?;
    if let Some(caps) = re.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(k, v)| k == "asin" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

impl AffiliateProduct {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AffiliateProduct {
            id: row.get("id")?,
            blog_post_id: row.get("blog_post_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            image_url: row.get("image_url")?,
            amazon_affiliate_link: row.get("amazon_affiliate_link")?,
            price: row.get("price")?,
            rating: row.get("rating")?,
            review_count: row.get("review_count")?,
            display_order: row.get("display_order")?,
            is_featured: row.get::<_, i64>("is_featured")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn asin(&self) -> Option<String> {
        extract_asin(&self.amazon_affiliate_link)
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM affiliate_products WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_for_post(pool: &DbPool, post_id: i64) -> Vec<Self> {
        Self::for_posts(pool, &[post_id])
    }

    /// Products for several posts at once, each post's rows in display order.
    pub fn for_posts(pool: &DbPool, post_ids: &[i64]) -> Vec<Self> {
        if post_ids.is_empty() {
            return vec![];
        }
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching products: {}", e);
                return vec![];
            }
        };
        let placeholders = (1..=post_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM affiliate_products WHERE blog_post_id IN ({})
             ORDER BY blog_post_id, display_order ASC, id ASC",
            placeholders
        );
        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching products: {}", e);
                return vec![];
            }
        };
        let refs: Vec<&dyn rusqlite::types::ToSql> = post_ids
            .iter()
            .map(|id| id as &dyn rusqlite::types::ToSql)
            .collect();
        stmt.query_map(refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Replace a post's products with the complete rows from `inputs`.
    ///
    /// Incomplete rows are dropped first. When nothing complete remains the
    /// existing products are left alone; otherwise the count must be 3 to 5.
    /// Returns how many products were written.
    pub fn replace_for_post(
        pool: &DbPool,
        post_id: i64,
        inputs: &[ProductInput],
    ) -> Result<usize, String> {
        check_product_count(inputs)?;
        let valid: Vec<&ProductInput> = inputs.iter().filter(|p| p.is_complete()).collect();
        if valid.is_empty() {
            return Ok(0);
        }

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "DELETE FROM affiliate_products WHERE blog_post_id = ?1",
            params![post_id],
        )
        .map_err(|e| e.to_string())?;

        for (index, p) in valid.iter().enumerate() {
            tx.execute(
                "INSERT INTO affiliate_products (blog_post_id, name, description, image_url,
                 amazon_affiliate_link, price, rating, review_count, display_order, is_featured)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, 0, ?6, ?7)",
                params![
                    post_id,
                    p.name.trim(),
                    p.description.trim(),
                    p.image_url.trim(),
                    p.amazon_affiliate_link.trim(),
                    index as i64,
                    p.is_featured,
                ],
            )
            .map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())?;

        Ok(valid.len())
    }

    /// Copy a library item onto the end of a post's product list.
    pub fn add_from_library(pool: &DbPool, post_id: i64, item: &LibraryItem) -> Result<i64, String> {
        let existing = Self::list_for_post(pool, post_id);
        if existing.len() >= MAX_PRODUCTS {
            return Err("Maximum 5 products allowed per post".to_string());
        }
        if existing
            .iter()
            .any(|p| p.amazon_affiliate_link == item.amazon_affiliate_link)
        {
            return Err("This product is already added to the post".to_string());
        }

        let next_order = existing
            .iter()
            .map(|p| p.display_order)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);

        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO affiliate_products (blog_post_id, name, description, image_url,
             amazon_affiliate_link, review_count, display_order, is_featured)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            params![
                post_id,
                item.name,
                item.description,
                item.image_url,
                item.amazon_affiliate_link,
                next_order,
                item.is_featured,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn remove(pool: &DbPool, post_id: i64, product_id: i64) -> Result<(), String> {
        {
            let conn = pool.get().map_err(|e| e.to_string())?;
            let removed = conn
                .execute(
                    "DELETE FROM affiliate_products WHERE id = ?1 AND blog_post_id = ?2",
                    params![product_id, post_id],
                )
                .map_err(|e| e.to_string())?;
            if removed == 0 {
                return Err("Product not found".to_string());
            }
        }
        let ids: Vec<i64> = Self::list_for_post(pool, post_id)
            .iter()
            .map(|p| p.id)
            .collect();
        Self::renumber(pool, &ids)
    }

    /// Swap a product with its neighbour and rewrite every display order
    /// of the post as its array index. Moving past either end is a no-op.
    pub fn move_product(
        pool: &DbPool,
        post_id: i64,
        product_id: i64,
        direction: Direction,
    ) -> Result<(), String> {
        let mut ids: Vec<i64> = Self::list_for_post(pool, post_id)
            .iter()
            .map(|p| p.id)
            .collect();
        let index = ids
            .iter()
            .position(|id| *id == product_id)
            .ok_or_else(|| "Product not found".to_string())?;

        if !swap_adjacent(&mut ids, index, direction) {
            return Ok(());
        }
        Self::renumber(pool, &ids)
    }

    fn renumber(pool: &DbPool, ordered_ids: &[i64]) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        for (index, id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE affiliate_products SET display_order = ?1, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?2",
                params![index as i64, id],
            )
            .map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())
    }
}
