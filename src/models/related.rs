use rusqlite::params;

use crate::db::DbPool;
use crate::models::post::{BlogPost, LIVE};

pub const MAX_RELATED: usize = 3;

/// Drop self references and repeats, keeping first-seen order.
pub fn clean_related_ids(post_id: i64, ids: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::new();
    for id in ids {
        if *id > 0 && *id != post_id && !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

pub struct RelatedArticle;

impl RelatedArticle {
    /// Manually selected ids in display order.
    pub fn ids_for_post(pool: &DbPool, post_id: i64) -> Vec<i64> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching related articles: {}", e);
                return vec![];
            }
        };
        let mut stmt = match conn.prepare(
            "SELECT related_post_id FROM related_articles WHERE blog_post_id = ?1
             ORDER BY display_order ASC LIMIT ?2",
        ) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching related articles: {}", e);
                return vec![];
            }
        };
        stmt.query_map(params![post_id, MAX_RELATED as i64], |row| row.get(0))
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Replace the manual selection for a post.
    pub fn set_for_post(pool: &DbPool, post_id: i64, ids: &[i64]) -> Result<(), String> {
        let ids = clean_related_ids(post_id, ids);
        if ids.len() > MAX_RELATED {
            return Err("You can select at most 3 related articles".to_string());
        }

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "DELETE FROM related_articles WHERE blog_post_id = ?1",
            params![post_id],
        )
        .map_err(|e| e.to_string())?;
        for (index, related_id) in ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO related_articles (blog_post_id, related_post_id, display_order)
                 VALUES (?1, ?2, ?3)",
                params![post_id, related_id, index as i64],
            )
            .map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())
    }

    /// Posts to show under an article: the manual picks when any of them
    /// resolve, otherwise the latest posts from the same subcategory (or
    /// category when the post has none).
    pub fn resolve(pool: &DbPool, post: &BlogPost, published_only: bool) -> Vec<BlogPost> {
        let picked = Self::ids_for_post(pool, post.id);
        let manual = Self::ordered(pool, &picked, published_only);
        if !manual.is_empty() {
            return manual;
        }
        Self::auto_select(
            pool,
            Some(post.id),
            post.category_id,
            post.subcategory_id,
            published_only,
        )
    }

    /// Fetch `ids` and return them in the given order, skipping any that
    /// are missing or not live.
    pub fn ordered(pool: &DbPool, ids: &[i64], published_only: bool) -> Vec<BlogPost> {
        let ids: Vec<i64> = ids.iter().copied().take(MAX_RELATED).collect();
        let mut found = BlogPost::find_many(pool, &ids, published_only);
        let mut out = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|p| p.id == id) {
                out.push(found.swap_remove(pos));
            }
        }
        out
    }

    pub fn auto_select(
        pool: &DbPool,
        exclude_id: Option<i64>,
        category_id: i64,
        subcategory_id: Option<i64>,
        published_only: bool,
    ) -> Vec<BlogPost> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching related articles: {}", e);
                return vec![];
            }
        };

        let (group_sql, group_id) = match subcategory_id {
            Some(id) => ("subcategory_id = ?1", id),
            None => ("category_id = ?1", category_id),
        };
        let mut sql = format!(
            "SELECT * FROM blog_posts WHERE {} AND id != ?2",
            group_sql
        );
        if published_only {
            sql.push_str(&format!(" AND {}", LIVE));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?3");

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching related articles: {}", e);
                return vec![];
            }
        };
        stmt.query_map(
            params![group_id, exclude_id.unwrap_or(0), MAX_RELATED as i64],
            BlogPost::from_row,
        )
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
