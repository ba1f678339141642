use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::product::AffiliateProduct;
use crate::models::subcategory::Subcategory;

/// SQL predicate for posts visible on the public site.
pub const LIVE: &str = "published = 1 AND published_at IS NOT NULL";

pub const DEFAULT_READ_TIME: i64 = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub read_time: i64,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostForm {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub read_time: i64,
    pub published: bool,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.slug.is_empty() {
            return Err("Slug is required".to_string());
        }
        if self.category_id <= 0 {
            return Err("Category is required".to_string());
        }
        Ok(())
    }
}

/// Read time from user input; anything missing or below one minute becomes the default.
pub fn parse_read_time(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(DEFAULT_READ_TIME)
}

/// A post with the rows the public pages and the REST listing embed.
#[derive(Debug, Serialize, Clone)]
pub struct PostWithRelations {
    #[serde(flatten)]
    pub post: BlogPost,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub products: Vec<AffiliateProduct>,
}

fn empty_to_none(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl BlogPost {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BlogPost {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            excerpt: row.get("excerpt")?,
            content: row.get("content")?,
            category_id: row.get("category_id")?,
            subcategory_id: row.get("subcategory_id")?,
            featured_image_url: row.get("featured_image_url")?,
            author_name: row.get("author_name")?,
            author_email: row.get("author_email")?,
            read_time: row.get("read_time")?,
            published: row.get::<_, i64>("published")? != 0,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn is_live(&self) -> bool {
        self.published && self.published_at.is_some()
    }

    fn query(pool: &DbPool, sql: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching blog posts: {}", e);
                return vec![];
            }
        };
        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Error fetching blog posts: {}", e);
                return vec![];
            }
        };
        stmt.query_map(args, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM blog_posts WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str, published_only: bool) -> Option<Self> {
        let post = {
            let conn = pool.get().ok()?;
            conn.query_row(
                "SELECT * FROM blog_posts WHERE slug = ?1",
                params![slug],
                Self::from_row,
            )
            .ok()?
        };
        if published_only && !post.is_live() {
            return None;
        }
        Some(post)
    }

    /// Newest first by creation time.
    pub fn list(pool: &DbPool, published_only: bool) -> Vec<Self> {
        Self::filtered(pool, None, None, published_only)
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Vec<Self> {
        Self::query(
            pool,
            &format!(
                "SELECT * FROM blog_posts WHERE {} ORDER BY created_at DESC, id DESC LIMIT ?1",
                LIVE
            ),
            &[&limit],
        )
    }

    pub fn filtered(
        pool: &DbPool,
        category_id: Option<i64>,
        subcategory_id: Option<i64>,
        published_only: bool,
    ) -> Vec<Self> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(id) = category_id {
            args.push(Box::new(id));
            clauses.push(format!("category_id = ?{}", args.len()));
        }
        if let Some(id) = subcategory_id {
            args.push(Box::new(id));
            clauses.push(format!("subcategory_id = ?{}", args.len()));
        }
        if published_only {
            clauses.push(LIVE.to_string());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM blog_posts {} ORDER BY created_at DESC, id DESC",
            where_sql
        );

        let refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        Self::query(pool, &sql, &refs)
    }

    /// REST listing filter. A slug that names nothing is ignored rather than
    /// matching no rows.
    pub fn filtered_by_slugs(
        pool: &DbPool,
        category_slug: Option<&str>,
        subcategory_slug: Option<&str>,
        published_only: bool,
    ) -> Vec<Self> {
        let category_id = category_slug
            .and_then(|s| Category::find_by_slug(pool, s))
            .map(|c| c.id);
        let subcategory_id = subcategory_slug
            .and_then(|s| Subcategory::find_by_slug(pool, s))
            .map(|s| s.id);
        Self::filtered(pool, category_id, subcategory_id, published_only)
    }

    /// Empty when the slug names no category.
    pub fn by_category_slug(pool: &DbPool, slug: &str, published_only: bool) -> Vec<Self> {
        match Category::find_by_slug(pool, slug) {
            Some(c) => Self::filtered(pool, Some(c.id), None, published_only),
            None => vec![],
        }
    }

    pub fn by_subcategory_slug(pool: &DbPool, slug: &str, published_only: bool) -> Vec<Self> {
        match Subcategory::find_by_slug(pool, slug) {
            Some(s) => Self::filtered(pool, None, Some(s.id), published_only),
            None => vec![],
        }
    }

    pub fn find_many(pool: &DbPool, ids: &[i64], published_only: bool) -> Vec<Self> {
        if ids.is_empty() {
            return vec![];
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT * FROM blog_posts WHERE id IN ({})", placeholders);
        if published_only {
            sql.push_str(&format!(" AND {}", LIVE));
        }
        let refs: Vec<&dyn rusqlite::types::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
        Self::query(pool, &sql, &refs)
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM blog_posts", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn count_published(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM blog_posts WHERE published = 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &PostForm) -> Result<i64, String> {
        form.validate()?;
        let conn = pool.get().map_err(|e| e.to_string())?;

        let published_at: Option<NaiveDateTime> =
            form.published.then(|| Utc::now().naive_utc());

        conn.execute(
            "INSERT INTO blog_posts (title, slug, excerpt, content, category_id, subcategory_id,
             featured_image_url, author_name, author_email, read_time, published, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                form.title.trim(),
                form.slug,
                form.excerpt,
                form.content,
                form.category_id,
                form.subcategory_id,
                empty_to_none(&form.featured_image_url),
                empty_to_none(&form.author_name),
                empty_to_none(&form.author_email),
                form.read_time.max(1),
                form.published,
                published_at,
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(conn.last_insert_rowid())
    }

    /// `published_at` is stamped only when an unpublished post becomes published.
    pub fn update(pool: &DbPool, id: i64, form: &PostForm) -> Result<(), String> {
        form.validate()?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        let now = Utc::now().naive_utc();

        let changed = conn
            .execute(
                "UPDATE blog_posts SET title = ?1, slug = ?2, excerpt = ?3, content = ?4,
                 category_id = ?5, subcategory_id = ?6, featured_image_url = ?7,
                 author_name = ?8, author_email = ?9, read_time = ?10,
                 published_at = CASE WHEN ?11 = 1 AND published = 0 THEN ?12 ELSE published_at END,
                 published = ?11, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?13",
                params![
                    form.title.trim(),
                    form.slug,
                    form.excerpt,
                    form.content,
                    form.category_id,
                    form.subcategory_id,
                    empty_to_none(&form.featured_image_url),
                    empty_to_none(&form.author_name),
                    empty_to_none(&form.author_email),
                    form.read_time.max(1),
                    form.published,
                    now,
                    id,
                ],
            )
            .map_err(|e| e.to_string())?;

        if changed == 0 {
            return Err(format!("Post {} not found", id));
        }
        Ok(())
    }

    /// Products, related rows, views and clicks go with the post.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM blog_posts WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Attach category, subcategory and ordered products to each post.
    pub fn with_relations(pool: &DbPool, posts: Vec<BlogPost>) -> Vec<PostWithRelations> {
        if posts.is_empty() {
            return vec![];
        }

        let categories: HashMap<i64, Category> = Category::list(pool)
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let subcategories: HashMap<i64, Subcategory> = Subcategory::list(pool, None)
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut products_by_post: HashMap<i64, Vec<AffiliateProduct>> = HashMap::new();
        for product in AffiliateProduct::for_posts(pool, &ids) {
            products_by_post
                .entry(product.blog_post_id)
                .or_default()
                .push(product);
        }

        posts
            .into_iter()
            .map(|post| PostWithRelations {
                category: categories.get(&post.category_id).cloned(),
                subcategory: post
                    .subcategory_id
                    .and_then(|id| subcategories.get(&id).cloned()),
                products: products_by_post.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect()
    }
}
