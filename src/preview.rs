use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::post::{BlogPost, PostWithRelations, DEFAULT_READ_TIME};
use crate::models::product::{extract_asin, ProductInput};
use crate::models::related::RelatedArticle;
use crate::models::subcategory::Subcategory;

/// Unsaved post data sent from the editor.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PreviewRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub featured_image_url: Option<String>,
    pub read_time: Option<i64>,
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub related_articles: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct PreviewProduct {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub amazon_affiliate_link: String,
    pub price: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i64,
    pub display_order: i64,
    pub is_featured: bool,
    pub asin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewPost {
    pub id: &'static str,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub featured_image_url: Option<String>,
    pub read_time: i64,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub products: Vec<PreviewProduct>,
    pub related_articles: Vec<PostWithRelations>,
}

fn text(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

/// Assemble a post-shaped preview from editor input.
///
/// Rows left entirely blank are dropped. Explicit related ids resolve to live
/// posts only; without them the latest live posts of the subcategory (or the
/// category) are used.
pub fn build_preview(pool: &DbPool, req: &PreviewRequest) -> PreviewPost {
    let now = Utc::now().naive_utc();
    let category_id = req.category_id.filter(|id| *id > 0);
    let subcategory_id = req.subcategory_id.filter(|id| *id > 0);

    let category = category_id.and_then(|id| Category::find_by_id(pool, id));
    let subcategory = subcategory_id.and_then(|id| Subcategory::find_by_id(pool, id));

    let products = req
        .products
        .iter()
        .filter(|p| {
            !(p.name.trim().is_empty()
                && p.description.trim().is_empty()
                && p.image_url.trim().is_empty()
                && p.amazon_affiliate_link.trim().is_empty())
        })
        .enumerate()
        .map(|(index, p)| PreviewProduct {
            id: format!("preview-{}", index),
            name: p.name.clone(),
            description: p.description.clone(),
            image_url: p.image_url.clone(),
            amazon_affiliate_link: p.amazon_affiliate_link.clone(),
            price: None,
            rating: None,
            review_count: 0,
            display_order: index as i64,
            is_featured: p.is_featured,
            asin: extract_asin(&p.amazon_affiliate_link),
        })
        .collect();

    let related: Vec<BlogPost> = if !req.related_articles.is_empty() {
        RelatedArticle::ordered(pool, &req.related_articles, true)
    } else if let Some(cid) = category_id {
        RelatedArticle::auto_select(pool, None, cid, subcategory_id, true)
    } else {
        vec![]
    };

    PreviewPost {
        id: "preview",
        title: text(&req.title),
        slug: text(&req.slug),
        excerpt: text(&req.excerpt),
        content: text(&req.content),
        category_id,
        subcategory_id,
        author_name: text(&req.author_name),
        author_email: text(&req.author_email),
        featured_image_url: req
            .featured_image_url
            .clone()
            .filter(|u| !u.trim().is_empty()),
        read_time: req.read_time.filter(|n| *n >= 1).unwrap_or(DEFAULT_READ_TIME),
        published: false,
        published_at: None,
        created_at: now,
        updated_at: now,
        category,
        subcategory,
        products,
        related_articles: BlogPost::with_relations(pool, related),
    }
}
