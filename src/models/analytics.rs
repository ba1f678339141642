use chrono::NaiveDateTime;
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::post::LIVE;

/// Request details stored with every view and click.
#[derive(Debug, Clone, Default)]
pub struct VisitMeta {
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    BuyNow,
    AddToCart,
}

impl ClickType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy_now" => Some(ClickType::BuyNow),
            "add_to_cart" => Some(ClickType::AddToCart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClickType::BuyNow => "buy_now",
            ClickType::AddToCart => "add_to_cart",
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PostAnalytics {
    pub post_id: i64,
    pub title: String,
    pub slug: String,
    pub views: i64,
    pub clicks: i64,
    pub conversion_rate: f64,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProductAnalytics {
    pub product_id: i64,
    pub product_name: String,
    pub clicks: i64,
    pub blog_post_id: i64,
    pub blog_post_title: String,
}

#[derive(Debug, Serialize)]
pub struct ViewActivity {
    pub blog_post_id: i64,
    pub post_title: Option<String>,
    pub device_type: Option<String>,
    pub viewed_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct ClickActivity {
    pub affiliate_product_id: Option<i64>,
    pub product_name: Option<String>,
    pub blog_post_id: i64,
    pub click_type: String,
    pub clicked_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct RecentActivity {
    pub views: Vec<ViewActivity>,
    pub clicks: Vec<ClickActivity>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub total_views: i64,
    pub total_clicks: i64,
    pub conversion_rate: f64,
    pub published_posts: usize,
    pub top_posts: Vec<PostAnalytics>,
    pub best_converting: Vec<PostAnalytics>,
}

#[derive(Debug, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
}

/// Posts need this many views before they rank as best converting.
pub const MIN_VIEWS_FOR_CONVERSION: i64 = 10;

/// `clicks / views * 100`, rounded to two decimals. Zero without views.
pub fn conversion_rate(clicks: i64, views: i64) -> f64 {
    if views <= 0 {
        return 0.0;
    }
    let rate = clicks as f64 / views as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Totals and rankings for the analytics page.
pub fn summarize(posts: &[PostAnalytics]) -> AnalyticsSummary {
    let total_views: i64 = posts.iter().map(|p| p.views).sum();
    let total_clicks: i64 = posts.iter().map(|p| p.clicks).sum();

    let mut top_posts = posts.to_vec();
    top_posts.sort_by(|a, b| b.views.cmp(&a.views));
    top_posts.truncate(10);

    let mut best_converting: Vec<PostAnalytics> = posts
        .iter()
        .filter(|p| p.views >= MIN_VIEWS_FOR_CONVERSION)
        .cloned()
        .collect();
    best_converting.sort_by(|a, b| b.conversion_rate.total_cmp(&a.conversion_rate));
    best_converting.truncate(10);

    AnalyticsSummary {
        total_views,
        total_clicks,
        conversion_rate: conversion_rate(total_clicks, total_views),
        published_posts: posts.len(),
        top_posts,
        best_converting,
    }
}

pub struct Analytics;

impl Analytics {
    pub fn record_view(pool: &DbPool, post_id: i64, meta: &VisitMeta) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO post_views (blog_post_id, ip_hash, user_agent, referrer, device_type, browser)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post_id,
                meta.ip_hash,
                meta.user_agent,
                meta.referrer,
                meta.device_type,
                meta.browser,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn record_click(
        pool: &DbPool,
        product_id: i64,
        post_id: i64,
        click_type: ClickType,
        meta: &VisitMeta,
    ) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO product_clicks (affiliate_product_id, blog_post_id, click_type,
             ip_hash, user_agent, referrer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                product_id,
                post_id,
                click_type.as_str(),
                meta.ip_hash,
                meta.user_agent,
                meta.referrer,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn total_views(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM post_views", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn total_clicks(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM product_clicks", [], |row| row.get(0))
            .unwrap_or(0)
    }

    /// Every live post, newest publication first, with view and click totals.
    pub fn all_post_analytics(pool: &DbPool) -> Vec<PostAnalytics> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching posts for analytics: {}", e);
                return vec![];
            }
        };

        let posts: Vec<(i64, String, String, Option<NaiveDateTime>)> = {
            let sql = format!(
                "SELECT id, title, slug, published_at FROM blog_posts WHERE {}
                 ORDER BY published_at DESC, id DESC",
                LIVE
            );
            let mut stmt = match conn.prepare(&sql) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Error fetching posts for analytics: {}", e);
                    return vec![];
                }
            };
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
                .map(|rows| rows.filter_map(|r| r.ok()).collect())
                .unwrap_or_default()
        };
        if posts.is_empty() {
            return vec![];
        }

        let views = count_by_post(&conn, "SELECT blog_post_id FROM post_views");
        let clicks = count_by_post(&conn, "SELECT blog_post_id FROM product_clicks");

        posts
            .into_iter()
            .map(|(id, title, slug, published_at)| {
                let v = views.get(&id).copied().unwrap_or(0);
                let c = clicks.get(&id).copied().unwrap_or(0);
                PostAnalytics {
                    post_id: id,
                    title,
                    slug,
                    views: v,
                    clicks: c,
                    conversion_rate: conversion_rate(c, v),
                    published_at,
                }
            })
            .collect()
    }

    pub fn post_analytics(pool: &DbPool, post_id: i64) -> Option<PostAnalytics> {
        let conn = pool.get().ok()?;
        let (title, slug, published_at): (String, String, Option<NaiveDateTime>) = conn
            .query_row(
                "SELECT title, slug, published_at FROM blog_posts WHERE id = ?1",
                params![post_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .ok()?;

        let views: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM post_views WHERE blog_post_id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .unwrap_or(0);
        let clicks: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM product_clicks WHERE blog_post_id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Some(PostAnalytics {
            post_id,
            title,
            slug,
            views,
            clicks,
            conversion_rate: conversion_rate(clicks, views),
            published_at,
        })
    }

    /// Most clicked products among the `limit * 10` latest clicks.
    ///
    /// Each product keeps the post it was first seen with. Clicks on deleted
    /// products are skipped.
    pub fn top_products(pool: &DbPool, limit: usize) -> Vec<ProductAnalytics> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error fetching product clicks: {}", e);
                return vec![];
            }
        };

        let clicks: Vec<(Option<i64>, i64)> = {
            let mut stmt = match conn.prepare(
                "SELECT affiliate_product_id, blog_post_id FROM product_clicks
                 ORDER BY clicked_at DESC, id DESC LIMIT ?1",
            ) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Error fetching product clicks: {}", e);
                    return vec![];
                }
            };
            stmt.query_map(params![(limit * 10) as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
        };

        let mut order: Vec<i64> = Vec::new();
        let mut grouped: HashMap<i64, (i64, i64)> = HashMap::new();
        for (product_id, post_id) in clicks {
            let Some(product_id) = product_id else {
                continue;
            };
            grouped
                .entry(product_id)
                .or_insert_with(|| {
                    order.push(product_id);
                    (0, post_id)
                })
                .0 += 1;
        }

        let name_of = |sql: &str, id: i64| -> Option<String> {
            conn.query_row(sql, params![id], |row| row.get(0)).ok()
        };

        let mut result: Vec<ProductAnalytics> = order
            .into_iter()
            .filter_map(|product_id| {
                let (count, post_id) = grouped.get(&product_id).copied()?;
                Some(ProductAnalytics {
                    product_id,
                    product_name: name_of("SELECT name FROM affiliate_products WHERE id = ?1", product_id)
                        .unwrap_or_else(|| "Unknown Product".to_string()),
                    clicks: count,
                    blog_post_id: post_id,
                    blog_post_title: name_of("SELECT title FROM blog_posts WHERE id = ?1", post_id)
                        .unwrap_or_else(|| "Unknown Post".to_string()),
                })
            })
            .collect();

        result.sort_by(|a, b| b.clicks.cmp(&a.clicks));
        result.truncate(limit);
        result
    }

    pub fn recent_activity(pool: &DbPool, limit: i64) -> RecentActivity {
        let empty = || RecentActivity {
            views: vec![],
            clicks: vec![],
        };
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error in recent activity: {}", e);
                return empty();
            }
        };

        let views = conn
            .prepare(
                "SELECT v.blog_post_id, p.title, v.device_type, v.viewed_at
                 FROM post_views v LEFT JOIN blog_posts p ON p.id = v.blog_post_id
                 ORDER BY v.viewed_at DESC, v.id DESC LIMIT ?1",
            )
            .and_then(|mut stmt| {
                stmt.query_map(params![limit], |row| {
                    Ok(ViewActivity {
                        blog_post_id: row.get(0)?,
                        post_title: row.get(1)?,
                        device_type: row.get(2)?,
                        viewed_at: row.get(3)?,
                    })
                })
                .map(|rows| rows.filter_map(|r| r.ok()).collect::<Vec<_>>())
            })
            .unwrap_or_default();

        let clicks = conn
            .prepare(
                "SELECT c.affiliate_product_id, a.name, c.blog_post_id, c.click_type, c.clicked_at
                 FROM product_clicks c LEFT JOIN affiliate_products a ON a.id = c.affiliate_product_id
                 ORDER BY c.clicked_at DESC, c.id DESC LIMIT ?1",
            )
            .and_then(|mut stmt| {
                stmt.query_map(params![limit], |row| {
                    Ok(ClickActivity {
                        affiliate_product_id: row.get(0)?,
                        product_name: row.get(1)?,
                        blog_post_id: row.get(2)?,
                        click_type: row.get(3)?,
                        clicked_at: row.get(4)?,
                    })
                })
                .map(|rows| rows.filter_map(|r| r.ok()).collect::<Vec<_>>())
            })
            .unwrap_or_default();

        RecentActivity { views, clicks }
    }

    pub fn device_breakdown(pool: &DbPool) -> Vec<CountEntry> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT COALESCE(device_type, 'unknown') AS label, COUNT(*) AS cnt
             FROM post_views GROUP BY label ORDER BY cnt DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(CountEntry {
                label: row.get(0)?,
                count: row.get(1)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}

fn count_by_post(conn: &rusqlite::Connection, sql: &str) -> HashMap<i64, i64> {
    let mut counts: HashMap<i64, i64> = HashMap::new();
    let ids: Vec<i64> = conn
        .prepare(sql)
        .and_then(|mut stmt| {
            stmt.query_map([], |row| row.get(0))
                .map(|rows| rows.filter_map(|r| r.ok()).collect::<Vec<_>>())
        })
        .unwrap_or_default();
    for id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}
