use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::db::DbPool;
use crate::models::category::Category;
use crate::models::post::{BlogPost, PostWithRelations};
use crate::models::product::AffiliateProduct;
use crate::models::settings::Setting;
use crate::models::subcategory::Subcategory;

/// Site identity used by meta tags, structured data, the sitemap and the feed.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    pub tagline: String,
    pub twitter: String,
}

impl SiteInfo {
    pub fn load(pool: &DbPool) -> Self {
        SiteInfo {
            name: Setting::get_or(pool, "site_name", "PickBettr"),
            url: Setting::get_or(pool, "site_url", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            tagline: Setting::get_or(pool, "site_tagline", ""),
            twitter: Setting::get_or(pool, "seo_twitter_handle", ""),
        }
    }

    /// Absolute URL for a site path or an already absolute link.
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.url, path)
        }
    }

    fn logo(&self) -> String {
        format!("{}/static/icon.svg", self.url)
    }
}

/// Head tags for one page.
pub struct PageMeta<'a> {
    pub title: Option<&'a str>,
    pub description: &'a str,
    pub path: &'a str,
    pub og_type: &'a str,
    pub image: Option<&'a str>,
}

pub fn build_meta(site: &SiteInfo, page: &PageMeta<'_>) -> String {
    let page_title = match page.title {
        Some(t) => format!("{} | {}", t, site.name),
        None => site.name.clone(),
    };
    let description = if page.description.is_empty() {
        site.tagline.as_str()
    } else {
        page.description
    };
    let canonical = site.absolute(page.path);
    let image = site.absolute(page.image.unwrap_or("/static/icon.svg"));

    let mut meta = format!(
        r#"<title>{title}</title>
<meta name="description" content="{desc}">
<link rel="canonical" href="{url}">
<meta property="og:title" content="{og_title}">
<meta property="og:description" content="{desc}">
<meta property="og:url" content="{url}">
<meta property="og:site_name" content="{site}">
<meta property="og:type" content="{og_type}">
<meta property="og:locale" content="en_US">
<meta property="og:image" content="{image}">
<meta name="twitter:card" content="summary_large_image">
<meta name="twitter:title" content="{og_title}">
<meta name="twitter:description" content="{desc}">
<meta name="twitter:image" content="{image}">"#,
        title = html_escape(&page_title),
        og_title = html_escape(page.title.unwrap_or(&site.name)),
        desc = html_escape(description),
        url = html_escape(&canonical),
        site = html_escape(&site.name),
        og_type = html_escape(page.og_type),
        image = html_escape(&image),
    );
    if !site.twitter.is_empty() {
        meta.push_str(&format!(
            "\n<meta name=\"twitter:creator\" content=\"{}\">",
            html_escape(&site.twitter)
        ));
    }
    meta
}

/// Serialise structured data into a script tag that cannot close early.
pub fn ld_json_script(value: &Value) -> String {
    let body = value.to_string().replace("</", "<\\/");
    format!(r#"<script type="application/ld+json">{}</script>"#, body)
}

fn iso(dt: chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Words in rendered HTML content.
pub fn word_count(html: &str) -> usize {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let re = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    re.replace_all(html, " ").split_whitespace().count()
}

/// BlogPosting data for an article page.
pub fn post_jsonld(site: &SiteInfo, post: &PostWithRelations) -> Value {
    let p = &post.post;
    let url = site.absolute(&format!("/blog/{}", p.slug));
    let image = p
        .featured_image_url
        .as_deref()
        .map(|i| site.absolute(i))
        .unwrap_or_else(|| site.logo());
    let keywords: Vec<&str> = [
        post.category.as_ref().map(|c| c.name.as_str()),
        post.subcategory.as_ref().map(|s| s.name.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect();
    let description = if p.excerpt.is_empty() {
        &p.title
    } else {
        &p.excerpt
    };

    json!({
        "@context": "https://schema.org",
        "@type": "BlogPosting",
        "headline": p.title,
        "description": description,
        "image": [image],
        "datePublished": iso(p.published_at.unwrap_or(p.created_at)),
        "dateModified": iso(p.updated_at),
        "author": {
            "@type": "Person",
            "name": p.author_name.as_deref().unwrap_or(&site.name),
        },
        "publisher": {
            "@type": "Organization",
            "name": site.name,
            "logo": { "@type": "ImageObject", "url": site.logo() },
        },
        "mainEntityOfPage": { "@type": "WebPage", "@id": url },
        "articleSection": post.category.as_ref().map(|c| c.name.as_str()).unwrap_or(""),
        "keywords": keywords.join(", "),
        "wordCount": word_count(&p.content),
        "timeRequired": format!("PT{}M", p.read_time),
    })
}

/// Product data for the products listed in an article. `None` when there are none.
pub fn products_jsonld(site: &SiteInfo, products: &[AffiliateProduct]) -> Option<Value> {
    if products.is_empty() {
        return None;
    }
    let items: Vec<Value> = products
        .iter()
        .map(|product| {
            let mut item = json!({
                "@context": "https://schema.org",
                "@type": "Product",
                "name": product.name,
                "description": product.description,
                "image": site.absolute(&product.image_url),
                "offers": {
                    "@type": "Offer",
                    "url": product.amazon_affiliate_link,
                    "priceCurrency": "USD",
                    "price": product.price.clone().unwrap_or_else(|| "0".to_string()),
                    "availability": "https://schema.org/InStock",
                },
            });
            if let Some(asin) = product.asin() {
                item["sku"] = json!(asin);
            }
            if let (Some(rating), true) = (product.rating, product.review_count > 0) {
                item["aggregateRating"] = json!({
                    "@type": "AggregateRating",
                    "ratingValue": rating.to_string(),
                    "reviewCount": product.review_count.to_string(),
                });
            }
            item
        })
        .collect();
    Some(Value::Array(items))
}

/// Organization, WebSite and (when there are posts) Blog data for the home page.
pub fn home_jsonld(site: &SiteInfo, recent: &[BlogPost]) -> Vec<Value> {
    let mut out = vec![
        json!({
            "@context": "https://schema.org",
            "@type": "Organization",
            "name": site.name,
            "url": site.url,
            "logo": site.logo(),
            "description": site.tagline,
        }),
        json!({
            "@context": "https://schema.org",
            "@type": "WebSite",
            "name": site.name,
            "url": site.url,
            "description": site.tagline,
        }),
    ];

    if !recent.is_empty() {
        let posts: Vec<Value> = recent
            .iter()
            .map(|p| {
                json!({
                    "@type": "BlogPosting",
                    "headline": p.title,
                    "description": p.excerpt,
                    "url": site.absolute(&format!("/blog/{}", p.slug)),
                    "datePublished": iso(p.published_at.unwrap_or(p.created_at)),
                })
            })
            .collect();
        out.push(json!({
            "@context": "https://schema.org",
            "@type": "Blog",
            "name": format!("{} Blog", site.name),
            "url": site.absolute("/blog"),
            "blogPost": posts,
        }));
    }
    out
}

pub fn generate_sitemap(pool: &DbPool) -> String {
    let site = SiteInfo::load(pool);

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );

    xml.push_str(&format!(
        "  <url><loc>{}/</loc><changefreq>daily</changefreq><priority>1.0</priority></url>\n",
        xml_escape(&site.url)
    ));
    xml.push_str(&format!(
        "  <url><loc>{}/blog</loc><changefreq>daily</changefreq><priority>0.8</priority></url>\n",
        xml_escape(&site.url)
    ));

    for category in Category::list(pool) {
        xml.push_str(&format!(
            "  <url><loc>{}/category/{}</loc><changefreq>weekly</changefreq><priority>0.5</priority></url>\n",
            xml_escape(&site.url),
            category.slug
        ));
    }
    for sub in Subcategory::list(pool, None) {
        xml.push_str(&format!(
            "  <url><loc>{}/subcategory/{}</loc><changefreq>weekly</changefreq><priority>0.5</priority></url>\n",
            xml_escape(&site.url),
            sub.slug
        ));
    }

    for post in BlogPost::list(pool, true) {
        let lastmod = post.updated_at.format("%Y-%m-%d").to_string();
        xml.push_str(&format!(
            "  <url><loc>{}/blog/{}</loc><lastmod>{}</lastmod><priority>0.6</priority></url>\n",
            xml_escape(&site.url),
            post.slug,
            lastmod
        ));
    }

    xml.push_str("</urlset>");
    xml
}

pub fn robots_txt(pool: &DbPool) -> String {
    let site = SiteInfo::load(pool);
    let body = Setting::get_or(pool, "seo_robots_txt", "User-agent: *\nAllow: /");
    format!("{}\n\nSitemap: {}/sitemap.xml\n", body.trim_end(), site.url)
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
