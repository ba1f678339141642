use chrono::{DateTime, NaiveDateTime, Utc};

use crate::db::DbPool;
use crate::models::post::BlogPost;
use crate::models::settings::Setting;
use crate::seo::{xml_escape, SiteInfo};

fn rfc2822(ndt: NaiveDateTime) -> String {
    let utc: DateTime<Utc> = DateTime::from_naive_utc_and_offset(ndt, Utc);
    utc.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// RSS 2.0 feed of the most recent live posts.
pub fn generate_feed(pool: &DbPool) -> String {
    let site = SiteInfo::load(pool);
    let feed_count = Setting::get_i64(pool, "rss_feed_count");
    let feed_count = if feed_count <= 0 { 25 } else { feed_count.min(100) };

    let posts = BlogPost::recent(pool, feed_count);
    render_feed(&site, &posts)
}

pub fn render_feed(site: &SiteInfo, posts: &[BlogPost]) -> String {
    let last_build = posts
        .first()
        .and_then(|p| p.published_at)
        .map(|d| format!("    <lastBuildDate>{}</lastBuildDate>\n", rfc2822(d)))
        .unwrap_or_default();

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>{title}</title>
    <link>{url}</link>
    <description>{desc}</description>
    <atom:link href="{url}/feed" rel="self" type="application/rss+xml"/>
    <language>en</language>
{last_build}"#,
        title = xml_escape(&site.name),
        url = xml_escape(&site.url),
        desc = xml_escape(&site.tagline),
        last_build = last_build,
    );

    for post in posts {
        let pub_date = post.published_at.map(rfc2822).unwrap_or_default();
        xml.push_str(&format!(
            r#"    <item>
        <title>{title}</title>
        <link>{url}/blog/{slug}</link>
        <guid isPermaLink="true">{url}/blog/{slug}</guid>
        <pubDate>{date}</pubDate>
        <description>{desc}</description>
    </item>
"#,
            title = xml_escape(&post.title),
            url = xml_escape(&site.url),
            slug = post.slug,
            date = pub_date,
            desc = xml_escape(&post.excerpt),
        ));
    }

    xml.push_str("</channel>\n</rss>");
    xml
}
