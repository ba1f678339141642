use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const DEFAULT_DB_PATH: &str = "website/db/pickbettr.db";

pub fn init_pool(path: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    // Foreign keys are per-connection in SQLite, so every pooled connection gets them
    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            color TEXT NOT NULL DEFAULT 'primary'
                CHECK (color IN ('primary', 'secondary', 'accent')),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS subcategories (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS blog_posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            excerpt TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            category_id INTEGER NOT NULL,
            subcategory_id INTEGER,
            featured_image_url TEXT,
            author_name TEXT,
            author_email TEXT,
            read_time INTEGER NOT NULL DEFAULT 5,
            published INTEGER NOT NULL DEFAULT 0,
            published_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE RESTRICT,
            FOREIGN KEY (subcategory_id) REFERENCES subcategories(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_category ON blog_posts(category_id);
        CREATE INDEX IF NOT EXISTS idx_posts_subcategory ON blog_posts(subcategory_id);
        CREATE INDEX IF NOT EXISTS idx_posts_created ON blog_posts(created_at);

        CREATE TABLE IF NOT EXISTS affiliate_products (
            id INTEGER PRIMARY KEY,
            blog_post_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            image_url TEXT NOT NULL,
            amazon_affiliate_link TEXT NOT NULL,
            price TEXT,
            rating REAL,
            review_count INTEGER NOT NULL DEFAULT 0,
            display_order INTEGER NOT NULL DEFAULT 0,
            is_featured INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (blog_post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_products_post ON affiliate_products(blog_post_id);

        CREATE TABLE IF NOT EXISTS product_library (
            id INTEGER PRIMARY KEY,
            subcategory_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            image_url TEXT NOT NULL,
            amazon_affiliate_link TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            is_featured INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (subcategory_id) REFERENCES subcategories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_library_subcategory ON product_library(subcategory_id);

        CREATE TABLE IF NOT EXISTS related_articles (
            id INTEGER PRIMARY KEY,
            blog_post_id INTEGER NOT NULL,
            related_post_id INTEGER NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(blog_post_id, related_post_id),
            FOREIGN KEY (blog_post_id) REFERENCES blog_posts(id) ON DELETE CASCADE,
            FOREIGN KEY (related_post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS post_views (
            id INTEGER PRIMARY KEY,
            blog_post_id INTEGER NOT NULL,
            ip_hash TEXT,
            user_agent TEXT,
            referrer TEXT,
            device_type TEXT,
            browser TEXT,
            viewed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (blog_post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_views_post ON post_views(blog_post_id);
        CREATE INDEX IF NOT EXISTS idx_views_date ON post_views(viewed_at);

        CREATE TABLE IF NOT EXISTS product_clicks (
            id INTEGER PRIMARY KEY,
            affiliate_product_id INTEGER,
            blog_post_id INTEGER NOT NULL,
            click_type TEXT NOT NULL DEFAULT 'buy_now'
                CHECK (click_type IN ('buy_now', 'add_to_cart')),
            ip_hash TEXT,
            user_agent TEXT,
            referrer TEXT,
            clicked_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (affiliate_product_id) REFERENCES affiliate_products(id) ON DELETE SET NULL,
            FOREIGN KEY (blog_post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_clicks_post ON product_clicks(blog_post_id);
        CREATE INDEX IF NOT EXISTS idx_clicks_date ON product_clicks(clicked_at);

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            ip_hash TEXT,
            user_agent TEXT
        );
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // General
        ("site_name", "PickBettr"),
        ("site_tagline", "We suggest the best products after thorough research and testing."),
        ("site_url", "http://localhost:8000"),
        ("admin_email", ""),
        ("admin_password_hash", ""),
        // Security
        ("session_expiry_hours", "24"),
        ("login_rate_limit", "5"),
        // Blog
        ("home_recent_posts", "3"),
        ("rss_feed_count", "25"),
        // Images
        ("images_max_upload_mb", "5"),
        ("images_webp_convert", "false"),
        // SEO
        ("seo_twitter_handle", "@pickbettr"),
        ("seo_robots_txt", "User-agent: *\nAllow: /\nDisallow: /admin"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    Ok(())
}
