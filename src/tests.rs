#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rocket::http::{ContentType, Cookie, Header, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};

use crate::auth;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::models::analytics::{Analytics, ClickType, VisitMeta};
use crate::models::category::{Category, CategoryForm};
use crate::models::library::{LibraryForm, LibraryItem, LibraryPatch, MISSING_FIELDS};
use crate::models::post::{BlogPost, PostForm};
use crate::models::product::{AffiliateProduct, Direction, ProductInput};
use crate::models::related::RelatedArticle;
use crate::models::settings::Setting;
use crate::models::subcategory::{Subcategory, SubcategoryForm};
use crate::preview::{build_preview, PreviewRequest};
use crate::routes::admin::posts::{PostFormData, ProductRow};
use crate::routes::auth::{validate_setup, SetupForm};
use crate::rss;
use crate::seo;

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Fresh in-memory SQLite pool with migrations and seed defaults applied.
/// Named shared-cache DB so every pooled connection sees the same data.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:pickbettr_test_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn make_category(pool: &DbPool, name: &str, slug: &str) -> i64 {
    Category::create(
        pool,
        &CategoryForm {
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            color: "primary".to_string(),
        },
    )
    .unwrap()
}

fn make_subcategory(pool: &DbPool, category_id: i64, name: &str, slug: &str) -> i64 {
    Subcategory::create(
        pool,
        &SubcategoryForm {
            category_id,
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
        },
    )
    .unwrap()
}

fn make_post_form(title: &str, slug: &str, category_id: i64, published: bool) -> PostForm {
    PostForm {
        title: title.to_string(),
        slug: slug.to_string(),
        excerpt: format!("{} excerpt", title),
        content: format!("<p>{} body</p>", title),
        category_id,
        subcategory_id: None,
        featured_image_url: None,
        author_name: Some("Sam".to_string()),
        author_email: None,
        read_time: 7,
        published,
    }
}

fn make_post(pool: &DbPool, title: &str, slug: &str, category_id: i64, published: bool) -> i64 {
    BlogPost::create(pool, &make_post_form(title, slug, category_id, published)).unwrap()
}

fn product(name: &str, asin: &str) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        description: format!("{} description", name),
        image_url: format!("/uploads/products/{}.jpg", asin),
        amazon_affiliate_link: format!("https://www.amazon.com/dp/{}?tag=pick-20", asin),
        is_featured: false,
    }
}

fn three_products() -> Vec<ProductInput> {
    vec![
        product("Alpha", "B000000001"),
        product("Bravo", "B000000002"),
        product("Charlie", "B000000003"),
    ]
}

fn library_form(subcategory_id: i64, name: &str) -> LibraryForm {
    LibraryForm {
        subcategory_id,
        name: name.to_string(),
        description: format!("{} description", name),
        image_url: "/uploads/products/x.jpg".to_string(),
        amazon_affiliate_link: format!("https://amzn.to/{}", name.to_lowercase()),
        is_featured: false,
    }
}

fn meta() -> VisitMeta {
    VisitMeta {
        ip_hash: Some(auth::hash_ip("203.0.113.9")),
        user_agent: Some("test-agent".to_string()),
        referrer: None,
        device_type: Some("desktop".to_string()),
        browser: Some("Firefox".to_string()),
    }
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
}

#[test]
fn settings_get_or_default() {
    let pool = test_pool();
    assert_eq!(Setting::get_or(&pool, "missing", "fallback"), "fallback");
}

#[test]
fn settings_typed_getters() {
    let pool = test_pool();
    Setting::set(&pool, "flag", "true").unwrap();
    Setting::set(&pool, "number", "42").unwrap();
    assert!(Setting::get_bool(&pool, "flag"));
    assert!(!Setting::get_bool(&pool, "images_webp_convert"));
    assert_eq!(Setting::get_i64(&pool, "number"), 42);
    assert_eq!(Setting::get_i64(&pool, "missing"), 0);
}

#[test]
fn settings_upsert() {
    let pool = test_pool();
    Setting::set(&pool, "site_name", "First").unwrap();
    Setting::set(&pool, "site_name", "Second").unwrap();
    assert_eq!(Setting::get(&pool, "site_name"), Some("Second".to_string()));
}

#[test]
fn seed_does_not_overwrite() {
    let pool = test_pool();
    Setting::set(&pool, "site_name", "Custom").unwrap();
    seed_defaults(&pool).unwrap();
    assert_eq!(Setting::get(&pool, "site_name"), Some("Custom".to_string()));
    assert_eq!(Setting::get_i64(&pool, "home_recent_posts"), 3);
}

// ═══════════════════════════════════════════════════════════
// Auth
// ═══════════════════════════════════════════════════════════

#[test]
fn fresh_install_needs_setup() {
    let pool = test_pool();
    assert!(auth::needs_setup(&pool));
    Setting::set(&pool, "admin_email", "admin@example.com").unwrap();
    Setting::set(&pool, "admin_password_hash", &fast_hash("supersecret")).unwrap();
    assert!(!auth::needs_setup(&pool));
}

#[test]
fn credentials_match_email_case_insensitively() {
    let pool = test_pool();
    Setting::set(&pool, "admin_email", "Admin@Example.com").unwrap();
    Setting::set(&pool, "admin_password_hash", &fast_hash("supersecret")).unwrap();

    assert!(auth::check_credentials(&pool, "admin@example.com", "supersecret"));
    assert!(!auth::check_credentials(&pool, "admin@example.com", "wrong"));
    assert!(!auth::check_credentials(&pool, "other@example.com", "supersecret"));
}

#[test]
fn credentials_fail_before_setup() {
    let pool = test_pool();
    assert!(!auth::check_credentials(&pool, "", ""));
}

#[test]
fn session_lifecycle() {
    let pool = test_pool();
    let sid = auth::create_session(&pool, Some("127.0.0.1"), Some("ua")).unwrap();
    assert!(auth::validate_session(&pool, &sid));
    assert!(!auth::validate_session(&pool, "not-a-session"));

    auth::destroy_session(&pool, &sid).unwrap();
    assert!(!auth::validate_session(&pool, &sid));
}

#[test]
fn expired_sessions_are_cleaned_up() {
    let pool = test_pool();
    let live = auth::create_session(&pool, None, None).unwrap();
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, created_at, expires_at) VALUES ('old', '2020-01-01 00:00:00', '2020-01-02 00:00:00')",
            [],
        )
        .unwrap();
    }
    assert!(!auth::validate_session(&pool, "old"));
    assert_eq!(auth::cleanup_expired_sessions(&pool).unwrap(), 1);
    assert!(auth::validate_session(&pool, &live));
}

fn setup_form(email: &str, password: &str, confirm: &str) -> SetupForm {
    SetupForm {
        site_name: "PickBettr".to_string(),
        site_url: "https://pickbettr.test".to_string(),
        admin_email: email.to_string(),
        password: password.to_string(),
        confirm_password: confirm.to_string(),
    }
}

#[test]
fn setup_validation_messages() {
    assert_eq!(
        validate_setup(&setup_form("nope", "longenough", "longenough")),
        Some("A valid email is required.")
    );
    assert_eq!(
        validate_setup(&setup_form("a@b.co", "short", "short")),
        Some("Password must be at least 8 characters.")
    );
    assert_eq!(
        validate_setup(&setup_form("a@b.co", "longenough", "different")),
        Some("Passwords do not match.")
    );
    assert_eq!(validate_setup(&setup_form("a@b.co", "longenough", "longenough")), None);
}

// ═══════════════════════════════════════════════════════════
// Categories & subcategories
// ═══════════════════════════════════════════════════════════

#[test]
fn category_crud() {
    let pool = test_pool();
    let id = make_category(&pool, "Kitchen", "kitchen");

    let cat = Category::find_by_slug(&pool, "kitchen").unwrap();
    assert_eq!(cat.id, id);
    assert_eq!(cat.color, "primary");

    Category::update(
        &pool,
        id,
        &CategoryForm {
            name: "Kitchen & Dining".to_string(),
            slug: "kitchen-dining".to_string(),
            description: Some("Cook better".to_string()),
            color: "neon".to_string(),
        },
    )
    .unwrap();
    let cat = Category::find_by_id(&pool, id).unwrap();
    assert_eq!(cat.slug, "kitchen-dining");
    assert_eq!(cat.color, "primary");

    Category::delete(&pool, id).unwrap();
    assert!(Category::find_by_id(&pool, id).is_none());
}

#[test]
fn category_slug_is_unique() {
    let pool = test_pool();
    make_category(&pool, "Kitchen", "kitchen");
    let dup = Category::create(
        &pool,
        &CategoryForm {
            name: "Kitchen again".to_string(),
            slug: "kitchen".to_string(),
            description: None,
            color: "accent".to_string(),
        },
    );
    assert!(dup.is_err());
}

#[test]
fn category_with_posts_cannot_be_deleted() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "Best Fryers", "best-fryers", cat, true);

    let err = Category::delete(&pool, cat).unwrap_err();
    assert!(err.contains("still has posts"));
    assert_eq!(Category::count_posts(&pool, cat), 1);
}

#[test]
fn deleting_category_removes_subcategories() {
    let pool = test_pool();
    let cat = make_category(&pool, "Garden", "garden");
    let sub = make_subcategory(&pool, cat, "Mowers", "mowers");

    Category::delete(&pool, cat).unwrap();
    assert!(Subcategory::find_by_id(&pool, sub).is_none());
}

#[test]
fn subcategories_filter_by_category() {
    let pool = test_pool();
    let kitchen = make_category(&pool, "Kitchen", "kitchen");
    let garden = make_category(&pool, "Garden", "garden");
    make_subcategory(&pool, kitchen, "Fryers", "fryers");
    make_subcategory(&pool, kitchen, "Blenders", "blenders");
    make_subcategory(&pool, garden, "Mowers", "mowers");

    assert_eq!(Subcategory::list(&pool, Some(kitchen)).len(), 2);
    assert_eq!(Subcategory::list(&pool, None).len(), 3);

    let with_parent = Subcategory::list_with_parent(&pool);
    let mowers = with_parent
        .iter()
        .find(|s| s.subcategory.slug == "mowers")
        .unwrap();
    assert_eq!(mowers.category_slug, "garden");
}

// ═══════════════════════════════════════════════════════════
// Posts
// ═══════════════════════════════════════════════════════════

#[test]
fn post_crud() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "Best Fryers", "best-fryers", cat, false);

    let post = BlogPost::find_by_id(&pool, id).unwrap();
    assert_eq!(post.title, "Best Fryers");
    assert_eq!(post.read_time, 7);
    assert!(!post.published);
    assert!(post.published_at.is_none());

    let mut form = make_post_form("Best Air Fryers", "best-air-fryers", cat, false);
    form.read_time = 0;
    BlogPost::update(&pool, id, &form).unwrap();
    let post = BlogPost::find_by_id(&pool, id).unwrap();
    assert_eq!(post.slug, "best-air-fryers");
    assert_eq!(post.read_time, 1);

    BlogPost::delete(&pool, id).unwrap();
    assert!(BlogPost::find_by_id(&pool, id).is_none());
}

#[test]
fn post_validation() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let mut form = make_post_form("  ", "x", cat, false);
    assert!(BlogPost::create(&pool, &form).is_err());
    form.title = "Title".to_string();
    form.category_id = 0;
    assert_eq!(BlogPost::create(&pool, &form).unwrap_err(), "Category is required");
}

#[test]
fn post_slug_is_unique() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "One", "same", cat, false);
    assert!(BlogPost::create(&pool, &make_post_form("Two", "same", cat, false)).is_err());
}

#[test]
fn publishing_stamps_published_at_once() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "Draft", "draft", cat, false);

    BlogPost::update(&pool, id, &make_post_form("Draft", "draft", cat, true)).unwrap();
    let first = BlogPost::find_by_id(&pool, id).unwrap().published_at;
    assert!(first.is_some());

    BlogPost::update(&pool, id, &make_post_form("Draft edited", "draft", cat, true)).unwrap();
    let second = BlogPost::find_by_id(&pool, id).unwrap().published_at;
    assert_eq!(first, second);
}

#[test]
fn unpublishing_keeps_timestamp_but_hides_post() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "Live", "live", cat, true);

    BlogPost::update(&pool, id, &make_post_form("Live", "live", cat, false)).unwrap();
    let post = BlogPost::find_by_id(&pool, id).unwrap();
    assert!(!post.is_live());
    assert!(BlogPost::find_by_slug(&pool, "live", true).is_none());
    assert!(BlogPost::find_by_slug(&pool, "live", false).is_some());
}

#[test]
fn published_only_listing_hides_drafts() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "Live", "live", cat, true);
    make_post(&pool, "Draft", "draft", cat, false);

    assert_eq!(BlogPost::list(&pool, true).len(), 1);
    assert_eq!(BlogPost::list(&pool, false).len(), 2);
    assert_eq!(BlogPost::count(&pool), 2);
    assert_eq!(BlogPost::count_published(&pool), 1);
}

#[test]
fn listing_is_newest_first() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let a = make_post(&pool, "A", "a", cat, true);
    let b = make_post(&pool, "B", "b", cat, true);
    let c = make_post(&pool, "C", "c", cat, true);

    let ids: Vec<i64> = BlogPost::list(&pool, true).iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![c, b, a]);
    assert_eq!(BlogPost::recent(&pool, 2).len(), 2);
}

#[test]
fn filter_by_slugs_ignores_unknown_slugs() {
    let pool = test_pool();
    let kitchen = make_category(&pool, "Kitchen", "kitchen");
    let garden = make_category(&pool, "Garden", "garden");
    let fryers = make_subcategory(&pool, kitchen, "Fryers", "fryers");

    let mut form = make_post_form("Fryer pick", "fryer-pick", kitchen, true);
    form.subcategory_id = Some(fryers);
    BlogPost::create(&pool, &form).unwrap();
    make_post(&pool, "Kettle pick", "kettle-pick", kitchen, true);
    make_post(&pool, "Mower pick", "mower-pick", garden, true);

    assert_eq!(BlogPost::filtered_by_slugs(&pool, Some("kitchen"), None, true).len(), 2);
    assert_eq!(
        BlogPost::filtered_by_slugs(&pool, Some("kitchen"), Some("fryers"), true).len(),
        1
    );
    assert_eq!(BlogPost::filtered_by_slugs(&pool, Some("nope"), None, true).len(), 3);
}

#[test]
fn category_pages_need_an_existing_slug() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "One", "one", cat, true);

    assert_eq!(BlogPost::by_category_slug(&pool, "kitchen", true).len(), 1);
    assert!(BlogPost::by_category_slug(&pool, "missing", true).is_empty());
    assert!(BlogPost::by_subcategory_slug(&pool, "missing", true).is_empty());
}

#[test]
fn with_relations_attaches_category_and_products() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    let posts = BlogPost::with_relations(&pool, BlogPost::list(&pool, true));
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].category.as_ref().unwrap().slug, "kitchen");
    assert!(posts[0].subcategory.is_none());
    let names: Vec<&str> = posts[0].products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);
}

// ═══════════════════════════════════════════════════════════
// Affiliate products
// ═══════════════════════════════════════════════════════════

#[test]
fn products_require_three_to_five() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);

    let two = vec![product("A", "B000000001"), product("B", "B000000002")];
    assert_eq!(
        AffiliateProduct::replace_for_post(&pool, id, &two).unwrap_err(),
        "You must add between 3-5 products"
    );

    let six: Vec<ProductInput> = (1..=6)
        .map(|i| product(&format!("P{}", i), &format!("B00000000{}", i)))
        .collect();
    assert!(AffiliateProduct::replace_for_post(&pool, id, &six).is_err());
    assert!(AffiliateProduct::list_for_post(&pool, id).is_empty());

    assert_eq!(AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap(), 3);
}

#[test]
fn incomplete_rows_are_dropped_before_counting() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);

    let mut rows = three_products();
    rows.push(ProductInput {
        name: "Half filled".to_string(),
        ..Default::default()
    });
    assert_eq!(AffiliateProduct::replace_for_post(&pool, id, &rows).unwrap(), 3);

    let saved = AffiliateProduct::list_for_post(&pool, id);
    let orders: Vec<i64> = saved.iter().map(|p| p.display_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn empty_product_set_leaves_existing_products() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    let blank = vec![ProductInput::default(); 5];
    assert_eq!(AffiliateProduct::replace_for_post(&pool, id, &blank).unwrap(), 0);
    assert_eq!(AffiliateProduct::list_for_post(&pool, id).len(), 3);
}

#[test]
fn replacing_products_swaps_the_whole_set() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    let mut next = three_products();
    next.push(product("Delta", "B000000004"));
    next[0].is_featured = true;
    AffiliateProduct::replace_for_post(&pool, id, &next).unwrap();

    let saved = AffiliateProduct::list_for_post(&pool, id);
    assert_eq!(saved.len(), 4);
    assert!(saved[0].is_featured);
    assert_eq!(saved[3].name, "Delta");
    assert_eq!(saved[3].asin().as_deref(), Some("B000000004"));
}

#[test]
fn move_product_swaps_neighbours() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();
    let saved = AffiliateProduct::list_for_post(&pool, id);

    AffiliateProduct::move_product(&pool, id, saved[2].id, Direction::Up).unwrap();
    let names: Vec<String> = AffiliateProduct::list_for_post(&pool, id)
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "Charlie", "Bravo"]);

    // Past the top is a no-op.
    AffiliateProduct::move_product(&pool, id, saved[0].id, Direction::Up).unwrap();
    assert_eq!(AffiliateProduct::list_for_post(&pool, id)[0].name, "Alpha");
}

#[test]
fn remove_product_renumbers() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();
    let saved = AffiliateProduct::list_for_post(&pool, id);

    AffiliateProduct::remove(&pool, id, saved[0].id).unwrap();
    let left = AffiliateProduct::list_for_post(&pool, id);
    assert_eq!(left.len(), 2);
    assert_eq!(left[0].display_order, 0);
    assert_eq!(left[1].display_order, 1);

    assert!(AffiliateProduct::remove(&pool, id, 9999).is_err());
}

#[test]
fn add_from_library_appends_and_refuses_duplicates() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    let lib_id = LibraryItem::create(&pool, &library_form(sub, "Ninja")).unwrap();
    let item = LibraryItem::find_by_id(&pool, lib_id).unwrap();

    AffiliateProduct::add_from_library(&pool, id, &item).unwrap();
    let saved = AffiliateProduct::list_for_post(&pool, id);
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[3].name, "Ninja");
    assert_eq!(saved[3].display_order, 3);

    let err = AffiliateProduct::add_from_library(&pool, id, &item).unwrap_err();
    assert!(err.contains("already added"));
}

#[test]
fn add_from_library_stops_at_five() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");
    let id = make_post(&pool, "One", "one", cat, false);
    let five: Vec<ProductInput> = (1..=5)
        .map(|i| product(&format!("P{}", i), &format!("B00000000{}", i)))
        .collect();
    AffiliateProduct::replace_for_post(&pool, id, &five).unwrap();

    let lib_id = LibraryItem::create(&pool, &library_form(sub, "Extra")).unwrap();
    let item = LibraryItem::find_by_id(&pool, lib_id).unwrap();
    assert_eq!(
        AffiliateProduct::add_from_library(&pool, id, &item).unwrap_err(),
        "Maximum 5 products allowed per post"
    );
}

#[test]
fn deleting_post_removes_its_products() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, false);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    BlogPost::delete(&pool, id).unwrap();
    assert!(AffiliateProduct::list_for_post(&pool, id).is_empty());
}

// ═══════════════════════════════════════════════════════════
// Product library
// ═══════════════════════════════════════════════════════════

#[test]
fn library_create_appends_in_subcategory() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let fryers = make_subcategory(&pool, cat, "Fryers", "fryers");
    let blenders = make_subcategory(&pool, cat, "Blenders", "blenders");

    let a = LibraryItem::create(&pool, &library_form(fryers, "Ninja")).unwrap();
    let b = LibraryItem::create(&pool, &library_form(fryers, "Cosori")).unwrap();
    let c = LibraryItem::create(&pool, &library_form(blenders, "Vitamix")).unwrap();

    assert_eq!(LibraryItem::find_by_id(&pool, a).unwrap().display_order, 0);
    assert_eq!(LibraryItem::find_by_id(&pool, b).unwrap().display_order, 1);
    assert_eq!(LibraryItem::find_by_id(&pool, c).unwrap().display_order, 0);

    let listing = LibraryItem::list(&pool, Some(fryers)).unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].subcategory.slug, "fryers");
    assert_eq!(listing[0].subcategory.category.slug, "kitchen");
}

#[test]
fn library_requires_all_fields() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");

    let mut form = library_form(sub, "Ninja");
    form.image_url = String::new();
    assert!(LibraryItem::create(&pool, &form).is_err());
    assert_eq!(
        LibraryItem::create_with_order(&pool, &form, Some(2)).unwrap_err(),
        MISSING_FIELDS
    );
}

#[test]
fn library_create_with_order_defaults_to_zero() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");

    let a = LibraryItem::create_with_order(&pool, &library_form(sub, "A"), None).unwrap();
    let b = LibraryItem::create_with_order(&pool, &library_form(sub, "B"), Some(4)).unwrap();
    assert_eq!(LibraryItem::find_by_id(&pool, a).unwrap().display_order, 0);
    assert_eq!(LibraryItem::find_by_id(&pool, b).unwrap().display_order, 4);
}

#[test]
fn library_patch_updates_only_given_fields() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");
    let id = LibraryItem::create(&pool, &library_form(sub, "Ninja")).unwrap();

    let updated = LibraryItem::patch(
        &pool,
        id,
        &LibraryPatch {
            name: Some("Ninja Max".to_string()),
            is_featured: Some(true),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.name, "Ninja Max");
    assert!(updated.is_featured);
    assert_eq!(updated.description, "Ninja description");

    assert!(LibraryItem::patch(&pool, 9999, &LibraryPatch::default()).is_err());
}

#[test]
fn library_search_matches_name_and_subcategory() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let fryers = make_subcategory(&pool, cat, "Air Fryers", "air-fryers");
    let blenders = make_subcategory(&pool, cat, "Blenders", "blenders");
    LibraryItem::create(&pool, &library_form(fryers, "Ninja")).unwrap();
    LibraryItem::create(&pool, &library_form(blenders, "Vitamix")).unwrap();

    assert_eq!(LibraryItem::search(&pool, None, "vita").len(), 1);
    assert_eq!(LibraryItem::search(&pool, None, "AIR").len(), 1);
    assert_eq!(LibraryItem::search(&pool, None, "  ").len(), 2);
    assert!(LibraryItem::search(&pool, Some(blenders), "ninja").is_empty());
}

#[test]
fn library_move_stays_within_subcategory() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");
    let a = LibraryItem::create(&pool, &library_form(sub, "A")).unwrap();
    let b = LibraryItem::create(&pool, &library_form(sub, "B")).unwrap();

    LibraryItem::move_item(&pool, b, Direction::Up).unwrap();
    let ids: Vec<i64> = LibraryItem::list(&pool, Some(sub))
        .unwrap()
        .iter()
        .map(|l| l.item.id)
        .collect();
    assert_eq!(ids, vec![b, a]);

    LibraryItem::move_item(&pool, a, Direction::Down).unwrap();
    assert_eq!(LibraryItem::find_by_id(&pool, a).unwrap().display_order, 1);
}

#[test]
fn library_delete() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Fryers", "fryers");
    let id = LibraryItem::create(&pool, &library_form(sub, "A")).unwrap();
    LibraryItem::delete(&pool, id).unwrap();
    assert!(LibraryItem::find_by_id(&pool, id).is_none());
}

// ═══════════════════════════════════════════════════════════
// Related articles
// ═══════════════════════════════════════════════════════════

#[test]
fn manual_related_keeps_selection_order() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let main = make_post(&pool, "Main", "main", cat, true);
    let a = make_post(&pool, "A", "a", cat, true);
    let b = make_post(&pool, "B", "b", cat, true);
    let c = make_post(&pool, "C", "c", cat, true);

    RelatedArticle::set_for_post(&pool, main, &[c, a, b]).unwrap();
    assert_eq!(RelatedArticle::ids_for_post(&pool, main), vec![c, a, b]);

    let post = BlogPost::find_by_id(&pool, main).unwrap();
    let ids: Vec<i64> = RelatedArticle::resolve(&pool, &post, true)
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![c, a, b]);
}

#[test]
fn related_drops_self_and_caps_at_three() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let main = make_post(&pool, "Main", "main", cat, true);
    let others: Vec<i64> = (0..4)
        .map(|i| make_post(&pool, &format!("P{}", i), &format!("p{}", i), cat, true))
        .collect();

    RelatedArticle::set_for_post(&pool, main, &[main, others[0], others[0]]).unwrap();
    assert_eq!(RelatedArticle::ids_for_post(&pool, main), vec![others[0]]);

    let err = RelatedArticle::set_for_post(&pool, main, &others).unwrap_err();
    assert!(err.contains("at most 3"));
}

#[test]
fn related_skips_drafts_on_public_pages() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let main = make_post(&pool, "Main", "main", cat, true);
    let draft = make_post(&pool, "Draft", "draft", cat, false);
    let live = make_post(&pool, "Live", "live", cat, true);

    RelatedArticle::set_for_post(&pool, main, &[draft, live]).unwrap();
    let post = BlogPost::find_by_id(&pool, main).unwrap();
    let ids: Vec<i64> = RelatedArticle::resolve(&pool, &post, true)
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![live]);
}

#[test]
fn related_falls_back_to_same_subcategory() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let fryers = make_subcategory(&pool, cat, "Fryers", "fryers");

    let mut form = make_post_form("Main", "main", cat, true);
    form.subcategory_id = Some(fryers);
    let main = BlogPost::create(&pool, &form).unwrap();

    let mut form = make_post_form("Sibling", "sibling", cat, true);
    form.subcategory_id = Some(fryers);
    let sibling = BlogPost::create(&pool, &form).unwrap();

    // Same category, other subcategory: not picked.
    make_post(&pool, "Cousin", "cousin", cat, true);

    let post = BlogPost::find_by_id(&pool, main).unwrap();
    let ids: Vec<i64> = RelatedArticle::resolve(&pool, &post, true)
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![sibling]);
}

#[test]
fn related_falls_back_to_category_without_subcategory() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let main = make_post(&pool, "Main", "main", cat, true);
    let others: Vec<i64> = (0..4)
        .map(|i| make_post(&pool, &format!("P{}", i), &format!("p{}", i), cat, true))
        .collect();

    let post = BlogPost::find_by_id(&pool, main).unwrap();
    let ids: Vec<i64> = RelatedArticle::resolve(&pool, &post, true)
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![others[3], others[2], others[1]]);
}

// ═══════════════════════════════════════════════════════════
// Preview
// ═══════════════════════════════════════════════════════════

#[test]
fn preview_drops_blank_rows_and_extracts_asin() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let req = PreviewRequest {
        title: Some("Unsaved".to_string()),
        category_id: Some(cat),
        read_time: Some(0),
        products: vec![
            product("Alpha", "B000000001"),
            ProductInput::default(),
            product("Bravo", "B000000002"),
        ],
        ..Default::default()
    };

    let preview = build_preview(&pool, &req);
    assert_eq!(preview.id, "preview");
    assert!(!preview.published);
    assert_eq!(preview.read_time, 5);
    assert_eq!(preview.category.as_ref().unwrap().slug, "kitchen");
    assert_eq!(preview.products.len(), 2);
    assert_eq!(preview.products[1].display_order, 1);
    assert_eq!(preview.products[1].asin.as_deref(), Some("B000000002"));
}

#[test]
fn preview_related_uses_live_posts() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let live = make_post(&pool, "Live", "live", cat, true);
    make_post(&pool, "Draft", "draft", cat, false);

    let auto = build_preview(
        &pool,
        &PreviewRequest {
            category_id: Some(cat),
            ..Default::default()
        },
    );
    let ids: Vec<i64> = auto.related_articles.iter().map(|p| p.post.id).collect();
    assert_eq!(ids, vec![live]);

    let none = build_preview(&pool, &PreviewRequest::default());
    assert!(none.related_articles.is_empty());
}

// ═══════════════════════════════════════════════════════════
// Analytics
// ═══════════════════════════════════════════════════════════

#[test]
fn views_and_clicks_are_counted_per_post() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();
    let products = AffiliateProduct::list_for_post(&pool, id);

    for _ in 0..4 {
        Analytics::record_view(&pool, id, &meta()).unwrap();
    }
    Analytics::record_click(&pool, products[0].id, id, ClickType::BuyNow, &meta()).unwrap();

    assert_eq!(Analytics::total_views(&pool), 4);
    assert_eq!(Analytics::total_clicks(&pool), 1);

    let stats = Analytics::post_analytics(&pool, id).unwrap();
    assert_eq!(stats.views, 4);
    assert_eq!(stats.clicks, 1);
    assert!(Analytics::post_analytics(&pool, 9999).is_none());
}

#[test]
fn all_post_analytics_lists_live_posts_only() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let live = make_post(&pool, "Live", "live", cat, true);
    let draft = make_post(&pool, "Draft", "draft", cat, false);
    Analytics::record_view(&pool, live, &meta()).unwrap();
    Analytics::record_view(&pool, draft, &meta()).unwrap();

    let rows = Analytics::all_post_analytics(&pool);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].post_id, live);
    assert_eq!(rows[0].views, 1);
    assert_eq!(rows[0].clicks, 0);
}

#[test]
fn top_products_sorted_by_clicks() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();
    let products = AffiliateProduct::list_for_post(&pool, id);

    Analytics::record_click(&pool, products[0].id, id, ClickType::BuyNow, &meta()).unwrap();
    for _ in 0..3 {
        Analytics::record_click(&pool, products[1].id, id, ClickType::AddToCart, &meta()).unwrap();
    }

    let top = Analytics::top_products(&pool, 10);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].product_name, "Bravo");
    assert_eq!(top[0].clicks, 3);
    assert_eq!(top[0].blog_post_title, "One");
    assert_eq!(top[1].clicks, 1);

    assert_eq!(Analytics::top_products(&pool, 1).len(), 1);
}

#[test]
fn clicks_survive_product_replacement() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();
    let old = AffiliateProduct::list_for_post(&pool, id);
    Analytics::record_click(&pool, old[0].id, id, ClickType::BuyNow, &meta()).unwrap();

    AffiliateProduct::replace_for_post(&pool, id, &three_products()).unwrap();

    assert_eq!(Analytics::total_clicks(&pool), 1);
    assert!(Analytics::top_products(&pool, 10).is_empty());
    let recent = Analytics::recent_activity(&pool, 10);
    assert_eq!(recent.clicks.len(), 1);
    assert!(recent.clicks[0].affiliate_product_id.is_none());
}

#[test]
fn deleting_post_removes_its_analytics() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    Analytics::record_view(&pool, id, &meta()).unwrap();

    BlogPost::delete(&pool, id).unwrap();
    assert_eq!(Analytics::total_views(&pool), 0);
}

#[test]
fn device_breakdown_groups_unknown() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let id = make_post(&pool, "One", "one", cat, true);
    Analytics::record_view(&pool, id, &meta()).unwrap();
    Analytics::record_view(&pool, id, &meta()).unwrap();
    Analytics::record_view(&pool, id, &VisitMeta::default()).unwrap();

    let devices = Analytics::device_breakdown(&pool);
    assert_eq!(devices[0].label, "desktop");
    assert_eq!(devices[0].count, 2);
    assert!(devices.iter().any(|d| d.label == "unknown" && d.count == 1));
}

// ═══════════════════════════════════════════════════════════
// Feed, sitemap, robots
// ═══════════════════════════════════════════════════════════

#[test]
fn feed_lists_live_posts_with_escaped_titles() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "Pots & Pans", "pots-pans", cat, true);
    make_post(&pool, "Hidden draft", "hidden", cat, false);

    let xml = rss::generate_feed(&pool);
    assert!(xml.contains("<title>Pots &amp; Pans</title>"));
    assert!(xml.contains("/blog/pots-pans</link>"));
    assert!(!xml.contains("hidden"));
}

#[test]
fn sitemap_includes_taxonomy_and_live_posts() {
    let pool = test_pool();
    Setting::set(&pool, "site_url", "https://pickbettr.test/").unwrap();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_subcategory(&pool, cat, "Fryers", "fryers");
    make_post(&pool, "Live", "live", cat, true);
    make_post(&pool, "Draft", "draft", cat, false);

    let xml = seo::generate_sitemap(&pool);
    assert!(xml.contains("<loc>https://pickbettr.test/category/kitchen</loc>"));
    assert!(xml.contains("<loc>https://pickbettr.test/subcategory/fryers</loc>"));
    assert!(xml.contains("<loc>https://pickbettr.test/blog/live</loc>"));
    assert!(!xml.contains("/blog/draft"));
}

#[test]
fn robots_points_at_sitemap() {
    let pool = test_pool();
    Setting::set(&pool, "site_url", "https://pickbettr.test").unwrap();
    let robots = seo::robots_txt(&pool);
    assert!(robots.contains("Disallow: /admin"));
    assert!(robots.ends_with("Sitemap: https://pickbettr.test/sitemap.xml\n"));
}

// ═══════════════════════════════════════════════════════════
// HTTP: REST API
// ═══════════════════════════════════════════════════════════

fn client_for(pool: &DbPool) -> Client {
    Client::tracked(crate::app(rocket::Config::figment(), pool.clone())).expect("valid rocket instance")
}

fn session_cookie(pool: &DbPool) -> Cookie<'static> {
    let id = auth::create_session(pool, Some("127.0.0.1"), Some("test-agent")).unwrap();
    Cookie::new(auth::SESSION_COOKIE, id)
}

fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
    let resp = client
        .post(uri)
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = resp.status();
    (status, resp.into_json::<Value>().unwrap_or(Value::Null))
}

#[test]
fn api_track_view_requires_post_id() {
    let pool = test_pool();
    let client = client_for(&pool);

    let (status, body) = post_json(&client, "/api/analytics/track-view", json!({}));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body, json!({ "error": "Post ID is required" }));

    let (status, _) = post_json(&client, "/api/analytics/track-view", json!({ "post_id": 0 }));
    assert_eq!(status, Status::BadRequest);
}

#[test]
fn api_track_view_records_visit() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let post = make_post(&pool, "Best Fryers", "best-fryers", cat, true);
    let client = client_for(&pool);

    let resp = client
        .post("/api/analytics/track-view")
        .header(ContentType::JSON)
        .header(Header::new("User-Agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148 Safari/604.1"))
        .body(json!({ "post_id": post }).to_string())
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.into_json::<Value>().unwrap(), json!({ "success": true }));

    assert_eq!(Analytics::post_analytics(&pool, post).unwrap().views, 1);
}

#[test]
fn api_track_view_store_failure_is_500() {
    let pool = test_pool();
    let client = client_for(&pool);

    // no such post: the foreign key rejects the insert
    let (status, body) = post_json(&client, "/api/analytics/track-view", json!({ "post_id": 4242 }));
    assert_eq!(status, Status::InternalServerError);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(Analytics::total_views(&pool), 0);
}

#[test]
fn api_track_click_validates_ids_and_type() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let post = make_post(&pool, "Best Fryers", "best-fryers", cat, true);
    AffiliateProduct::replace_for_post(&pool, post, &three_products()).unwrap();
    let product_id = AffiliateProduct::list_for_post(&pool, post)[0].id;
    let client = client_for(&pool);

    let (status, body) = post_json(&client, "/api/analytics/track-click", json!({ "post_id": post }));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body, json!({ "error": "Product ID and Post ID are required" }));

    let (status, body) = post_json(
        &client,
        "/api/analytics/track-click",
        json!({ "product_id": product_id, "post_id": post, "click_type": "wishlist" }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body, json!({ "error": "Invalid click type" }));
    assert_eq!(Analytics::total_clicks(&pool), 0);

    let (status, body) = post_json(
        &client,
        "/api/analytics/track-click",
        json!({ "product_id": product_id, "post_id": post, "click_type": "add_to_cart" }),
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(Analytics::total_clicks(&pool), 1);
}

#[test]
fn api_writes_require_session() {
    let pool = test_pool();
    let client = client_for(&pool);

    for uri in ["/api/blog", "/api/product-library", "/api/preview"] {
        let (status, body) = post_json(&client, uri, json!({ "title": "x" }));
        assert_eq!(status, Status::Unauthorized, "{}", uri);
        assert_eq!(body, json!({ "error": "Unauthorized" }), "{}", uri);
    }
    assert_eq!(BlogPost::count(&pool), 0);
}

#[test]
fn api_blog_drafts_need_session() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    make_post(&pool, "Live One", "live-one", cat, true);
    make_post(&pool, "Draft One", "draft-one", cat, false);
    let client = client_for(&pool);

    let anon: Value = client
        .get("/api/blog?published=false")
        .dispatch()
        .into_json()
        .unwrap();
    let slugs: Vec<&str> = anon.as_array().unwrap().iter().filter_map(|p| p["slug"].as_str()).collect();
    assert_eq!(slugs, vec!["live-one"]);

    let signed_in: Value = client
        .get("/api/blog?published=false")
        .private_cookie(session_cookie(&pool))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(signed_in.as_array().unwrap().len(), 2);
    assert!(signed_in
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["slug"] == json!("draft-one")));
}

#[test]
fn api_blog_create_slugs_title() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let client = client_for(&pool);

    let resp = client
        .post("/api/blog")
        .header(ContentType::JSON)
        .private_cookie(session_cookie(&pool))
        .body(json!({ "title": "Best Air Fryers 2024!", "category_id": cat }).to_string())
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let body: Value = resp.into_json().unwrap();
    assert_eq!(body["slug"], json!("best-air-fryers-2024"));
    assert_eq!(body["published"], json!(false));
    assert_eq!(BlogPost::count(&pool), 1);
}

#[test]
fn api_library_update_needs_id() {
    let pool = test_pool();
    let client = client_for(&pool);

    let resp = client
        .put("/api/product-library")
        .header(ContentType::JSON)
        .private_cookie(session_cookie(&pool))
        .body(json!({ "name": "Renamed" }).to_string())
        .dispatch();
    assert_eq!(resp.status(), Status::BadRequest);
    assert_eq!(resp.into_json::<Value>().unwrap(), json!({ "error": "Missing product id" }));
}

// ═══════════════════════════════════════════════════════════
// HTTP: admin forms
// ═══════════════════════════════════════════════════════════

fn row(name: &str, asin: &str) -> ProductRow {
    let p = product(name, asin);
    ProductRow {
        name: p.name,
        description: p.description,
        image_url: p.image_url,
        amazon_affiliate_link: format!("https://www.amazon.com/dp/{}", asin),
        is_featured: false,
    }
}

fn editor_form(title: &str, category_id: i64, rows: &[ProductRow]) -> PostFormData {
    PostFormData {
        title: title.to_string(),
        slug: String::new(),
        excerpt: "Short".to_string(),
        content: "<p>Body</p>".to_string(),
        category_id: Some(category_id),
        subcategory_id: None,
        featured_image_url: String::new(),
        author_name: String::new(),
        author_email: String::new(),
        read_time: String::new(),
        published: false,
        products: rows.to_vec(),
        related_ids: vec![],
    }
}

/// url-encoded body the editor would submit.
fn editor_body(form: &PostFormData) -> String {
    let mut fields = vec![
        format!("title={}", form.title.replace(' ', "+")),
        format!("excerpt={}", form.excerpt),
        format!("category_id={}", form.category_id.unwrap_or(0)),
    ];
    for (i, r) in form.products.iter().enumerate() {
        fields.push(format!("products[{}].name={}", i, r.name));
        fields.push(format!("products[{}].description={}", i, r.description.replace(' ', "+")));
        fields.push(format!("products[{}].image_url={}", i, r.image_url));
        fields.push(format!("products[{}].amazon_affiliate_link={}", i, r.amazon_affiliate_link));
    }
    for id in &form.related_ids {
        fields.push(format!("related_ids={}", id));
    }
    fields.join("&")
}

#[test]
fn editor_form_validation() {
    let rows = [row("Alpha", "B000000001"), row("Bravo", "B000000002"), row("Charlie", "B000000003")];

    let (post, products, related) = editor_form("Best Fryers", 1, &rows).validate(0).unwrap();
    assert_eq!(post.slug, "best-fryers");
    assert_eq!(post.read_time, crate::models::post::DEFAULT_READ_TIME);
    assert_eq!(products.len(), 3);
    assert!(related.is_empty());

    let err = editor_form("Best Fryers", 1, &rows[..2]).validate(0).unwrap_err();
    assert_eq!(err, "You must add between 3-5 products");

    assert!(editor_form("Best Fryers", 1, &[]).validate(0).is_ok());
    assert_eq!(
        editor_form("", 1, &rows).validate(0).unwrap_err(),
        "Title is required"
    );

    let mut form = editor_form("Best Fryers", 1, &rows);
    form.category_id = None;
    assert_eq!(form.validate(0).unwrap_err(), "Category is required");

    // self and duplicates are dropped before the cap applies
    let mut form = editor_form("Best Fryers", 1, &rows);
    form.related_ids = vec![7, 7, 8, 9];
    assert_eq!(form.validate(7).unwrap().2, vec![8, 9]);
    form.related_ids = vec![2, 3, 4, 5];
    assert!(form.validate(7).is_err());
}

#[test]
fn admin_create_post_saves_products() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let client = client_for(&pool);
    let rows = [row("Alpha", "B000000001"), row("Bravo", "B000000002"), row("Charlie", "B000000003")];

    let resp = client
        .post("/admin/posts/new")
        .header(ContentType::Form)
        .private_cookie(session_cookie(&pool))
        .body(editor_body(&editor_form("Best Fryers", cat, &rows)))
        .dispatch();
    assert_eq!(resp.status(), Status::SeeOther);

    let post = BlogPost::find_by_slug(&pool, "best-fryers", false).unwrap();
    assert_eq!(
        resp.headers().get_one("Location"),
        Some(format!("/admin/posts/{}/edit", post.id).as_str())
    );
    let saved = AffiliateProduct::list_for_post(&pool, post.id);
    let names: Vec<&str> = saved.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);
    assert!(!post.published);
}

#[test]
fn admin_bad_product_count_rerenders_editor() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let client = client_for(&pool);
    let rows = [row("Alpha", "B000000001"), row("Bravo", "B000000002")];

    let resp = client
        .post("/admin/posts/new")
        .header(ContentType::Form)
        .private_cookie(session_cookie(&pool))
        .body(editor_body(&editor_form("Best Fryers", cat, &rows)))
        .dispatch();
    assert_eq!(resp.status(), Status::Ok);
    let html = resp.into_string().unwrap();
    assert!(html.contains("You must add between 3-5 products"));
    // submitted values survive the round trip
    assert!(html.contains("value=\"Best Fryers\""));
    assert!(html.contains("value=\"Bravo\""));
    assert_eq!(BlogPost::count(&pool), 0);
}

#[test]
fn admin_form_without_session_goes_to_login() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let client = client_for(&pool);

    let resp = client
        .post("/admin/posts/new")
        .header(ContentType::Form)
        .body(editor_body(&editor_form("Best Fryers", cat, &[])))
        .dispatch();
    assert_eq!(resp.status(), Status::SeeOther);
    assert_eq!(resp.headers().get_one("Location"), Some("/admin/login"));
    assert_eq!(BlogPost::count(&pool), 0);
}

#[test]
fn admin_library_products_add_move_remove() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Air Fryers", "air-fryers");
    let post = make_post(&pool, "Best Fryers", "best-fryers", cat, false);
    AffiliateProduct::replace_for_post(&pool, post, &three_products()).unwrap();
    let lib_id = LibraryItem::create(&pool, &library_form(sub, "Ninja")).unwrap();
    let client = client_for(&pool);
    let cookie = session_cookie(&pool);
    let back = format!("/admin/posts/{}/edit", post);

    let resp = client
        .post(format!("/admin/posts/{}/products/add", post))
        .header(ContentType::Form)
        .private_cookie(cookie.clone())
        .body(format!("library_item_id={}", lib_id))
        .dispatch();
    assert_eq!(resp.status(), Status::SeeOther);
    assert_eq!(resp.headers().get_one("Location"), Some(back.as_str()));
    let names = |pool: &DbPool| -> Vec<String> {
        AffiliateProduct::list_for_post(pool, post).into_iter().map(|p| p.name).collect()
    };
    assert_eq!(names(&pool), vec!["Alpha", "Bravo", "Charlie", "Ninja"]);

    let ninja = AffiliateProduct::list_for_post(&pool, post)[3].id;
    client
        .post(format!("/admin/posts/{}/products/{}/move/up", post, ninja))
        .private_cookie(cookie.clone())
        .dispatch();
    assert_eq!(names(&pool), vec!["Alpha", "Bravo", "Ninja", "Charlie"]);

    let alpha = AffiliateProduct::list_for_post(&pool, post)[0].id;
    client
        .post(format!("/admin/posts/{}/products/{}/remove", post, alpha))
        .private_cookie(cookie)
        .dispatch();
    let left = AffiliateProduct::list_for_post(&pool, post);
    let order: Vec<(String, i64)> = left.into_iter().map(|p| (p.name, p.display_order)).collect();
    assert_eq!(
        order,
        vec![("Bravo".to_string(), 0), ("Ninja".to_string(), 1), ("Charlie".to_string(), 2)]
    );
}

#[test]
fn admin_library_create_and_move_through_routes() {
    let pool = test_pool();
    let cat = make_category(&pool, "Kitchen", "kitchen");
    let sub = make_subcategory(&pool, cat, "Air Fryers", "air-fryers");
    let client = client_for(&pool);
    let cookie = session_cookie(&pool);

    for name in ["Ninja", "Cosori"] {
        let resp = client
            .post("/admin/library/new")
            .header(ContentType::Form)
            .private_cookie(cookie.clone())
            .body(format!(
                "subcategory_id={}&name={}&description=Crisp&image_url=/uploads/products/x.jpg&amazon_affiliate_link=https://amzn.to/{}",
                sub, name, name
            ))
            .dispatch();
        assert_eq!(resp.status(), Status::SeeOther);
    }
    let listed = LibraryItem::list(&pool, Some(sub)).unwrap();
    let names: Vec<&str> = listed.iter().map(|l| l.item.name.as_str()).collect();
    assert_eq!(names, vec!["Ninja", "Cosori"]);

    let cosori = listed[1].item.id;
    client
        .post(format!("/admin/library/{}/move/up", cosori))
        .private_cookie(cookie)
        .dispatch();
    let listed = LibraryItem::list(&pool, Some(sub)).unwrap();
    let names: Vec<&str> = listed.iter().map(|l| l.item.name.as_str()).collect();
    assert_eq!(names, vec!["Cosori", "Ninja"]);
}

// ═══════════════════════════════════════════════════════════
// HTTP: admin auth
// ═══════════════════════════════════════════════════════════

#[test]
fn unknown_admin_path_is_404_when_signed_in() {
    let pool = test_pool();
    let client = client_for(&pool);

    let resp = client.get("/admin/no-such-page").dispatch();
    assert_eq!(resp.status(), Status::SeeOther);
    assert_eq!(resp.headers().get_one("Location"), Some("/admin/setup"));

    let resp = client
        .get("/admin/no-such-page")
        .private_cookie(session_cookie(&pool))
        .dispatch();
    assert_eq!(resp.status(), Status::NotFound);
}

#[test]
fn login_stores_user_agent_on_session() {
    let pool = test_pool();
    Setting::set(&pool, "admin_email", "owner@example.com").unwrap();
    Setting::set(&pool, "admin_password_hash", &fast_hash("hunter2hunter2")).unwrap();
    let client = client_for(&pool);

    let resp = client
        .post("/admin/login")
        .header(ContentType::Form)
        .header(Header::new("User-Agent", "PickBettrTest/1.0"))
        .body("email=OWNER@example.com&password=hunter2hunter2")
        .dispatch();
    assert_eq!(resp.status(), Status::SeeOther);
    assert_eq!(resp.headers().get_one("Location"), Some("/admin"));

    let conn = pool.get().unwrap();
    let ua: Option<String> = conn
        .query_row("SELECT user_agent FROM sessions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(ua.as_deref(), Some("PickBettrTest/1.0"));
}
