pub mod analytics;
pub mod category;
pub mod library;
pub mod post;
pub mod product;
pub mod related;
pub mod settings;
pub mod subcategory;
