use rusqlite::params;
use std::collections::HashMap;

use crate::db::DbPool;

/// Runtime options stored in the `settings` key/value table.
pub struct Setting;

impl Setting {
    pub fn get(pool: &DbPool, key: &str) -> Option<String> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .ok()
    }

    /// Missing and empty values both fall back to `default`.
    pub fn get_or(pool: &DbPool, key: &str, default: &str) -> String {
        Self::get(pool, key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(pool: &DbPool, key: &str) -> bool {
        Self::get(pool, key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    pub fn get_i64(pool: &DbPool, key: &str) -> i64 {
        Self::get(pool, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn set(pool: &DbPool, key: &str, value: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Public-facing settings handed to templates. Credentials are never included.
    pub fn public(pool: &DbPool) -> HashMap<String, String> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::error!("settings: pool unavailable: {}", e);
                return HashMap::new();
            }
        };

        let mut stmt = match conn.prepare(
            "SELECT key, value FROM settings WHERE key NOT IN ('admin_password_hash', 'admin_email')",
        ) {
            Ok(s) => s,
            Err(_) => return HashMap::new(),
        };

        stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
