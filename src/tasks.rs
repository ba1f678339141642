use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::auth;
use crate::db::DbPool;
use crate::rate_limit::{RateLimiter, LOGIN_WINDOW};

const SESSION_SWEEP: Duration = Duration::from_secs(60 * 60);

/// Periodic housekeeping started once the server is listening.
pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        if let Some(pool) = rocket.state::<DbPool>() {
            let pool = pool.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(SESSION_SWEEP).await;
                    match auth::cleanup_expired_sessions(&pool) {
                        Ok(0) => {}
                        Ok(n) => log::info!("[task] Removed {} expired session(s)", n),
                        Err(e) => log::error!("[task] Session cleanup failed: {}", e),
                    }
                }
            });
        }

        if let Some(limiter) = rocket.state::<Arc<RateLimiter>>() {
            let limiter = Arc::clone(limiter);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(LOGIN_WINDOW).await;
                    limiter.cleanup(LOGIN_WINDOW);
                }
            });
        }
    }
}
