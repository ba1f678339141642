use rocket::request::{FromRequest, Outcome, Request};
use woothee::parser::Parser;

use crate::auth::{client_ip, hash_ip};
use crate::models::analytics::VisitMeta;

/// Builds the visitor details stored with each view and click.
/// The client address is stored only as a SHA-256 hash.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for VisitMeta {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = client_ip(request);
        let user_agent = request
            .headers()
            .get_one("User-Agent")
            .map(str::to_string)
            .filter(|s| !s.is_empty());
        let referrer = request
            .headers()
            .get_one("Referer")
            .map(extract_domain)
            .filter(|s| !s.is_empty());
        let (device_type, browser) = parse_user_agent(user_agent.as_deref().unwrap_or(""));

        Outcome::Success(VisitMeta {
            ip_hash: Some(hash_ip(&ip)),
            user_agent,
            referrer,
            device_type: Some(device_type.to_string()),
            browser: Some(browser),
        })
    }
}

pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Device class (`mobile`, `tablet`, `desktop`, `bot`) and browser name.
pub fn parse_user_agent(ua: &str) -> (&'static str, String) {
    let parsed = match Parser::new().parse(ua) {
        Some(r) => r,
        None => return ("desktop", "Other".to_string()),
    };

    let device = match parsed.category {
        "crawler" => "bot",
        _ if parsed.os == "iPad" => "tablet",
        "smartphone" | "mobilephone" => "mobile",
        _ => "desktop",
    };
    let browser = if parsed.name.is_empty() || parsed.name == "UNKNOWN" {
        "Other".to_string()
    } else {
        parsed.name.to_string()
    };

    (device, browser)
}
