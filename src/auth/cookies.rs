//! The two channels tokens travel to the browser on.
//!
//! The refresh token rides in an `HttpOnly` cookie scoped to the auth routes.
//! The access token rides in a script-readable cookie on `/` so independently
//! loaded UI fragments can pick it up.

use anyhow::Context;
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use time::Duration;

use crate::auth::jwt::TokenPair;
use crate::config::CookieConfig;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const ACCESS_COOKIE_NAME: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// Invisible to page scripts.
    HttpOnly,
    /// Readable from `document.cookie`.
    Script,
}

#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    pub name: &'static str,
    pub path: String,
    pub max_age: Duration,
    pub exposure: Exposure,
    pub secure: bool,
}

impl DeliveryChannel {
    fn render(&self, value: &str, max_age_secs: i64) -> anyhow::Result<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path={}; SameSite=Lax; Max-Age={}",
            self.name, value, self.path, max_age_secs
        );
        if self.exposure == Exposure::HttpOnly {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).with_context(|| format!("render {} cookie", self.name))
    }

    pub fn set(&self, value: &str) -> anyhow::Result<HeaderValue> {
        self.render(value, self.max_age.whole_seconds())
    }

    pub fn expire(&self) -> anyhow::Result<HeaderValue> {
        self.render("", 0)
    }

    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| {
                let (key, val) = pair.trim().split_once('=')?;
                (key.trim() == self.name).then(|| val.trim().to_string())
            })
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct CookieChannels {
    pub refresh: DeliveryChannel,
    pub access: DeliveryChannel,
}

impl CookieChannels {
    pub fn new(cfg: &CookieConfig, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            refresh: DeliveryChannel {
                name: REFRESH_COOKIE_NAME,
                path: cfg.refresh_path.clone(),
                max_age: refresh_ttl,
                exposure: Exposure::HttpOnly,
                secure: cfg.secure,
            },
            access: DeliveryChannel {
                name: ACCESS_COOKIE_NAME,
                path: "/".into(),
                max_age: access_ttl,
                exposure: Exposure::Script,
                secure: cfg.secure,
            },
        }
    }

    /// `Set-Cookie` headers for both halves of a pair.
    pub fn deliver(&self, pair: &TokenPair) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, self.refresh.set(&pair.refresh_token)?);
        headers.append(SET_COOKIE, self.access.set(&pair.access_token)?);
        Ok(headers)
    }

    pub fn clear(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, self.refresh.expire()?);
        headers.append(SET_COOKIE, self.access.expire()?);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> CookieChannels {
        let cfg = CookieConfig {
            secure: true,
            refresh_path: "/api/v1/auth".into(),
        };
        CookieChannels::new(&cfg, Duration::minutes(5), Duration::days(7))
    }

    #[test]
    fn refresh_cookie_is_http_only_and_scoped() {
        let v = channels().refresh.set("r.t.v").unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("refresh_token=r.t.v;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Path=/api/v1/auth"));
        assert!(s.contains("Max-Age=604800"));
        assert!(s.contains("Secure"));
    }

    #[test]
    fn access_cookie_is_readable_on_root() {
        let v = channels().access.set("a.t.v").unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("access_token=a.t.v;"));
        assert!(!s.contains("HttpOnly"));
        assert!(s.contains("Path=/;"));
        assert!(s.contains("Max-Age=300"));
    }

    #[test]
    fn clear_expires_both() {
        let headers = channels().clear().unwrap();
        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.contains("Max-Age=0")));
    }

    #[test]
    fn read_picks_the_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def; refresh_token=xyz"),
        );
        let ch = channels();
        assert_eq!(ch.access.read(&headers).as_deref(), Some("abc.def"));
        assert_eq!(ch.refresh.read(&headers).as_deref(), Some("xyz"));

        headers.insert(COOKIE, HeaderValue::from_static("access_token="));
        assert!(ch.access.read(&headers).is_none());
    }
}
