//! Cookie handling for the refresh token.
//!
//! The access token never travels in a cookie. The refresh token lives in an
//! HttpOnly cookie scoped to the refresh endpoint's path, so the browser only
//! sends it on renewal calls.

use axum::http::header;

use crate::server_config::ServerSettings;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// Build the Set-Cookie value carrying a refresh token.
pub fn refresh_cookie(settings: &ServerSettings, token: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite={}; Path={}; Max-Age={}{}",
        REFRESH_COOKIE_NAME,
        token,
        settings.same_site(),
        settings.refresh_path,
        max_age_secs,
        secure_flag(settings)
    )
}

/// Build the Set-Cookie value that removes the refresh token.
pub fn clear_refresh_cookie(settings: &ServerSettings) -> String {
    format!(
        "{}=; HttpOnly; SameSite={}; Path={}; Max-Age=0{}",
        REFRESH_COOKIE_NAME,
        settings.same_site(),
        settings.refresh_path,
        secure_flag(settings)
    )
}

fn secure_flag(settings: &ServerSettings) -> &'static str {
    if settings.secure_cookies() {
        "; Secure"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_config::Environment;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=abc123"),
        );

        assert_eq!(get_cookie(&headers, "refresh_token"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; refresh_token=xyz789; theme=dark"),
        );

        assert_eq!(get_cookie(&headers, "refresh_token"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
        assert_eq!(get_cookie(&headers, "theme"), Some("dark"));
    }

    #[test]
    fn test_get_cookie_across_headers() {
        let mut headers = axum::http::HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("foo=bar"));
        headers.append(header::COOKIE, HeaderValue::from_static("refresh_token=abc"));

        assert_eq!(get_cookie(&headers, "refresh_token"), Some("abc"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "refresh_token"), None);
        assert_eq!(get_cookie(&axum::http::HeaderMap::new(), "foo"), None);
    }

    #[test]
    fn test_refresh_cookie_production() {
        let settings = ServerSettings::new(Environment::Production);
        let cookie = refresh_cookie(&settings, "tok", 604800);

        assert_eq!(
            cookie,
            "refresh_token=tok; HttpOnly; SameSite=Strict; Path=/api/v1/auth/refresh; Max-Age=604800; Secure"
        );
    }

    #[test]
    fn test_refresh_cookie_development() {
        let settings = ServerSettings::new(Environment::Development);
        let cookie = refresh_cookie(&settings, "tok", 60);

        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_clear_refresh_cookie() {
        let settings = ServerSettings::new(Environment::Development);
        let cookie = clear_refresh_cookie(&settings);

        assert!(cookie.starts_with("refresh_token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Path=/api/v1/auth/refresh"));
    }
}
