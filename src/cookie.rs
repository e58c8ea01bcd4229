use axum::http::{header, HeaderMap, HeaderValue};

pub const TOKEN_COOKIE: &str = "token";
pub const SESSION_COOKIE: &str = "session";

/// Attributes shared by the auth cookies.
#[derive(Debug, Clone)]
pub struct CookieOptions<'a> {
    pub name: &'a str,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl CookieOptions<'_> {
    pub fn build_set_cookie(&self, value: &str) -> String {
        let mut cookie = format!("{}={}; HttpOnly; SameSite=Lax; Path=/", self.name, value);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; Max-Age={}", self.max_age_secs));
        cookie
    }

    pub fn header_value(&self, value: &str) -> anyhow::Result<HeaderValue> {
        Ok(HeaderValue::from_str(&self.build_set_cookie(value))?)
    }
}

pub fn clear_cookie(name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name))
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_carries_attributes() {
        let opts = CookieOptions {
            name: TOKEN_COOKIE,
            secure: true,
            max_age_secs: 86_400,
        };
        let cookie = opts.build_set_cookie("abc");
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=86400"));

        let dev = CookieOptions { secure: false, ..opts };
        assert!(!dev.build_set_cookie("abc").contains("Secure"));
    }

    #[test]
    fn extract_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=jwt.value.here; session=s1"),
        );
        assert_eq!(
            extract_cookie(&headers, TOKEN_COOKIE).as_deref(),
            Some("jwt.value.here")
        );
        assert_eq!(extract_cookie(&headers, SESSION_COOKIE).as_deref(), Some("s1"));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn cleared_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(extract_cookie(&headers, TOKEN_COOKIE), None);
    }
}
