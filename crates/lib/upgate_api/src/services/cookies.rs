//! Cookie service: build and clear the httpOnly session cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use upgate_core::auth::jwt::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
use upgate_core::models::auth::TokenPair;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "jwt";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

fn session_cookie(name: &str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Build a httpOnly cookie for the access token (30 minutes).
pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    session_cookie(
        ACCESS_COOKIE,
        token.to_string(),
        Duration::seconds(ACCESS_TOKEN_TTL_SECS),
        secure,
    )
}

/// Build a httpOnly cookie for the refresh token (30 days).
pub fn refresh_cookie(token: &str, secure: bool) -> Cookie<'static> {
    session_cookie(
        REFRESH_COOKIE,
        token.to_string(),
        Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        secure,
    )
}

/// Add both session cookies for `tokens` to `jar`.
pub fn with_session(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(access_cookie(&tokens.access_token, secure))
        .add(refresh_cookie(&tokens.refresh_token, secure))
}

/// Overwrite both session cookies with expired, empty values.
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, String::new(), Duration::ZERO, secure))
        .add(session_cookie(REFRESH_COOKIE, String::new(), Duration::ZERO, secure))
}

/// Non-empty cookie value, if present.
pub fn read(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_cookie_attributes() {
        let c = access_cookie("tok", true);
        assert_eq!(c.name(), "jwt");
        assert_eq!(c.value(), "tok");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.max_age(), Some(Duration::minutes(30)));
    }

    #[test]
    fn refresh_cookie_lasts_thirty_days() {
        let c = refresh_cookie("tok", false);
        assert_eq!(c.name(), "refresh_token");
        assert_eq!(c.secure(), Some(false));
        assert_eq!(c.max_age(), Some(Duration::days(30)));
    }

    #[test]
    fn clearing_expires_both() {
        let jar = clear_session(CookieJar::new(), false);
        for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
            let c = jar.get(name).unwrap();
            assert_eq!(c.value(), "");
            assert_eq!(c.max_age(), Some(Duration::ZERO));
        }
        assert!(read(&jar, ACCESS_COOKIE).is_none());
    }
}
