//! Bearer token extraction.

use axum::http::{header, Request};

const BEARER: &str = "bearer";
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// The caller's access token.
///
/// Looks at `Authorization: Bearer <token>` first (scheme matched
/// case-insensitively), then at the `access_token` query parameter.
/// Empty tokens count as absent.
pub fn access_token<B>(req: &Request<B>) -> Option<String> {
    if let Some(token) = from_header(req) {
        return Some(token.to_string());
    }
    from_query(req.uri().query()?)
}

fn from_header<B>(req: &Request<B>) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_header() {
        let req = request("/oauth2/tokeninfo", Some("Bearer abc"));
        assert_eq!(access_token(&req).as_deref(), Some("abc"));

        let req = request("/oauth2/tokeninfo", Some("bearer abc"));
        assert_eq!(access_token(&req).as_deref(), Some("abc"));
    }

    #[test]
    fn test_non_bearer_scheme_ignored() {
        let req = request("/oauth2/tokeninfo", Some("Basic dXNlcjpwYXNz"));
        assert_eq!(access_token(&req), None);
    }

    #[test]
    fn test_query_fallback() {
        let req = request("/oauth2/tokeninfo?foo=bar&access_token=xyz", None);
        assert_eq!(access_token(&req).as_deref(), Some("xyz"));

        let req = request("/oauth2/tokeninfo?access_token=a%2Bb", None);
        assert_eq!(access_token(&req).as_deref(), Some("a+b"));
    }

    #[test]
    fn test_header_wins_over_query() {
        let req = request("/oauth2/tokeninfo?access_token=query", Some("Bearer header"));
        assert_eq!(access_token(&req).as_deref(), Some("header"));
    }

    #[test]
    fn test_empty_tokens_are_absent() {
        assert_eq!(access_token(&request("/", Some("Bearer "))), None);
        assert_eq!(access_token(&request("/?access_token=", None)), None);
        assert_eq!(access_token(&request("/", None)), None);
    }
}
