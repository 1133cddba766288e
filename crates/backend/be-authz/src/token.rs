use axum::http::{HeaderMap, header};
use percent_encoding::percent_decode_str;

const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
const SESSION_COOKIE: &str = "supabase-auth-token";

/// Pulls the access token from `Authorization: Bearer`, then from the
/// session cookies. A header that is present but not a bearer credential
/// is ignored rather than rejected so cookie sessions keep working.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .collect::<Vec<_>>();

    let lookup = |name: &str| {
        cookies
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| decode_cookie_value(value))
            .filter(|v| !v.is_empty())
    };

    if let Some(token) = lookup(ACCESS_TOKEN_COOKIE) {
        return Some(token);
    }

    lookup(SESSION_COOKIE).and_then(|value| session_cookie_token(&value))
}

fn decode_cookie_value(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// The session cookie holds either the raw token or a JSON array whose
/// first element is the access token.
fn session_cookie_token(value: &str) -> Option<String> {
    if value.starts_with('[') {
        return serde_json::from_str::<Vec<serde_json::Value>>(value)
            .ok()?
            .into_iter()
            .next()?
            .as_str()
            .map(str::to_string)
            .filter(|t| !t.is_empty());
    }
    Some(value.to_string())
}
