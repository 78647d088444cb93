//! URL normalisation for merged hyperlink cells

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Why a URL was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRejection {
    #[error("URL is empty")]
    Empty,
    #[error("URL contains control characters")]
    ControlCharacter,
    #[error("URL is longer than {max} characters")]
    TooLong { max: usize },
    #[error("URL must start with http://, https://, mailto: or www.")]
    MissingScheme,
    #[error("URL has no host")]
    MissingHost,
    #[error("mailto: URL has no address")]
    MissingAddress,
}

fn web_url_pattern() -> &'static Regex {
    static WEB_URL: OnceLock<Regex> = OnceLock::new();
    WEB_URL.get_or_init(|| Regex::new(r"^(?i:https?)://[^/?#\s]+(?:[/?#].*)?$").unwrap())
}

/// Trim `raw` and turn it into an absolute http(s) or mailto URL.
///
/// `www.` hosts gain an `https://` prefix; anything else without one of the
/// accepted schemes is refused. Accepted URLs are otherwise left untouched.
pub fn sanitize_url(raw: &str, max_length: usize) -> Result<String, UrlRejection> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(UrlRejection::Empty);
    }
    if url.chars().any(char::is_control) {
        return Err(UrlRejection::ControlCharacter);
    }

    let normalized = if starts_with_ignore_case(url, "www.") {
        format!("https://{url}")
    } else {
        url.to_string()
    };
    if normalized.chars().count() > max_length {
        return Err(UrlRejection::TooLong { max: max_length });
    }

    if starts_with_ignore_case(&normalized, "http://") || starts_with_ignore_case(&normalized, "https://") {
        if !web_url_pattern().is_match(&normalized) {
            return Err(UrlRejection::MissingHost);
        }
    } else if starts_with_ignore_case(&normalized, "mailto:") {
        if normalized["mailto:".len()..].trim().is_empty() {
            return Err(UrlRejection::MissingAddress);
        }
    } else {
        return Err(UrlRejection::MissingScheme);
    }

    Ok(normalized)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
