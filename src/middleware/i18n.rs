// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

/// Idiomas com catálogo embutido. O primeiro é o padrão.
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "hi"];

// Extrator de idioma a partir do Accept-Language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(SUPPORTED_LANGUAGES[0].to_string())
    }
}

impl Locale {
    /// Primeiro idioma suportado na lista do cliente ("hi-IN" -> "hi").
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| {
                accept_language::parse(raw).into_iter().find_map(|tag| {
                    let primary = tag.split('-').next().unwrap_or(&tag).to_ascii_lowercase();
                    SUPPORTED_LANGUAGES.contains(&primary.as_str()).then_some(primary)
                })
            })
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn picks_first_supported_language() {
        assert_eq!(Locale::from_headers(&headers("fr-FR, hi-IN;q=0.8, en;q=0.5")).0, "hi");
    }

    #[test]
    fn falls_back_to_english() {
        assert_eq!(Locale::from_headers(&headers("de, fr")).0, "en");
        assert_eq!(Locale::from_headers(&HeaderMap::new()).0, "en");
    }
}
