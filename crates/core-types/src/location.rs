//! Location comparison helpers shared by the engine and the driver.

use url::Url;

/// Normalizes a location for equality checks: drops the fragment and a trailing slash.
/// Strings that do not parse as URLs are only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let normalized = url.to_string();
            if url.query().is_none() {
                normalized.trim_end_matches('/').to_string()
            } else {
                normalized
            }
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

pub fn same_location(a: &str, b: &str) -> bool {
    normalize_url(a) == normalize_url(b)
}

/// Whether the in-page executor can live at this location. Internal browser pages, blob/data
/// documents and generated binary viewers (PDF) are not scriptable.
pub fn is_scriptable(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return false;
    }
    !url.path().to_ascii_lowercase().ends_with(".pdf")
}
