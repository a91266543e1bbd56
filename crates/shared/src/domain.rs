//! Source-domain URL helpers.
//!
//! Upstream payloads reference the scraped site by full URL; the pages we
//! render need links and slugs built against whichever source domain the
//! winning endpoint belongs to. All functions here are pure string work.

/// Strip a leading `http://` or `https://` from a domain string
pub fn strip_scheme(domain: &str) -> &str {
    domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain)
}

/// Build a user-facing URL on the source site, e.g.
/// `build_source_url("gomunime.co", "anime/one-piece/")` →
/// `https://gomunime.co/anime/one-piece/`.
pub fn build_source_url(domain: &str, path: &str) -> String {
    let domain = strip_scheme(domain).trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("https://{}/{}", domain, path)
}

/// Extract the anime slug from a source-site URL.
///
/// Accepts plain slugs unchanged, so callers can pass through user input.
pub fn extract_anime_slug(url: &str, domain: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let domain = strip_scheme(domain);
    let mut rest = strip_scheme(url);
    if let Some(stripped) = rest.strip_prefix(domain) {
        rest = stripped;
    }

    let rest = rest.trim_start_matches('/');
    let rest = rest.strip_prefix("anime/").unwrap_or(rest);

    rest.trim_end_matches('/').to_string()
}

/// Extract the episode slug from a source-site URL.
pub fn extract_episode_slug(url: &str, domain: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let domain = strip_scheme(domain);
    let mut rest = strip_scheme(url);
    if let Some(stripped) = rest.strip_prefix(domain) {
        rest = stripped;
    }

    rest.trim_matches('/').to_string()
}

/// Qualify a relative image path against the source domain. Absolute URLs
/// pass through unchanged.
pub fn format_image_url(domain: &str, image_path: &str) -> String {
    if image_path.is_empty() {
        return String::new();
    }

    if image_path.starts_with("http://") || image_path.starts_with("https://") {
        return image_path.to_string();
    }

    build_source_url(domain, image_path)
}

/// Basic hostname validation for operator-entered source domains.
pub fn is_valid_domain(domain: &str) -> bool {
    let domain = strip_scheme(domain);
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
