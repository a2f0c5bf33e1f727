//! URL normalization used when comparing crawled, canonical and sitemap URLs.
//!
//! Two strengths exist. [`loose`] only makes the comparison insensitive to a
//! trailing slash and is used for visited-set keys and canonical equality.
//! [`strict`] additionally forces `https` and the site's canonical host and
//! drops the query, and is used when auditing sitemaps and canonical tags.

use url::Url;

fn trim_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Trailing-slash-insensitive form of `url`. Scheme, host and query are kept;
/// the fragment is dropped.
pub fn loose(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            let path = trim_path(parsed.path()).to_string();
            parsed.set_path(&path);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => {
            let without_fragment = url.split('#').next().unwrap_or(url);
            let trimmed = without_fragment.trim_end_matches('/');
            if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Strip a leading `www.` so apex and `www` hosts compare equal.
pub fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Scheme- and host-canonicalized form of `url`: `https`, `canonical_host`
/// when the URL is on the same site (apex or `www`), trimmed path, no query.
pub fn strict(url: &str, canonical_host: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return loose(url);
    };

    let host = match parsed.host_str() {
        Some(host) if bare_host(host) == bare_host(canonical_host) => canonical_host.to_string(),
        Some(host) => host.to_string(),
        None => return loose(url),
    };

    format!("https://{}{}", host, trim_path(parsed.path()))
}

/// Site-relative path plus `?query` when present; `/` for an empty path.
pub fn site_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut path = parsed.path().to_string();
            if path.is_empty() {
                path.push('/');
            }
            if let Some(query) = parsed.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        }
        Err(_) => url.to_string(),
    }
}

/// Path component only, without query or fragment.
pub fn url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() { "/".to_string() } else { path }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Whether `url` is absolute and its host belongs to `hosts`.
pub fn is_own_host(url: &str, hosts: &[String]) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| hosts.iter().any(|own| own == h)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_strips_trailing_slash() {
        assert_eq!(loose("https://example.test/about/"), "https://example.test/about");
        assert_eq!(loose("https://example.test/about"), "https://example.test/about");
        assert_eq!(loose("https://example.test/"), "https://example.test/");
        assert_eq!(loose("https://example.test"), "https://example.test/");
    }

    #[test]
    fn test_loose_keeps_query_and_drops_fragment() {
        assert_eq!(
            loose("https://example.test/p/?county=lee#top"),
            "https://example.test/p?county=lee"
        );
    }

    #[test]
    fn test_loose_keeps_scheme_and_host() {
        assert_ne!(loose("http://example.test/a"), loose("https://example.test/a"));
        assert_ne!(loose("https://www.example.test/a"), loose("https://example.test/a"));
    }

    #[test]
    fn test_strict_canonicalizes_scheme_and_host() {
        let host = "www.example.test";
        assert_eq!(strict("http://example.test/a/", host), "https://www.example.test/a");
        assert_eq!(strict("https://www.example.test/a?x=1", host), "https://www.example.test/a");
        assert_eq!(strict("https://example.test", host), "https://www.example.test/");
        assert_eq!(strict("https://other.test/a/", host), "https://other.test/a");
    }

    #[test]
    fn test_site_path() {
        assert_eq!(site_path("https://example.test/faq"), "/faq");
        assert_eq!(site_path("https://example.test"), "/");
        assert_eq!(
            site_path("https://example.test/portal-landing?county=lee"),
            "/portal-landing?county=lee"
        );
    }

    #[test]
    fn test_is_own_host() {
        let hosts = vec!["www.example.test".to_string(), "example.test".to_string()];
        assert!(is_own_host("https://example.test/a", &hosts));
        assert!(is_own_host("http://www.example.test/", &hosts));
        assert!(!is_own_host("https://cdn.example.test/a", &hosts));
        assert!(!is_own_host("/relative", &hosts));
    }
}
