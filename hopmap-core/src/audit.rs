// Canonical-tag and sitemap audits over crawled traces

use crate::classify::issue_label;
use hopmap_scanner::TraceResult;
use hopmap_scanner::normalize::{strict, url_path};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CanonicalIssueType {
    TrailingSlash,
    WwwMismatch,
    DifferentPage,
    Other,
}

impl CanonicalIssueType {
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalIssueType::TrailingSlash => "Trailing slash mismatch",
            CanonicalIssueType::WwwMismatch => "www vs non-www mismatch",
            CanonicalIssueType::DifferentPage => "Canonical points to different page",
            CanonicalIssueType::Other => "Other mismatch",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalIssue {
    pub page_url: String,
    pub canonical: String,
    pub issue_type: CanonicalIssueType,
    pub normalized_page: String,
    pub normalized_canonical: String,
    pub action: String,
}

/// Every 200 page whose declared canonical differs from the page under
/// strict normalization.
pub fn canonical_audit(results: &[TraceResult], canonical_host: &str) -> Vec<CanonicalIssue> {
    results
        .iter()
        .filter(|r| r.final_status == Some(200))
        .filter_map(|r| {
            let canonical = r.canonical.as_deref()?;
            let normalized_page = strict(&r.original_url, canonical_host);
            let normalized_canonical = strict(canonical, canonical_host);
            if normalized_page == normalized_canonical {
                return None;
            }

            let issue_type = canonical_issue_type(&r.original_url, canonical);
            Some(CanonicalIssue {
                page_url: r.original_url.clone(),
                canonical: canonical.to_string(),
                issue_type,
                normalized_page,
                normalized_canonical,
                action: canonical_action(issue_type, &r.original_url).to_string(),
            })
        })
        .collect()
}

fn canonical_issue_type(url: &str, canonical: &str) -> CanonicalIssueType {
    if url.trim_end_matches('/') == canonical.trim_end_matches('/') {
        CanonicalIssueType::TrailingSlash
    } else if url.replace("www.", "") == canonical.replace("www.", "") {
        CanonicalIssueType::WwwMismatch
    } else if url_path(url) != url_path(canonical) {
        CanonicalIssueType::DifferentPage
    } else {
        CanonicalIssueType::Other
    }
}

fn canonical_action(issue_type: CanonicalIssueType, url: &str) -> &'static str {
    match issue_type {
        CanonicalIssueType::TrailingSlash => {
            "Use a consistent trailing slash policy (no trailing slash preferred)"
        }
        CanonicalIssueType::WwwMismatch => "Ensure all pages use the www host as canonical",
        CanonicalIssueType::DifferentPage if url.contains("/single-post/") => {
            "Verify this is intentional (blog duplicate consolidation)"
        }
        CanonicalIssueType::DifferentPage => {
            "Review: canonical may be incorrectly set in the page SEO settings"
        }
        CanonicalIssueType::Other => "Review canonical tag in the page SEO settings",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SitemapAuditRow {
    pub url: String,
    pub http_status: String,
    pub hops: usize,
    pub issue: String,
    pub action: String,
    pub ok: bool,
}

/// Status of every sitemap URL; issues first, then clean rows, each group in
/// sitemap order. Traces are matched by exact URL, then by strict form.
pub fn sitemap_audit(
    sitemap_urls: &[String],
    results: &[TraceResult],
    canonical_host: &str,
) -> Vec<SitemapAuditRow> {
    let by_url: HashMap<&str, &TraceResult> = results
        .iter()
        .map(|r| (r.original_url.as_str(), r))
        .collect();
    let mut by_strict: HashMap<String, &TraceResult> = HashMap::new();
    for r in results {
        by_strict
            .entry(strict(&r.original_url, canonical_host))
            .or_insert(r);
    }

    let (mut issues, ok): (Vec<_>, Vec<_>) = sitemap_urls
        .iter()
        .map(|url| {
            let trace = by_url
                .get(url.as_str())
                .copied()
                .or_else(|| by_strict.get(&strict(url, canonical_host)).copied());
            sitemap_row(url, trace)
        })
        .partition(|row| !row.ok);

    issues.extend(ok);
    issues
}

fn sitemap_row(url: &str, trace: Option<&TraceResult>) -> SitemapAuditRow {
    let Some(r) = trace else {
        return SitemapAuditRow {
            url: url.to_string(),
            http_status: "Not crawled".to_string(),
            hops: 0,
            issue: "Not verified".to_string(),
            action: "Manually verify this URL".to_string(),
            ok: false,
        };
    };

    let http_status = r
        .final_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Error".to_string());

    let (issue, action, ok) = match (r.final_status, r.hops) {
        (Some(404), _) => (
            "404 Not Found in sitemap".to_string(),
            "Remove from sitemap immediately".to_string(),
            false,
        ),
        (_, hops) if hops >= 1 => (
            format!("Redirecting URL in sitemap ({} hop{})", hops, if hops == 1 { "" } else { "s" }),
            "Update sitemap to use final destination URL".to_string(),
            false,
        ),
        (Some(200), _) => ("OK".to_string(), "None needed".to_string(), true),
        _ => (
            issue_label(r),
            "Investigate and fix".to_string(),
            false,
        ),
    };

    SitemapAuditRow {
        url: url.to_string(),
        http_status,
        hops: r.hops,
        issue,
        action,
        ok,
    }
}

/// Sitewide URL-shape consistency counts over 200 pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureCounts {
    /// Non-root URLs ending in `/`.
    pub trailing_slash: usize,
    /// Own-site URLs not on the `www` host.
    pub non_www: usize,
}

pub fn structure_audit(results: &[TraceResult], own_hosts: &[String]) -> StructureCounts {
    let mut counts = StructureCounts::default();

    for r in results.iter().filter(|r| r.final_status == Some(200)) {
        let Ok(parsed) = url::Url::parse(&r.original_url) else {
            continue;
        };
        if parsed.path() != "/" && parsed.path().ends_with('/') {
            counts.trailing_slash += 1;
        }
        if let Some(host) = parsed.host_str()
            && own_hosts.iter().any(|h| h == host)
            && !host.starts_with("www.")
        {
            counts.non_www += 1;
        }
    }

    counts
}
