// Issue classification for traced URLs

use hopmap_scanner::TraceResult;
use hopmap_scanner::normalize::loose;
use serde::{Deserialize, Serialize};
use url::Url;

/// Exactly one category per trace, chosen by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    NotFound,
    RedirectChain,
    RedirectSingle,
    CanonicalMismatch,
    Clean,
    /// Hop limit reached without a terminal response; needs manual review.
    Unresolved,
    OtherError,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 7] = [
        IssueCategory::NotFound,
        IssueCategory::RedirectChain,
        IssueCategory::RedirectSingle,
        IssueCategory::CanonicalMismatch,
        IssueCategory::Clean,
        IssueCategory::Unresolved,
        IssueCategory::OtherError,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IssueCategory::NotFound => "Not Found",
            IssueCategory::RedirectChain => "Redirect Chain",
            IssueCategory::RedirectSingle => "Single Redirect",
            IssueCategory::CanonicalMismatch => "Canonical Mismatch",
            IssueCategory::Clean => "Clean",
            IssueCategory::Unresolved => "Unresolved",
            IssueCategory::OtherError => "Other Error",
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            IssueCategory::RedirectChain | IssueCategory::RedirectSingle
        )
    }
}

/// First matching rule wins:
/// 404 or transport error, then 2+ hops, then 1 hop, then a 200 with a
/// canonical pointing elsewhere, then a clean 200. Anything left is
/// `Unresolved` when the hop limit truncated it, `OtherError` otherwise.
pub fn classify(result: &TraceResult) -> IssueCategory {
    if result.final_status == Some(404)
        || (result.final_status.is_none() && result.error.is_some())
    {
        return IssueCategory::NotFound;
    }
    if result.hops >= 2 {
        return IssueCategory::RedirectChain;
    }
    if result.hops == 1 {
        return IssueCategory::RedirectSingle;
    }
    if result.final_status == Some(200) {
        if has_canonical_mismatch(result) {
            return IssueCategory::CanonicalMismatch;
        }
        return IssueCategory::Clean;
    }
    if result.is_truncated() {
        return IssueCategory::Unresolved;
    }
    IssueCategory::OtherError
}

/// The declared canonical differs (trailing-slash-insensitively) from both
/// the requested and the final URL. Relative canonicals are resolved against
/// the final URL first.
pub fn has_canonical_mismatch(result: &TraceResult) -> bool {
    let Some(ref canonical) = result.canonical else {
        return false;
    };
    let canonical = resolve_against(&result.final_url, canonical);
    let canonical = loose(&canonical);

    canonical != loose(&result.original_url) && canonical != loose(&result.final_url)
}

fn resolve_against(base: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    Url::parse(base)
        .ok()
        .and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Human-readable issue type for the audit sheet.
pub fn issue_label(result: &TraceResult) -> String {
    match classify(result) {
        IssueCategory::NotFound if result.final_status == Some(404) => "404 Not Found".to_string(),
        IssueCategory::NotFound => "404 Not Found (request error)".to_string(),
        IssueCategory::RedirectChain if result.is_truncated() => {
            format!("Redirect Chain ({}+ hops, unresolved)", result.hops)
        }
        IssueCategory::RedirectChain => "Redirect Chain (2+ hops)".to_string(),
        IssueCategory::RedirectSingle => match result.first_hop_status() {
            Some(code) => format!("{} Redirect", code),
            None => "Redirect".to_string(),
        },
        IssueCategory::CanonicalMismatch => "Canonical Mismatch".to_string(),
        IssueCategory::Clean => "OK (200)".to_string(),
        IssueCategory::Unresolved => "Unresolved (hop limit)".to_string(),
        IssueCategory::OtherError => match result.final_status {
            Some(status) => format!("HTTP {}", status),
            None => "Error".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopmap_scanner::Hop;

    #[test]
    fn test_relative_canonical_is_resolved() {
        let mut result = TraceResult::new("https://example.test/about".to_string());
        result.final_status = Some(200);
        result.canonical = Some("/about/".to_string());
        assert!(!has_canonical_mismatch(&result));

        result.canonical = Some("/about-us".to_string());
        assert!(has_canonical_mismatch(&result));
    }

    #[test]
    fn test_issue_label_for_single_redirect_uses_hop_status() {
        let mut result = TraceResult::new("https://example.test/a".to_string());
        result.push_hop(Hop {
            url: "https://example.test/a".to_string(),
            status_code: 302,
            target: "https://example.test/b".to_string(),
        });
        result.final_status = Some(200);
        assert_eq!(issue_label(&result), "302 Redirect");
    }
}
