use serde::{Deserialize, Serialize};

/// One observed 3xx response with a `Location` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub url: String,
    pub status_code: u16,
    pub target: String,
}

/// Outcome of tracing a single URL hop-by-hop.
///
/// `final_status` and `error` are both `None` when the hop limit ran out
/// before a terminal response; see [`TraceResult::is_truncated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    pub original_url: String,
    #[serde(default)]
    pub chain: Vec<Hop>,
    #[serde(default)]
    pub hops: usize,
    pub final_url: String,
    pub final_status: Option<u16>,
    pub error: Option<String>,
    #[serde(default)]
    pub canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsc_issue: Option<String>,
    #[serde(default)]
    pub in_sitemap: Option<bool>,
}

impl TraceResult {
    pub fn new(url: String) -> Self {
        Self {
            final_url: url.clone(),
            original_url: url,
            chain: Vec::new(),
            hops: 0,
            final_status: None,
            error: None,
            canonical: None,
            gsc_issue: None,
            in_sitemap: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        let mut result = Self::new(url);
        result.error = Some(error);
        result
    }

    /// Append a hop and advance `final_url` to its target.
    pub fn push_hop(&mut self, hop: Hop) {
        self.final_url = hop.target.clone();
        self.chain.push(hop);
        self.hops = self.chain.len();
    }

    /// Restore `hops == chain.len()` on results loaded from older exports
    /// that never carried the field.
    pub fn sync_hops(&mut self) {
        self.hops = self.chain.len();
    }

    /// The hop limit was reached without a terminal response or an error.
    pub fn is_truncated(&self) -> bool {
        self.final_status.is_none() && self.error.is_none()
    }

    /// Status code of the first hop, if the URL redirected at all.
    pub fn first_hop_status(&self) -> Option<u16> {
        self.chain.first().map(|hop| hop.status_code)
    }

    /// Hop URLs joined with arrows, e.g. `a (301) → b (302)`.
    pub fn chain_trace(&self) -> String {
        self.chain
            .iter()
            .map(|hop| format!("{} ({})", hop.url, hop.status_code))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_hop_keeps_hop_count_in_sync() {
        let mut result = TraceResult::new("https://example.test/a".to_string());
        result.push_hop(Hop {
            url: "https://example.test/a".to_string(),
            status_code: 301,
            target: "https://example.test/b".to_string(),
        });
        result.push_hop(Hop {
            url: "https://example.test/b".to_string(),
            status_code: 302,
            target: "https://example.test/c".to_string(),
        });

        assert_eq!(result.hops, 2);
        assert_eq!(result.hops, result.chain.len());
        assert_eq!(result.final_url, "https://example.test/c");
        assert_eq!(result.first_hop_status(), Some(301));
        assert!(result.is_truncated());
    }

    #[test]
    fn test_chain_trace_format() {
        let mut result = TraceResult::new("https://example.test/a".to_string());
        assert_eq!(result.chain_trace(), "");

        result.push_hop(Hop {
            url: "https://example.test/a".to_string(),
            status_code: 301,
            target: "https://example.test/b".to_string(),
        });
        assert_eq!(result.chain_trace(), "https://example.test/a (301)");
    }

    #[test]
    fn test_deserialize_without_hops_field() {
        let json = r#"{
            "original_url": "https://example.test/x",
            "chain": [{"url": "https://example.test/x", "status_code": 301, "target": "https://example.test/y"}],
            "final_url": "https://example.test/y",
            "final_status": 200,
            "error": null
        }"#;
        let mut result: TraceResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.hops, 0);
        result.sync_hops();
        assert_eq!(result.hops, 1);
        assert_eq!(result.canonical, None);
        assert_eq!(result.in_sitemap, None);
    }
}
