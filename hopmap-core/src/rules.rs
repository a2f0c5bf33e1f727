// Redirect rule generation from classified traces

use crate::classify::{IssueCategory, classify};
use crate::config::RuleConfig;
use hopmap_scanner::TraceResult;
use hopmap_scanner::normalize::{is_own_host, site_path, url_path};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Which branch of the decision tree produced a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleReason {
    /// Legacy prefix rewritten to its new prefix.
    LegacyPrefix,
    /// An existing single redirect on a legacy path, re-resolved.
    ExistingRedirect,
    /// A 404 at a bare top-level slug.
    BareSlug,
    /// A multi-hop chain collapsed to its final destination.
    ChainCollapse,
}

impl RuleReason {
    pub const ALL: [RuleReason; 4] = [
        RuleReason::LegacyPrefix,
        RuleReason::ExistingRedirect,
        RuleReason::BareSlug,
        RuleReason::ChainCollapse,
    ];

    /// Snake-case name used in summary keys.
    pub fn key(&self) -> &'static str {
        match self {
            RuleReason::LegacyPrefix => "legacy_prefix",
            RuleReason::ExistingRedirect => "existing_redirect",
            RuleReason::BareSlug => "bare_slug",
            RuleReason::ChainCollapse => "chain_collapse",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RuleReason::LegacyPrefix => "Legacy prefix rewrite",
            RuleReason::ExistingRedirect => "Existing redirect re-resolved",
            RuleReason::BareSlug => "Bare slug 404",
            RuleReason::ChainCollapse => "Chain collapsed",
        }
    }
}

/// One row of the bulk redirect import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRule {
    pub old_path: String,
    pub new_target: String,
    #[serde(skip)]
    pub reason: RuleReason,
}

/// Slugs under each rewrite target prefix that were seen answering 200.
#[derive(Debug, Default)]
pub struct LiveTargets {
    by_prefix: HashMap<String, HashSet<String>>,
}

impl LiveTargets {
    pub fn from_results(results: &[TraceResult], config: &RuleConfig) -> Self {
        let mut by_prefix: HashMap<String, HashSet<String>> = HashMap::new();

        for rewrite in &config.rewrites {
            let marker = format!("{}/", rewrite.target.trim_end_matches('/'));
            let live = by_prefix.entry(rewrite.target.clone()).or_default();

            for result in results.iter().filter(|r| r.final_status == Some(200)) {
                if let Some(slug) = result.original_url.rsplit(marker.as_str()).next()
                    && result.original_url.contains(&marker)
                {
                    live.insert(slug.trim_end_matches('/').to_string());
                }
            }
        }

        Self { by_prefix }
    }

    pub fn contains(&self, target_prefix: &str, slug: &str) -> bool {
        self.by_prefix
            .get(target_prefix)
            .is_some_and(|slugs| slugs.contains(slug))
    }

    pub fn len(&self) -> usize {
        self.by_prefix.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RuleBuilder<'a> {
    config: &'a RuleConfig,
    own_hosts: &'a [String],
}

impl<'a> RuleBuilder<'a> {
    pub fn new(config: &'a RuleConfig, own_hosts: &'a [String]) -> Self {
        Self { config, own_hosts }
    }

    /// Build the deduplicated rule set, sorted by `old_path`.
    ///
    /// The first result to claim a path wins; self-redirects and rules for
    /// the root path are dropped.
    pub fn build(&self, results: &[TraceResult]) -> Vec<RedirectRule> {
        let live = LiveTargets::from_results(results, self.config);
        debug!("{} live rewrite targets", live.len());

        let mut seen: HashSet<String> = HashSet::new();
        let mut rules = Vec::new();

        for result in results {
            if self.config.is_excluded(&result.original_url) {
                continue;
            }

            let path = site_path(&result.original_url);
            if path.is_empty() || path == "/" {
                continue;
            }

            let Some((new_target, reason)) = self.decide(result, &path, &live) else {
                continue;
            };

            if path == new_target || seen.contains(&path) {
                continue;
            }
            seen.insert(path.clone());
            rules.push(RedirectRule {
                old_path: path,
                new_target,
                reason,
            });
        }

        rules.sort_by(|a, b| a.old_path.cmp(&b.old_path));
        rules
    }

    fn decide(
        &self,
        result: &TraceResult,
        path: &str,
        live: &LiveTargets,
    ) -> Option<(String, RuleReason)> {
        if let Some(rewrite) = self.config.matching_rewrite(path) {
            let raw = rewrite.slug(path).unwrap_or_default();
            let slug = self.config.resolve_slug(raw);
            let target = if live.contains(&rewrite.target, slug) {
                rewrite.target_for(slug)
            } else {
                "/".to_string()
            };
            let reason = if result.hops == 1 {
                RuleReason::ExistingRedirect
            } else {
                RuleReason::LegacyPrefix
            };
            return Some((target, reason));
        }

        match classify(result) {
            IssueCategory::NotFound if path.matches('/').count() == 1 => {
                let raw = path.trim_start_matches('/');
                let slug = self.config.resolve_slug(raw);
                let target = match self.config.primary_rewrite() {
                    Some(rewrite) if live.contains(&rewrite.target, slug) => {
                        rewrite.target_for(slug)
                    }
                    _ => self
                        .config
                        .priority_targets
                        .get(raw)
                        .cloned()
                        .unwrap_or_else(|| "/".to_string()),
                };
                Some((target, RuleReason::BareSlug))
            }
            // A truncated chain never reached its destination.
            IssueCategory::RedirectChain if !result.is_truncated() => {
                let target = if is_own_host(&result.final_url, self.own_hosts) {
                    url_path(&result.final_url)
                } else {
                    result.final_url.clone()
                };
                Some((target, RuleReason::ChainCollapse))
            }
            _ => None,
        }
    }
}

/// Convenience wrapper around [`RuleBuilder`].
pub fn build_rules(
    results: &[TraceResult],
    config: &RuleConfig,
    own_hosts: &[String],
) -> Vec<RedirectRule> {
    RuleBuilder::new(config, own_hosts).build(results)
}
