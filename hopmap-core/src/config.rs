//! Configuration parsing.
//!
//! Everything site-specific (hosts, seed paths, slug tables, skip patterns,
//! priority pages) lives in one TOML file so the same binary can audit any
//! deployment and tests can build configs in memory.

use crate::error::{HopmapError, Result};
use hopmap_scanner::TracerOptions;
use hopmap_scanner::normalize::bare_host;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Label of the 404 bucket that collects everything no pattern matched.
pub const FALLBACK_BUCKET: &str = "other";

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopmapConfig {
    pub site: SiteConfig,

    #[serde(default)]
    pub tracer: TracerConfig,

    #[serde(default)]
    pub seeds: SeedConfig,

    #[serde(default)]
    pub rules: RuleConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub verify: VerifyConfig,
}

impl HopmapConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file if it cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HopmapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HopmapError::Parse { message, .. } => HopmapError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| HopmapError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.site.base_url).map_err(|e| {
            HopmapError::Invalid(format!("site.base_url '{}': {}", self.site.base_url, e))
        })?;
        if base.host_str().is_none() {
            return Err(HopmapError::Invalid(format!(
                "site.base_url '{}' has no host",
                self.site.base_url
            )));
        }

        for rewrite in &self.rules.rewrites {
            if !rewrite.legacy.starts_with('/') || rewrite.legacy.len() < 2 {
                return Err(HopmapError::Invalid(format!(
                    "rules.rewrites legacy prefix '{}' must be a non-root path",
                    rewrite.legacy
                )));
            }
            if !rewrite.target.starts_with('/') {
                return Err(HopmapError::Invalid(format!(
                    "rules.rewrites target prefix '{}' must start with '/'",
                    rewrite.target
                )));
            }
        }

        if let Some(rule) = self.rules.skip.iter().find(|r| r.pattern.is_empty()) {
            return Err(HopmapError::Invalid(format!(
                "rules.skip entry '{}' has an empty pattern",
                rule.reason
            )));
        }

        let mut labels = HashSet::new();
        for bucket in &self.report.not_found_buckets {
            if bucket.label == FALLBACK_BUCKET {
                return Err(HopmapError::Invalid(format!(
                    "report.not_found_buckets label '{}' is reserved for unmatched 404s",
                    FALLBACK_BUCKET
                )));
            }
            if !labels.insert(bucket.label.as_str()) {
                return Err(HopmapError::Invalid(format!(
                    "report.not_found_buckets label '{}' is used twice",
                    bucket.label
                )));
            }
        }

        if self.tracer.max_hops == 0 {
            return Err(HopmapError::Invalid("tracer.max_hops must be at least 1".into()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host every seed path is joined to.
    pub base_url: String,

    /// Preferred host form (usually the `www.` host) for strict comparison.
    #[serde(default)]
    pub canonical_host: Option<String>,

    /// Further host names that belong to the site.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SiteConfig {
    pub fn base_host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn canonical_host(&self) -> String {
        self.canonical_host.clone().unwrap_or_else(|| self.base_host())
    }

    /// Every host name treated as "own site": base, canonical, aliases, and
    /// the apex/`www` twin of each.
    pub fn own_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        let candidates = std::iter::once(self.base_host())
            .chain(std::iter::once(self.canonical_host()))
            .chain(self.aliases.iter().cloned());

        for host in candidates.filter(|h| !h.is_empty()) {
            let bare = bare_host(&host).to_string();
            for variant in [bare.clone(), format!("www.{bare}")] {
                if !hosts.contains(&variant) {
                    hosts.push(variant);
                }
            }
        }
        hosts
    }

    /// Join a site-relative path onto `base_url`.
    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Politeness delay between URLs.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
            workers: default_workers(),
        }
    }
}

impl TracerConfig {
    pub fn tracer_options(&self) -> TracerOptions {
        TracerOptions {
            max_hops: self.max_hops,
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_max_hops() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_delay_ms() -> u64 {
    300
}

fn default_max_pages() -> usize {
    500
}

fn default_user_agent() -> String {
    TracerOptions::default().user_agent
}

fn default_workers() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Known site-relative page paths.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Entity slugs (e.g. county names) expanded under each entity prefix.
    #[serde(default)]
    pub entity_slugs: Vec<String>,

    /// Prefixes the entity slugs are expanded under; `""` means top level.
    #[serde(default)]
    pub entity_prefixes: Vec<String>,

    #[serde(default = "default_true")]
    pub include_sitemap: bool,

    /// Defaults to `<base_url>/sitemap.xml`.
    #[serde(default)]
    pub sitemap_url: Option<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            entity_slugs: Vec::new(),
            entity_prefixes: Vec::new(),
            include_sitemap: true,
            sitemap_url: None,
        }
    }
}

/// Legacy path prefix superseded 1:1 by a new prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRewrite {
    /// Matched as a substring of the path, e.g. `/bail-bonds/`.
    pub legacy: String,
    /// Prefix the canonical slug is appended to, e.g. `/florida-bail-bonds`.
    pub target: String,
}

impl PrefixRewrite {
    /// Trailing slug after the last occurrence of the legacy prefix.
    pub fn slug<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !path.contains(&self.legacy) {
            return None;
        }
        path.rsplit(self.legacy.as_str())
            .next()
            .map(|s| s.trim_end_matches('/'))
    }

    pub fn target_for(&self, slug: &str) -> String {
        format!("{}/{}", self.target.trim_end_matches('/'), slug)
    }
}

/// URL substring that keeps a page out of the redirect table, with the
/// reason shown in the audit sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Evaluated in order; the first matching legacy prefix wins.
    #[serde(default)]
    pub rewrites: Vec<PrefixRewrite>,

    /// Spelling and hyphenation variants mapped to canonical slugs.
    #[serde(default)]
    pub slug_aliases: BTreeMap<String, String>,

    /// Raw top-level slug to explicit destination.
    #[serde(default)]
    pub priority_targets: BTreeMap<String, String>,

    /// Evaluated in order; the first matching pattern names the reason.
    #[serde(default)]
    pub skip: Vec<SkipRule>,

    /// Never used as a rule source, but still audited.
    #[serde(default)]
    pub exclude_sources: Vec<String>,
}

impl RuleConfig {
    pub fn resolve_slug<'a>(&'a self, slug: &'a str) -> &'a str {
        self.slug_aliases
            .get(slug)
            .map(String::as_str)
            .unwrap_or(slug)
    }

    pub fn skip_rule(&self, url: &str) -> Option<&SkipRule> {
        self.skip.iter().find(|rule| url.contains(&rule.pattern))
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.skip_rule(url).is_some() || self.exclude_sources.iter().any(|p| url.contains(p))
    }

    pub fn matching_rewrite(&self, path: &str) -> Option<&PrefixRewrite> {
        self.rewrites.iter().find(|r| path.contains(&r.legacy))
    }

    /// Prefix bare top-level slugs are looked up under.
    pub fn primary_rewrite(&self) -> Option<&PrefixRewrite> {
        self.rewrites.first()
    }
}

/// Ordered `label → pattern` bucket for the 404 breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBucket {
    pub label: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Business-critical paths listed first in the audit sheet.
    #[serde(default)]
    pub priority_pages: BTreeSet<String>,

    #[serde(default)]
    pub not_found_buckets: Vec<PatternBucket>,
}

impl ReportConfig {
    pub fn bucket_for(&self, url: &str) -> &str {
        self.not_found_buckets
            .iter()
            .find(|b| url.contains(&b.pattern))
            .map(|b| b.label.as_str())
            .unwrap_or(FALLBACK_BUCKET)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPage {
    pub name: String,
    /// Absolute URL, or a path joined onto `site.base_url`.
    pub url: String,
    /// A retired URL that is expected to redirect exactly once.
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default)]
    pub pages: Vec<VerifyPage>,
}
