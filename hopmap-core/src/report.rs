// Audit report generation from classified traces

use crate::audit::{
    CanonicalIssue, SitemapAuditRow, StructureCounts, canonical_audit, sitemap_audit,
    structure_audit,
};
use crate::classify::{IssueCategory, classify, issue_label};
use crate::config::{FALLBACK_BUCKET, HopmapConfig};
use crate::error::{HopmapError, Result};
use crate::rules::{RedirectRule, RuleReason, build_rules};
use chrono::{DateTime, Utc};
use hopmap_scanner::TraceResult;
use hopmap_scanner::normalize::{loose, site_path};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RAW_RESULTS_FILE: &str = "crawl_results_raw.json";
pub const SITEMAP_URLS_FILE: &str = "sitemap_urls.json";
pub const REDIRECTS_FILE: &str = "wix_bulk_redirects.csv";
pub const MAPPING_SHEET_FILE: &str = "redirect_mapping_sheet.csv";
pub const CANONICAL_FILE: &str = "canonical_issues.csv";
pub const SITEMAP_AUDIT_FILE: &str = "sitemap_audit.csv";
pub const SUMMARY_FILE: &str = "summary_stats.json";
pub const MARKDOWN_FILE: &str = "redirect_audit_report.md";

const AUDIT_HEADERS: [&str; 11] = [
    "Original URL",
    "Path",
    "Final URL",
    "Final Status",
    "Hops",
    "Issue Type",
    "Redirect Chain",
    "Canonical Tag",
    "In Sitemap",
    "Priority Page",
    "Recommended Action",
];

/// One row of the extended audit sheet; every traced URL gets one.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub original_url: String,
    pub path: String,
    pub final_url: String,
    /// Status code, or `Error` when the trace never got a response.
    pub final_status: String,
    pub hops: usize,
    pub issue_type: String,
    pub redirect_chain: String,
    pub canonical: String,
    pub in_sitemap: bool,
    pub priority_page: bool,
    pub recommended_action: String,
    #[serde(skip)]
    pub category: IssueCategory,
}

impl AuditRow {
    fn record(&self) -> [String; 11] {
        [
            self.original_url.clone(),
            self.path.clone(),
            self.final_url.clone(),
            self.final_status.clone(),
            self.hops.to_string(),
            self.issue_type.clone(),
            self.redirect_chain.clone(),
            self.canonical.clone(),
            yes_no(self.in_sitemap).to_string(),
            yes_no(self.priority_page).to_string(),
            self.recommended_action.clone(),
        ]
    }

    /// 0 for 404s, 1 for redirects, 2 for everything else.
    fn issue_rank(&self) -> u8 {
        match self.category {
            IssueCategory::NotFound => 0,
            c if c.is_redirect() => 1,
            _ => 2,
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Remediation text for one trace. `rule` is the import rule generated for
/// the trace's path, if any; the text narrates that rule so the sheet and the
/// import file never disagree.
pub fn recommend_action(
    result: &TraceResult,
    category: IssueCategory,
    rule: Option<&RedirectRule>,
    config: &HopmapConfig,
) -> String {
    if let Some(skip) = config.rules.skip_rule(&result.original_url) {
        return format!("No action needed ({})", skip.reason);
    }

    if result.is_truncated() {
        return "Manual review (hop limit reached)".to_string();
    }

    if let Some(rule) = rule {
        return narrate_rule(rule, result);
    }

    match category {
        IssueCategory::NotFound | IssueCategory::RedirectChain => {
            format!(
                "No rule ({}); review manually",
                no_rule_reason(result, category, config)
            )
        }
        IssueCategory::RedirectSingle => match result.first_hop_status() {
            Some(301) | Some(308) => format!(
                "Already 301 → {} (verify target is correct)",
                result.final_url
            ),
            Some(code @ (302 | 303 | 307)) => {
                format!("Change {} to 301 → {}", code, result.final_url)
            }
            _ => "Review redirect".to_string(),
        },
        IssueCategory::CanonicalMismatch => "Review canonical tag".to_string(),
        IssueCategory::Unresolved => "Manual review (hop limit reached)".to_string(),
        IssueCategory::OtherError => "Investigate and fix".to_string(),
        IssueCategory::Clean => "No action needed".to_string(),
    }
}

fn narrate_rule(rule: &RedirectRule, result: &TraceResult) -> String {
    let target = if rule.new_target == "/" {
        "/ (homepage fallback)".to_string()
    } else {
        rule.new_target.clone()
    };

    match rule.reason {
        RuleReason::LegacyPrefix | RuleReason::BareSlug => format!("301 → {}", target),
        RuleReason::ExistingRedirect => format!(
            "Re-point existing redirect: 301 → {} (currently → {})",
            target, result.final_url
        ),
        RuleReason::ChainCollapse => format!("Collapse to single-hop 301 → {}", target),
    }
}

fn no_rule_reason(
    result: &TraceResult,
    category: IssueCategory,
    config: &HopmapConfig,
) -> &'static str {
    let path = site_path(&result.original_url);
    if config.rules.is_excluded(&result.original_url) {
        "excluded source"
    } else if path.is_empty() || path == "/" {
        "root path"
    } else if category == IssueCategory::NotFound {
        "no mapping for this path"
    } else {
        "chain ends on the same path"
    }
}

/// Audit rows sorted priority pages first, then 404s, then redirects, then
/// by original URL.
pub fn build_audit_rows(
    results: &[TraceResult],
    sitemap: &HashSet<String>,
    rules: &[RedirectRule],
    config: &HopmapConfig,
) -> Vec<AuditRow> {
    let by_path: HashMap<&str, &RedirectRule> =
        rules.iter().map(|r| (r.old_path.as_str(), r)).collect();

    let mut rows: Vec<AuditRow> = results
        .iter()
        .map(|r| {
            let category = classify(r);
            let path = site_path(&r.original_url);
            let in_sitemap = if sitemap.is_empty() {
                r.in_sitemap.unwrap_or(false)
            } else {
                sitemap.contains(&loose(&r.original_url))
            };
            let rule = by_path.get(path.as_str()).copied();

            AuditRow {
                original_url: r.original_url.clone(),
                priority_page: config.report.priority_pages.contains(&path),
                final_url: r.final_url.clone(),
                final_status: r
                    .final_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "Error".to_string()),
                hops: r.hops,
                issue_type: issue_label(r),
                redirect_chain: r.chain_trace(),
                canonical: r.canonical.clone().unwrap_or_default(),
                in_sitemap,
                recommended_action: recommend_action(r, category, rule, config),
                category,
                path,
            }
        })
        .collect();

    rows.sort_by(audit_order);
    rows
}

/// Flat object of named counts written to `summary_stats.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_urls: usize,
    pub not_found: usize,
    pub redirect_chain: usize,
    pub redirect_single: usize,
    pub canonical_mismatch: usize,
    pub clean: usize,
    pub other_error: usize,
    /// Traces that hit the hop limit, whatever their category.
    pub unresolved: usize,
    pub sitemap_urls: usize,
    pub sitemap_issues: usize,
    pub sitemap_not_crawled: usize,
    pub crawled_not_in_sitemap: usize,
    pub redirect_rules: usize,
    pub canonical_issues: usize,
    pub trailing_slash_urls: usize,
    pub non_www_urls: usize,
    #[serde(flatten)]
    pub rules_by_reason: BTreeMap<String, usize>,
    #[serde(flatten)]
    pub not_found_by_bucket: BTreeMap<String, usize>,
}

/// Every derived artifact of one run, computed in memory.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub results: Vec<TraceResult>,
    pub sitemap_urls: Vec<String>,
    pub rules: Vec<RedirectRule>,
    pub rows: Vec<AuditRow>,
    pub canonical_issues: Vec<CanonicalIssue>,
    pub sitemap_rows: Vec<SitemapAuditRow>,
    pub structure: StructureCounts,
    pub category_counts: BTreeMap<IssueCategory, usize>,
    /// Ordered `(label, count)` pairs; unmatched 404s land in `other`.
    pub not_found_buckets: Vec<(String, usize)>,
    /// Per category: `(in sitemap, not in sitemap)`.
    pub sitemap_crosstab: BTreeMap<IssueCategory, (usize, usize)>,
    pub stats: SummaryStats,
}

impl AuditReport {
    pub fn build(results: &[TraceResult], sitemap_urls: &[String], config: &HopmapConfig) -> Self {
        let own_hosts = config.site.own_hosts();
        let canonical_host = config.site.canonical_host();
        let sitemap: HashSet<String> = sitemap_urls.iter().map(|u| loose(u)).collect();

        let rules = build_rules(results, &config.rules, &own_hosts);
        let rows = build_audit_rows(results, &sitemap, &rules, config);
        let canonical_issues = canonical_audit(results, &canonical_host);
        let sitemap_rows = sitemap_audit(sitemap_urls, results, &canonical_host);
        let structure = structure_audit(results, &own_hosts);

        let mut category_counts: BTreeMap<IssueCategory, usize> =
            IssueCategory::ALL.iter().map(|c| (*c, 0)).collect();
        let mut sitemap_crosstab: BTreeMap<IssueCategory, (usize, usize)> = BTreeMap::new();
        for row in &rows {
            *category_counts.entry(row.category).or_default() += 1;
            let cell = sitemap_crosstab.entry(row.category).or_default();
            if row.in_sitemap {
                cell.0 += 1;
            } else {
                cell.1 += 1;
            }
        }

        let mut not_found_buckets: Vec<(String, usize)> = config
            .report
            .not_found_buckets
            .iter()
            .map(|b| (b.label.clone(), 0))
            .collect();
        not_found_buckets.push((FALLBACK_BUCKET.to_string(), 0));
        for row in rows.iter().filter(|r| r.category == IssueCategory::NotFound) {
            let label = config.report.bucket_for(&row.original_url);
            if let Some(bucket) = not_found_buckets.iter_mut().find(|(l, _)| l == label) {
                bucket.1 += 1;
            }
        }

        let crawled: HashSet<String> = results.iter().map(|r| loose(&r.original_url)).collect();
        let count = |c: IssueCategory| category_counts.get(&c).copied().unwrap_or(0);

        let mut rules_by_reason = BTreeMap::new();
        for reason in RuleReason::ALL {
            rules_by_reason.insert(
                format!("rules_{}", reason.key()),
                rules.iter().filter(|r| r.reason == reason).count(),
            );
        }

        let stats = SummaryStats {
            total_urls: results.len(),
            not_found: count(IssueCategory::NotFound),
            redirect_chain: count(IssueCategory::RedirectChain),
            redirect_single: count(IssueCategory::RedirectSingle),
            canonical_mismatch: count(IssueCategory::CanonicalMismatch),
            clean: count(IssueCategory::Clean),
            other_error: count(IssueCategory::OtherError),
            unresolved: results.iter().filter(|r| r.is_truncated()).count(),
            sitemap_urls: sitemap_urls.len(),
            sitemap_issues: sitemap_rows.iter().filter(|r| !r.ok).count(),
            sitemap_not_crawled: sitemap.iter().filter(|u| !crawled.contains(*u)).count(),
            crawled_not_in_sitemap: if sitemap.is_empty() {
                0
            } else {
                crawled.iter().filter(|u| !sitemap.contains(*u)).count()
            },
            redirect_rules: rules.len(),
            canonical_issues: canonical_issues.len(),
            trailing_slash_urls: structure.trailing_slash,
            non_www_urls: structure.non_www,
            rules_by_reason,
            not_found_by_bucket: not_found_buckets
                .iter()
                .map(|(label, n)| (format!("not_found_{}", label), *n))
                .collect(),
        };

        debug!(
            "Built report: {} rows, {} rules, {} canonical issues",
            rows.len(),
            rules.len(),
            canonical_issues.len()
        );

        Self {
            generated_at: Utc::now(),
            base_url: config.site.base_url.clone(),
            results: results.to_vec(),
            sitemap_urls: sitemap_urls.to_vec(),
            rules,
            rows,
            canonical_issues,
            sitemap_rows,
            structure,
            category_counts,
            not_found_buckets,
            sitemap_crosstab,
            stats,
        }
    }

    pub fn category_count(&self, category: IssueCategory) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| HopmapError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|e| HopmapError::Invalid(format!("non UTF-8 CSV output: {}", e)))
}

/// The two-column bulk import file. The header is written even when there
/// are no rules.
pub fn generate_redirects_csv(rules: &[RedirectRule]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Old URL", "New URL"])?;
    for rule in rules {
        writer.write_record([&rule.old_path, &rule.new_target])?;
    }
    finish_csv(writer)
}

pub fn generate_audit_csv(rows: &[AuditRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(AUDIT_HEADERS)?;
    for row in rows {
        writer.write_record(row.record())?;
    }
    finish_csv(writer)
}

pub fn generate_canonical_csv(issues: &[CanonicalIssue]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Page URL",
        "Declared Canonical",
        "Issue",
        "Normalized Page",
        "Normalized Canonical",
        "Action",
    ])?;
    for issue in issues {
        writer.write_record([
            issue.page_url.as_str(),
            issue.canonical.as_str(),
            issue.issue_type.label(),
            issue.normalized_page.as_str(),
            issue.normalized_canonical.as_str(),
            issue.action.as_str(),
        ])?;
    }
    finish_csv(writer)
}

pub fn generate_sitemap_csv(rows: &[SitemapAuditRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Sitemap URL", "HTTP Status", "Hops", "Issue", "Action"])?;
    for row in rows {
        writer.write_record([
            row.url.clone(),
            row.http_status.clone(),
            row.hops.to_string(),
            row.issue.clone(),
            row.action.clone(),
        ])?;
    }
    finish_csv(writer)
}

pub fn generate_summary_json(stats: &SummaryStats) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

pub fn generate_raw_json(results: &[TraceResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

pub fn generate_markdown_report(report: &AuditReport) -> String {
    let stats = &report.stats;
    let mut md = String::new();

    md.push_str("# Redirect Audit Report\n\n");
    md.push_str(&format!("- **Site:** {}\n", report.base_url));
    md.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("- **URLs traced:** {}\n", stats.total_urls));
    md.push_str(&format!("- **Sitemap URLs:** {}\n", stats.sitemap_urls));
    md.push_str(&format!("- **Redirect rules:** {}\n\n", stats.redirect_rules));

    md.push_str("## Issues by category\n\n");
    md.push_str("| Category | URLs |\n|---|---:|\n");
    for category in IssueCategory::ALL {
        md.push_str(&format!(
            "| {} | {} |\n",
            category.label(),
            report.category_count(category)
        ));
    }
    if stats.unresolved > 0 {
        md.push_str(&format!(
            "\n{} URL(s) hit the hop limit and need manual review.\n",
            stats.unresolved
        ));
    }
    md.push('\n');

    md.push_str("## 404s by URL pattern\n\n");
    if report.category_count(IssueCategory::NotFound) == 0 {
        md.push_str("No 404s found.\n\n");
    } else {
        md.push_str("| Pattern | URLs |\n|---|---:|\n");
        for (label, n) in report.not_found_buckets.iter().filter(|(_, n)| *n > 0) {
            md.push_str(&format!("| {} | {} |\n", label, n));
        }
        md.push('\n');
    }

    md.push_str("## Sitemap vs crawl\n\n");
    md.push_str("| Category | In sitemap | Not in sitemap |\n|---|---:|---:|\n");
    for (category, (inside, outside)) in &report.sitemap_crosstab {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            category.label(),
            inside,
            outside
        ));
    }
    md.push_str(&format!(
        "\n- Sitemap URLs with issues: {}\n- Sitemap URLs not crawled: {}\n- Crawled URLs missing from sitemap: {}\n\n",
        stats.sitemap_issues, stats.sitemap_not_crawled, stats.crawled_not_in_sitemap
    ));

    md.push_str("## Redirect rules\n\n");
    md.push_str("| Reason | Rules |\n|---|---:|\n");
    for reason in RuleReason::ALL {
        let n = report.rules.iter().filter(|r| r.reason == reason).count();
        md.push_str(&format!("| {} | {} |\n", reason.label(), n));
    }
    md.push('\n');

    md.push_str("## Canonical and structure\n\n");
    md.push_str(&format!(
        "- Canonical issues: {}\n- 200 pages with a trailing slash: {}\n- Own-site pages without www: {}\n\n",
        stats.canonical_issues, report.structure.trailing_slash, report.structure.non_www
    ));

    let priority: Vec<&AuditRow> = report
        .rows
        .iter()
        .filter(|r| r.priority_page && r.category != IssueCategory::Clean)
        .collect();
    if !priority.is_empty() {
        md.push_str("## Priority pages needing attention\n\n");
        md.push_str("| Path | Issue | Action |\n|---|---|---|\n");
        for row in priority {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                row.path, row.issue_type, row.recommended_action
            ));
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "---\nGenerated by hopmap {}\n",
        env!("CARGO_PKG_VERSION")
    ));
    md
}

/// Plain-text console summary.
pub fn generate_text_summary(report: &AuditReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    out.push_str("                   REDIRECT AUDIT SUMMARY\n");
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str(&format!("URLs traced:       {}\n", stats.total_urls));
    out.push_str(&format!("404 Not Found:     {}\n", stats.not_found));
    out.push_str(&format!("Redirect chains:   {}\n", stats.redirect_chain));
    out.push_str(&format!("Single redirects:  {}\n", stats.redirect_single));
    out.push_str(&format!("Canonical issues:  {}\n", stats.canonical_mismatch));
    out.push_str(&format!("Clean:             {}\n", stats.clean));
    out.push_str(&format!("Other errors:      {}\n", stats.other_error));
    if stats.unresolved > 0 {
        out.push_str(&format!("Hop limit hit:     {}\n", stats.unresolved));
    }
    out.push('\n');
    out.push_str(&format!("Redirect rules:    {}\n", stats.redirect_rules));
    out.push_str(&format!(
        "Sitemap issues:    {} of {}\n",
        stats.sitemap_issues, stats.sitemap_urls
    ));
    out
}

pub fn save_report(content: &str, path: &Path) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())
    };
    write().map_err(|source| HopmapError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Render every artifact, then write them into `dir`. Nothing is written
/// if any artifact fails to render.
pub fn write_artifacts(report: &AuditReport, dir: &Path) -> Result<Vec<PathBuf>> {
    let artifacts = [
        (RAW_RESULTS_FILE, generate_raw_json(&report.results)?),
        (
            SITEMAP_URLS_FILE,
            serde_json::to_string_pretty(&report.sitemap_urls)?,
        ),
        (REDIRECTS_FILE, generate_redirects_csv(&report.rules)?),
        (MAPPING_SHEET_FILE, generate_audit_csv(&report.rows)?),
        (CANONICAL_FILE, generate_canonical_csv(&report.canonical_issues)?),
        (SITEMAP_AUDIT_FILE, generate_sitemap_csv(&report.sitemap_rows)?),
        (SUMMARY_FILE, generate_summary_json(&report.stats)?),
        (MARKDOWN_FILE, generate_markdown_report(report)),
    ];

    std::fs::create_dir_all(dir).map_err(|source| HopmapError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(artifacts.len());
    for (name, content) in artifacts {
        let path = dir.join(name);
        save_report(&content, &path)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn audit_order(a: &AuditRow, b: &AuditRow) -> Ordering {
    b.priority_page
        .cmp(&a.priority_page)
        .then_with(|| a.issue_rank().cmp(&b.issue_rank()))
        .then_with(|| a.original_url.cmp(&b.original_url))
}
