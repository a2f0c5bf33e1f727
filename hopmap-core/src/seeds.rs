// Seed URL assembly: known paths, entity expansion, seed files, search
// console exports and sitemap URLs

use crate::config::HopmapConfig;
use crate::error::{HopmapError, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Ordered, deduplicated seed list. The first source to add a URL wins.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    urls: Vec<String>,
    seen: HashSet<String>,
    gsc_issues: HashMap<String, String>,
}

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the URL was already present.
    pub fn push(&mut self, url: String) -> bool {
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, urls: I) {
        for url in urls {
            self.push(url);
        }
    }

    /// Add a URL reported by a search console export, remembering the
    /// first issue label it was reported under.
    pub fn push_gsc(&mut self, url: String, issue: &str) {
        self.gsc_issues
            .entry(url.clone())
            .or_insert_with(|| issue.to_string());
        self.push(url);
    }

    pub fn gsc_issue(&self, url: &str) -> Option<&str> {
        self.gsc_issues.get(url).map(String::as_str)
    }

    pub fn gsc_issues(&self) -> &HashMap<String, String> {
        &self.gsc_issues
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// URLs reported under one search console coverage issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GscExport {
    pub issue: String,
    pub urls: Vec<String>,
}

/// Extra seed inputs beyond the configuration file.
#[derive(Debug, Clone, Default)]
pub struct SeedSources<'a> {
    pub seeds_file: Option<&'a Path>,
    pub gsc_dir: Option<&'a Path>,
    pub sitemap_urls: &'a [String],
}

/// Assemble seeds in order: site root, known paths, entity slugs under each
/// entity prefix, seed file lines, search console exports, sitemap URLs.
pub fn build_seeds(config: &HopmapConfig, sources: &SeedSources<'_>) -> Result<SeedSet> {
    let site = &config.site;
    let seeds = &config.seeds;
    let mut set = SeedSet::new();

    set.push(site.absolute("/"));
    set.extend(seeds.paths.iter().map(|p| site.absolute(&leading_slash(p))));

    for prefix in &seeds.entity_prefixes {
        let prefix = prefix.trim_end_matches('/');
        for slug in &seeds.entity_slugs {
            set.push(site.absolute(&format!("{}/{}", leading_slash(prefix).trim_end_matches('/'), slug)));
        }
    }
    debug!("{} seeds from configuration", set.len());

    if let Some(path) = sources.seeds_file {
        let urls = load_urls_from_file(path, &site.base_url)?;
        info!("Loaded {} seed URLs from {}", urls.len(), path.display());
        set.extend(urls);
    }

    if let Some(dir) = sources.gsc_dir {
        for export in load_gsc_exports(dir)? {
            for url in export.urls {
                set.push_gsc(url, &export.issue);
            }
        }
    }

    if seeds.include_sitemap {
        set.extend(sources.sitemap_urls.iter().cloned());
    }

    info!("Assembled {} unique seed URLs", set.len());
    Ok(set)
}

fn leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Read a newline-delimited URL list. Blank lines and `#` comments are
/// skipped; site-relative lines are joined to `base_url`.
pub fn load_urls_from_file(path: &Path, base_url: &str) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| HopmapError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| parse_url_line(line, base_url))
        .collect();

    if urls.is_empty() {
        return Err(HopmapError::EmptyInput(path.to_path_buf()));
    }

    Ok(urls)
}

/// Parse a single seed line, joining a site-relative path to `base_url` or
/// adding `https://` to a bare host.
pub fn parse_url_line(line: &str, base_url: &str) -> Option<String> {
    if line.starts_with('/') {
        return Url::parse(base_url)
            .and_then(|base| base.join(line))
            .map(|u| u.to_string())
            .ok();
    }

    if let Ok(url) = Url::parse(line) {
        if matches!(url.scheme(), "http" | "https") {
            return Some(line.to_string());
        }
        if line.contains("://") || matches!(url.scheme(), "mailto" | "tel" | "javascript" | "data") {
            warn!("Skipping non-web URL '{}'", line);
            return None;
        }
    }

    let with_scheme = format!("https://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|u| u.host_str().is_some_and(|h| h.contains('.'))) {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// Read every `*Coverage-Drilldown*` sub-directory of `dir`, in name order.
/// Each needs a `Metadata.csv` with an `Issue,<label>` row and a `Table.csv`
/// with a `URL` column; incomplete exports are skipped.
pub fn load_gsc_exports(dir: &Path) -> Result<Vec<GscExport>> {
    let entries = fs::read_dir(dir).map_err(|source| HopmapError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut folders: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("Coverage-Drilldown"))
        })
        .collect();
    folders.sort();

    let mut exports = Vec::new();
    for folder in folders {
        let metadata = folder.join("Metadata.csv");
        let table = folder.join("Table.csv");
        if !metadata.is_file() || !table.is_file() {
            warn!("Skipping incomplete export {}", folder.display());
            continue;
        }

        let issue = read_gsc_issue(&metadata)?.unwrap_or_else(|| "Unknown".to_string());
        let urls = read_gsc_urls(&table)?;
        debug!("{}: {} URLs under '{}'", folder.display(), urls.len(), issue);
        exports.push(GscExport { issue, urls });
    }

    info!("Loaded {} search console exports", exports.len());
    Ok(exports)
}

fn csv_reader(path: &Path, has_headers: bool) -> Result<csv::Reader<fs::File>> {
    let file = fs::File::open(path).map_err(|source| HopmapError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(file))
}

fn read_gsc_issue(path: &Path) -> Result<Option<String>> {
    let mut reader = csv_reader(path, false)?;
    for record in reader.records() {
        let record = record?;
        if record.get(0) == Some("Issue")
            && let Some(label) = record.get(1)
        {
            return Ok(Some(label.trim().to_string()));
        }
    }
    Ok(None)
}

fn read_gsc_urls(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv_reader(path, true)?;
    let Some(column) = reader.headers()?.iter().position(|h| h.trim() == "URL") else {
        warn!("{} has no URL column", path.display());
        return Ok(Vec::new());
    };

    let mut urls = Vec::new();
    for record in reader.records() {
        if let Some(url) = record?.get(column).map(str::trim)
            && !url.is_empty()
        {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}
