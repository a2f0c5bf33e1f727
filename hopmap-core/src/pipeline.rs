// Crawl pipeline: sitemap fetch, seed assembly, tracing

use crate::classify::issue_label;
use crate::config::HopmapConfig;
use crate::error::{HopmapError, Result};
use crate::seeds::{SeedSources, build_seeds};
use hopmap_scanner::{RedirectTracer, SiteCrawler, SitemapFetcher, TraceResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub seeds_file: Option<PathBuf>,
    pub gsc_dir: Option<PathBuf>,
    /// Follow internal links found on 200 pages.
    pub discover_links: bool,
    /// Overrides `tracer.workers` when set.
    pub workers: Option<usize>,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            seeds_file: None,
            gsc_dir: None,
            discover_links: true,
            workers: None,
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CrawlOutput {
    pub results: Vec<TraceResult>,
    pub sitemap_urls: Vec<String>,
    pub seed_count: usize,
}

pub fn sitemap_url(config: &HopmapConfig) -> String {
    config
        .seeds
        .sitemap_url
        .clone()
        .unwrap_or_else(|| config.site.absolute("/sitemap.xml"))
}

fn spinner(show: bool) -> Option<Arc<ProgressBar>> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Starting crawl...");
    Some(Arc::new(pb))
}

/// Fetch the sitemap, assemble seeds and trace them.
///
/// With link discovery on, seeds are crawled breadth-first one at a time;
/// otherwise the fixed seed list is traced with up to `workers` in flight.
pub async fn execute_crawl(
    config: &HopmapConfig,
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutput> {
    let tracer = Arc::new(RedirectTracer::new(config.tracer.tracer_options())?);
    let report = |msg: String| {
        if let Some(ref callback) = progress_callback {
            callback(msg);
        }
    };

    let sitemap_urls = if config.seeds.include_sitemap {
        let url = sitemap_url(config);
        report(format!("Fetching sitemap {}", url));
        let urls = SitemapFetcher::new(tracer.client().clone()).fetch(&url).await;
        report(format!("Found {} sitemap URLs", urls.len()));
        urls
    } else {
        Vec::new()
    };

    let seeds = build_seeds(
        config,
        &SeedSources {
            seeds_file: options.seeds_file.as_deref(),
            gsc_dir: options.gsc_dir.as_deref(),
            sitemap_urls: &sitemap_urls,
        },
    )?;
    let seed_count = seeds.len();
    report(format!("{} seed URLs", seed_count));

    let progress_bar = spinner(options.show_progress_bars);
    let processed = Arc::new(AtomicUsize::new(0));
    let internal_progress: hopmap_scanner::ProgressCallback = match progress_bar.clone() {
        Some(pb) => {
            let processed = processed.clone();
            Arc::new(move |_idx: usize, url: String| {
                let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!("Tracing... {} URLs ({})", count, url));
                pb.tick();
            })
        }
        None => Arc::new(|_idx: usize, _url: String| {}),
    };

    let crawler = SiteCrawler::new(tracer, config.site.own_hosts())
        .with_max_pages(config.tracer.max_pages)
        .with_delay(config.tracer.delay())
        .with_link_discovery(options.discover_links)
        .with_progress_callback(internal_progress);

    let workers = options.workers.unwrap_or(config.tracer.workers);
    let gsc_issues = seeds.gsc_issues().clone();
    let seed_urls = seeds.into_urls();

    let mut results = if options.discover_links {
        crawler.crawl(seed_urls, &sitemap_urls).await
    } else {
        crawler.trace_all(seed_urls, &sitemap_urls, workers).await
    };

    for result in &mut results {
        if let Some(issue) = gsc_issues.get(&result.original_url) {
            result.gsc_issue = Some(issue.clone());
        }
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} URLs traced",
            processed.load(Ordering::Relaxed)
        ));
    }
    info!("Traced {} URLs from {} seeds", results.len(), seed_count);

    Ok(CrawlOutput {
        results,
        sitemap_urls,
        seed_count,
    })
}

/// Load a saved `crawl_results_raw.json`.
pub fn load_traces(path: &Path) -> Result<Vec<TraceResult>> {
    let content = std::fs::read_to_string(path).map_err(|source| HopmapError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut results: Vec<TraceResult> =
        serde_json::from_str(&content).map_err(|e| HopmapError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for result in &mut results {
        result.sync_hops();
    }
    Ok(results)
}

/// Load a saved `sitemap_urls.json`.
pub fn load_sitemap_urls(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| HopmapError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| HopmapError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn colored_status(status: Option<u16>) -> String {
    match status {
        Some(code @ 200..=299) => format!("\x1b[32m{}\x1b[0m", code), // Green
        Some(code @ 300..=399) => format!("\x1b[36m{}\x1b[0m", code), // Cyan
        Some(code @ 400..=499) => format!("\x1b[33m{}\x1b[0m", code), // Yellow
        Some(code @ 500..=599) => format!("\x1b[31m{}\x1b[0m", code), // Red
        Some(code) => code.to_string(),
        None => "\x1b[31m---\x1b[0m".to_string(),
    }
}

/// Hop-by-hop view of a single trace for the terminal.
pub fn generate_trace_report(result: &TraceResult) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("  {}\n\n", result.original_url));

    for (idx, hop) in result.chain.iter().enumerate() {
        report.push_str(&format!(
            "  {}. {} {}\n     → {}\n",
            idx + 1,
            colored_status(Some(hop.status_code)),
            hop.url,
            hop.target
        ));
    }

    report.push_str(&format!(
        "\n  Final: {} {}\n",
        colored_status(result.final_status),
        result.final_url
    ));
    if let Some(ref error) = result.error {
        report.push_str(&format!("  Error: \x1b[31m{}\x1b[0m\n", error));
    }
    if let Some(ref canonical) = result.canonical {
        report.push_str(&format!("  Canonical: {}\n", canonical));
    }
    report.push_str(&format!("  Hops: {}\n", result.hops));
    report.push_str(&format!("  Issue: {}\n", issue_label(result)));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}
