use crate::html::{extract_canonical, extract_links};
use crate::normalize::{is_own_host, loose};
use crate::result::TraceResult;
use crate::tracer::RedirectTracer;
use futures::stream::{self, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Called with the 1-based position of the URL being traced and the URL.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Breadth-first walk over a site's own hosts, tracing every URL it meets.
pub struct SiteCrawler {
    tracer: Arc<RedirectTracer>,
    own_hosts: Vec<String>,
    max_pages: usize,
    delay: Duration,
    discover_links: bool,
    progress_callback: Option<ProgressCallback>,
}

impl SiteCrawler {
    pub fn new(tracer: Arc<RedirectTracer>, own_hosts: Vec<String>) -> Self {
        Self {
            tracer,
            own_hosts,
            max_pages: 500,
            delay: Duration::from_millis(300),
            discover_links: true,
            progress_callback: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_link_discovery(mut self, discover_links: bool) -> Self {
        self.discover_links = discover_links;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Trace the seed queue in order, appending internal links found on 200
    /// pages when link discovery is on. URLs are deduplicated on their loose
    /// form and foreign hosts are never requested.
    pub async fn crawl(&self, seeds: Vec<String>, sitemap_urls: &[String]) -> Vec<TraceResult> {
        info!(
            "Starting crawl with {} seed URLs (limit {})",
            seeds.len(),
            self.max_pages
        );

        let sitemap_keys: HashSet<String> = sitemap_urls.iter().map(|u| loose(u)).collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = seeds.into();
        let mut results = Vec::new();

        while let Some(url) = queue.pop_front() {
            if results.len() >= self.max_pages {
                info!("Page limit of {} reached", self.max_pages);
                break;
            }

            let key = loose(&url);
            if visited.contains(&key) {
                continue;
            }
            if !is_own_host(&url, &self.own_hosts) {
                debug!("Skipping foreign URL {}", url);
                continue;
            }
            visited.insert(key.clone());

            if let Some(ref callback) = self.progress_callback {
                callback(results.len() + 1, url.clone());
            }

            let (mut result, links) = self.inspect(&url).await;
            result.in_sitemap = Some(sitemap_keys.contains(&key));

            for link in links {
                if is_own_host(&link, &self.own_hosts) && !visited.contains(&loose(&link)) {
                    queue.push_back(link);
                }
            }

            results.push(result);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!("Crawl complete. Checked {} URLs", results.len());
        results
    }

    /// Trace a fixed URL list without following discovered links, keeping at
    /// most `workers` traces in flight. Results come back in input order.
    pub async fn trace_all(
        &self,
        urls: Vec<String>,
        sitemap_urls: &[String],
        workers: usize,
    ) -> Vec<TraceResult> {
        let sitemap_keys: HashSet<String> = sitemap_urls.iter().map(|u| loose(u)).collect();
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls
            .into_iter()
            .filter(|u| seen.insert(loose(u)))
            .take(self.max_pages)
            .collect();

        info!("Tracing {} URLs with {} workers", urls.len(), workers.max(1));

        stream::iter(urls.into_iter().enumerate())
            .map(|(idx, url)| {
                let sitemap_keys = &sitemap_keys;
                async move {
                    if let Some(ref callback) = self.progress_callback {
                        callback(idx + 1, url.clone());
                    }
                    let (mut result, _) = self.inspect(&url).await;
                    result.in_sitemap = Some(sitemap_keys.contains(&loose(&url)));
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    result
                }
            })
            .buffered(workers.max(1))
            .collect()
            .await
    }

    /// Trace one URL; for a 200 destination also read its canonical tag and,
    /// when discovery is on, its outgoing links.
    async fn inspect(&self, url: &str) -> (TraceResult, Vec<String>) {
        let mut result = self.tracer.trace(url).await;
        let mut links = Vec::new();

        if result.final_status == Some(200) {
            match self.tracer.fetch_page(&result.final_url).await {
                Ok(body) => {
                    result.canonical = extract_canonical(&body);
                    if self.discover_links {
                        links = extract_links(&body, &result.final_url);
                    }
                }
                Err(e) => debug!("Could not read {}: {}", result.final_url, e),
            }
        }

        (result, links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::TracerOptions;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn html_page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    fn crawler_for(server: &MockServer) -> SiteCrawler {
        let host = url::Url::parse(&server.uri())
            .unwrap()
            .host_str()
            .unwrap()
            .to_string();
        let tracer = RedirectTracer::new(TracerOptions::default()).unwrap();
        SiteCrawler::new(Arc::new(tracer), vec![host]).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_crawl_discovers_internal_links_and_canonicals() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        html_page(
            &mock_server,
            "/",
            format!(
                r#"<html><head><link rel="canonical" href="{base}/"></head><body>
                    <a href="/about">About</a>
                    <a href="/old">Old</a>
                    <a href="https://elsewhere.test/x">External</a>
                </body></html>"#
            ),
        )
        .await;
        html_page(
            &mock_server,
            "/about",
            format!(r#"<html><head><link rel="canonical" href="{base}/about-us"></head></html>"#),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/about"))
            .mount(&mock_server)
            .await;

        let results = crawler_for(&mock_server)
            .crawl(vec![format!("{base}/")], &[format!("{base}/about/")])
            .await;

        let urls: Vec<String> = results.iter().map(|r| r.original_url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{base}/"),
                format!("{base}/about"),
                format!("{base}/old"),
            ]
        );

        let about = &results[1];
        assert_eq!(about.canonical, Some(format!("{base}/about-us")));
        assert_eq!(about.in_sitemap, Some(true));

        let old = &results[2];
        assert_eq!(old.hops, 1);
        assert_eq!(old.in_sitemap, Some(false));
    }

    #[tokio::test]
    async fn test_crawl_respects_page_limit_and_dedupes() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();
        html_page(&mock_server, "/a", "<html></html>".to_string()).await;
        html_page(&mock_server, "/b", "<html></html>".to_string()).await;

        let seeds = vec![
            format!("{base}/a"),
            format!("{base}/a/"),
            format!("{base}/b"),
        ];
        let results = crawler_for(&mock_server)
            .with_max_pages(1)
            .crawl(seeds.clone(), &[])
            .await;
        assert_eq!(results.len(), 1);

        let results = crawler_for(&mock_server).crawl(seeds, &[]).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_trace_all_keeps_input_order() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();
        for i in 1..=6 {
            html_page(&mock_server, &format!("/page{}", i), "<html></html>".to_string()).await;
        }

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let urls: Vec<String> = (1..=6).map(|i| format!("{base}/page{i}")).collect();

        let results = crawler_for(&mock_server)
            .with_progress_callback(Arc::new(move |idx, _url| {
                seen_clone.lock().unwrap().push(idx);
            }))
            .trace_all(urls.clone(), &[], 3)
            .await;

        let traced: Vec<String> = results.iter().map(|r| r.original_url.clone()).collect();
        assert_eq!(traced, urls);
        assert!(results.iter().all(|r| r.final_status == Some(200)));
        assert_eq!(seen.lock().unwrap().len(), 6);
    }
}
