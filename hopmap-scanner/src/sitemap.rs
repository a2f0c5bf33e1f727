//! Parse sitemap.xml and sitemap index files.

use crate::error::{Result, ScanError};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use tracing::{info, warn};

/// Child index documents are followed at most this deep.
const MAX_INDEX_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page URLs from `<url><loc>`.
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: child sitemap URLs from `<sitemap><loc>`.
    Index(Vec<String>),
}

/// Parse one sitemap document. Entries without a `<loc>` are skipped.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut in_loc = false;
    let mut is_index = false;
    let mut current_loc = String::new();
    let mut page_urls = Vec::new();
    let mut child_sitemaps = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "sitemapindex" => is_index = true,
                    "url" => {
                        in_url = true;
                        current_loc.clear();
                    }
                    "sitemap" => {
                        in_sitemap = true;
                        current_loc.clear();
                    }
                    "loc" => in_loc = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" if in_url => {
                        if !current_loc.is_empty() {
                            page_urls.push(current_loc.clone());
                        }
                        in_url = false;
                    }
                    "sitemap" if in_sitemap => {
                        if !current_loc.is_empty() {
                            child_sitemaps.push(current_loc.clone());
                        }
                        in_sitemap = false;
                    }
                    "loc" => in_loc = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_loc && (in_url || in_sitemap) => {
                let text = e.unescape().unwrap_or_default();
                current_loc = text.trim().to_string();
            }
            Ok(Event::CData(e)) if in_loc && (in_url || in_sitemap) => {
                current_loc = String::from_utf8_lossy(&e).trim().to_string();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScanError::ParseError(format!("XML parse error: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    if is_index || (!child_sitemaps.is_empty() && page_urls.is_empty()) {
        Ok(SitemapDocument::Index(child_sitemaps))
    } else {
        Ok(SitemapDocument::UrlSet(page_urls))
    }
}

pub struct SitemapFetcher {
    client: Client,
}

impl SitemapFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Every page URL reachable from `url`, expanding sitemap indexes.
    /// Unreachable or malformed documents are logged and contribute nothing.
    pub async fn fetch(&self, url: &str) -> Vec<String> {
        let mut urls = Vec::new();
        self.collect(url, 0, &mut urls).await;
        info!("Found {} URLs in sitemap {}", urls.len(), url);
        urls
    }

    async fn collect(&self, url: &str, depth: usize, urls: &mut Vec<String>) {
        let document = match self.fetch_document(url).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Sitemap fetch error for {}: {}", url, e);
                return;
            }
        };

        match document {
            SitemapDocument::UrlSet(pages) => urls.extend(pages),
            SitemapDocument::Index(children) if depth < MAX_INDEX_DEPTH => {
                for child in children {
                    Box::pin(self.collect(&child, depth + 1, urls)).await;
                }
            }
            SitemapDocument::Index(children) => {
                warn!(
                    "Ignoring {} nested sitemap indexes below {}",
                    children.len(),
                    url
                );
            }
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        parse_sitemap(&body)
    }
}
