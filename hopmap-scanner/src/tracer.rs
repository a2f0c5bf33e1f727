use crate::error::{Result, ScanError};
use crate::result::{Hop, TraceResult};
use reqwest::Client;
use reqwest::header::LOCATION;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct TracerOptions {
    pub max_hops: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            max_hops: 10,
            timeout: Duration::from_secs(15),
            user_agent: "Mozilla/5.0 (compatible; HopmapAuditBot/0.1)".to_string(),
        }
    }
}

/// Follows redirects one hop at a time so every 3xx and its `Location` is
/// observable. Automatic redirect handling in the client is disabled.
pub struct RedirectTracer {
    client: Client,
    max_hops: usize,
}

impl RedirectTracer {
    pub fn new(options: TracerOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_hops: options.max_hops,
        })
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Trace `url` until a non-redirect response, a transport error, or the
    /// hop limit. Each hop is attempted exactly once.
    pub async fn trace(&self, url: &str) -> TraceResult {
        let mut result = TraceResult::new(url.to_string());
        let mut current = url.to_string();

        for _ in 0..self.max_hops {
            debug!("GET {}", current);

            let response = match self.client.get(&current).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Trace of {} failed at {}: {}", url, current, e);
                    result.error = Some(e.to_string());
                    break;
                }
            };

            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match location {
                Some(location) if (300..400).contains(&status) => {
                    let target = resolve_location(&current, &location);
                    debug!("  {} -> {} ({})", current, target, status);
                    result.push_hop(Hop {
                        url: current.clone(),
                        status_code: status,
                        target: target.clone(),
                    });
                    current = target;
                }
                _ => {
                    result.final_status = Some(status);
                    break;
                }
            }
        }

        if result.is_truncated() {
            warn!("Hop limit of {} reached tracing {}", self.max_hops, url);
        }

        result.final_url = current;
        result
    }

    /// Plain GET of a page body, used to read canonical tags and links from
    /// a page already known to answer 200.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// A `Location` starting with `/` is resolved against the scheme and host of
/// the current URL; anything else is taken verbatim as absolute.
pub fn resolve_location(current: &str, location: &str) -> String {
    if !location.starts_with('/') {
        return location.to_string();
    }

    Url::parse(current)
        .ok()
        .and_then(|base| base.join(location).ok())
        .map(|joined| joined.to_string())
        .unwrap_or_else(|| location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn tracer(max_hops: usize) -> RedirectTracer {
        RedirectTracer::new(TracerOptions {
            max_hops,
            timeout: Duration::from_secs(5),
            ..TracerOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("https://example.test:8443/a/b", "/c?x=1"),
            "https://example.test:8443/c?x=1"
        );
        assert_eq!(
            resolve_location("https://example.test/a", "https://www.example.test/a"),
            "https://www.example.test/a"
        );
    }

    #[tokio::test]
    async fn test_no_redirect() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/about", mock_server.uri());
        let result = tracer(10).trace(&url).await;

        assert_eq!(result.hops, 0);
        assert!(result.chain.is_empty());
        assert_eq!(result.final_status, Some(200));
        assert_eq!(result.final_url, url);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_relative_redirect_chain() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/c"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let start = format!("{}/a", mock_server.uri());
        let result = tracer(10).trace(&start).await;

        assert_eq!(result.hops, 2);
        assert_eq!(result.hops, result.chain.len());
        assert_eq!(result.chain[0].url, start);
        assert_eq!(result.chain[0].status_code, 301);
        assert_eq!(result.chain[0].target, format!("{}/b", mock_server.uri()));
        assert_eq!(result.chain[1].status_code, 302);
        assert_eq!(result.final_url, format!("{}/c", mock_server.uri()));
        assert_eq!(result.final_status, Some(200));
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_terminal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/odd"))
            .respond_with(ResponseTemplate::new(301))
            .mount(&mock_server)
            .await;

        let url = format!("{}/odd", mock_server.uri());
        let result = tracer(10).trace(&url).await;

        assert_eq!(result.hops, 0);
        assert_eq!(result.final_status, Some(301));
        assert_eq!(result.final_url, url);
    }

    #[tokio::test]
    async fn test_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = tracer(10)
            .trace(&format!("{}/missing", mock_server.uri()))
            .await;

        assert_eq!(result.final_status, Some(404));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_hop_limit_is_quiet_truncation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/loop", mock_server.uri());
        let result = tracer(3).trace(&url).await;

        assert_eq!(result.hops, 3);
        assert_eq!(result.final_status, None);
        assert_eq!(result.error, None);
        assert!(result.is_truncated());
        assert_eq!(result.final_url, url);
    }

    #[tokio::test]
    async fn test_transport_error_is_captured() {
        // Port 9 (discard) is not listening on test machines.
        let url = "http://127.0.0.1:9/unreachable";
        let result = tracer(10).trace(url).await;

        assert_eq!(result.hops, 0);
        assert_eq!(result.final_status, None);
        assert!(result.error.is_some());
        assert_eq!(result.final_url, url);
        assert!(!result.is_truncated());
    }

    #[tokio::test]
    async fn test_error_after_redirect_keeps_failed_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "http://127.0.0.1:9/dead"),
            )
            .mount(&mock_server)
            .await;

        let result = tracer(10)
            .trace(&format!("{}/gone", mock_server.uri()))
            .await;

        assert_eq!(result.hops, 1);
        assert!(result.error.is_some());
        assert_eq!(result.final_url, "http://127.0.0.1:9/dead");
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let tracer = tracer(10);
        let body = tracer
            .fetch_page(&format!("{}/ok", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");

        let err = tracer
            .fetch_page(&format!("{}/broken", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Status { status: 500, .. }));
    }
}
