// Post-fix verification of a fixed page list

use crate::config::{HopmapConfig, VerifyPage};
use crate::error::Result;
use crate::report::save_report;
use hopmap_scanner::{RedirectTracer, TraceResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const VERIFICATION_FILE: &str = "verification.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCheck {
    pub name: String,
    pub legacy: bool,
    pub verdict: Verdict,
    /// e.g. `PASS - Clean 200`.
    pub result: String,
    #[serde(flatten)]
    pub trace: TraceResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
    pub total: usize,
}

impl VerifySummary {
    pub fn from_checks(checks: &[PageCheck]) -> Self {
        let count = |v: Verdict| checks.iter().filter(|c| c.verdict == v).count();
        Self {
            pass: count(Verdict::Pass),
            warn: count(Verdict::Warn),
            fail: count(Verdict::Fail),
            total: checks.len(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.fail > 0
    }
}

/// Grade one trace. Legacy pages are expected to redirect exactly once.
pub fn grade(trace: &TraceResult, legacy: bool) -> (Verdict, String) {
    if let Some(ref error) = trace.error {
        return (Verdict::Fail, format!("FAIL - Error: {}", error));
    }

    match (trace.final_status, trace.hops) {
        (None, _) => (Verdict::Warn, "WARN - Too many redirects".to_string()),
        (Some(200), 0) => (Verdict::Pass, "PASS - Clean 200".to_string()),
        (Some(200), 1) if legacy => (
            Verdict::Pass,
            "PASS - Correctly redirects (1 hop)".to_string(),
        ),
        (Some(200), 1) => (
            Verdict::Warn,
            "WARN - Unexpected redirect (1 hop)".to_string(),
        ),
        (Some(200), _) => (
            Verdict::Warn,
            "WARN - Redirect chain (needs cleanup)".to_string(),
        ),
        (Some(404), _) => (Verdict::Fail, "FAIL - 404 Not Found".to_string()),
        (Some(status), _) => (Verdict::Warn, format!("WARN - HTTP {}", status)),
    }
}

fn page_url(config: &HopmapConfig, page: &VerifyPage) -> String {
    if page.url.starts_with('/') {
        config.site.absolute(&page.url)
    } else {
        page.url.clone()
    }
}

/// Trace every configured page in order and grade it.
pub async fn execute_verify(config: &HopmapConfig) -> Result<Vec<PageCheck>> {
    if config.verify.pages.is_empty() {
        warn!("No [[verify.pages]] configured");
    }

    let tracer = RedirectTracer::new(config.tracer.tracer_options())?;
    let delay = config.tracer.delay();
    let mut checks = Vec::with_capacity(config.verify.pages.len());

    for page in &config.verify.pages {
        let trace = tracer.trace(&page_url(config, page)).await;
        let (verdict, result) = grade(&trace, page.legacy);
        info!("{}: {}", page.name, result);
        checks.push(PageCheck {
            name: page.name.clone(),
            legacy: page.legacy,
            verdict,
            result,
            trace,
        });

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(checks)
}

pub fn write_verification(checks: &[PageCheck], dir: &Path) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(checks)?;
    std::fs::create_dir_all(dir).map_err(|source| crate::error::HopmapError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(VERIFICATION_FILE);
    save_report(&content, &path)?;
    Ok(path)
}
