use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use hopmap_core::config::HopmapConfig;
use hopmap_core::pipeline::{
    CrawlOptions, CrawlProgressCallback, execute_crawl, generate_trace_report, load_sitemap_urls,
    load_traces,
};
use hopmap_core::report::{AuditReport, generate_text_summary, write_artifacts};
use hopmap_core::verify::{PageCheck, Verdict, VerifySummary, execute_verify, write_verification};
use hopmap_scanner::{RedirectTracer, TracerOptions};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

pub const CONFIG_TEMPLATE: &str = include_str!("../templates/hopmap.toml");

/// `RUST_LOG` wins; otherwise `warn`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init();
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

pub fn load_config(path: &Path) -> Result<HopmapConfig> {
    let path = expand_path(path);
    let config = HopmapConfig::from_file(&path)?;
    debug!("Loaded configuration for {}", config.site.base_url);
    Ok(config)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn print_artifacts(paths: &[PathBuf]) {
    println!("{}", "Artifacts:".bright_white().bold());
    for path in paths {
        println!("  {} {}", "•".blue(), path.display());
    }
    println!();
}

fn print_progress(quiet: bool) -> Option<CrawlProgressCallback> {
    if quiet {
        return None;
    }
    Some(Arc::new(|msg: String| {
        println!("{} {}", "→".blue(), msg);
    }))
}

// ============================================================================
// init
// ============================================================================

/// Write the example configuration to `path`. Returns `false` when the file
/// exists and `force` is not set.
pub fn write_config_template(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let quiet = args.get_flag("quiet");
    let force = args.get_flag("force");
    let target = args
        .get_one::<String>("PATH")
        .map(|p| expand_path(Path::new(p)))
        .context("No configuration path given")?;

    if !quiet {
        print_divider();
        println!("{}", "  HOPMAP INITIALIZATION".bright_white().bold());
        print_divider();
        println!();
        println!(
            "{} Target: {}",
            "→".blue(),
            target.display().to_string().bright_white()
        );
        println!();
    }

    let mut overwrite = force;
    if target.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!(
            "Configuration file already exists: {}",
            target.display().to_string().bright_white()
        );
        let response = print_prompt("Overwrite it? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
        overwrite = true;
    }

    write_config_template(&target, overwrite)?;
    println!(
        "{} Wrote {}",
        "✓".green().bold(),
        target.display().to_string().bright_white()
    );
    if !quiet {
        println!();
        println!("Edit the [site] and [rules] sections, then run:");
        println!(
            "  {}",
            format!("hopmap crawl --config {}", target.display()).bright_cyan()
        );
    }
    Ok(())
}

// ============================================================================
// crawl / build
// ============================================================================

fn finish_audit(report: &AuditReport, output: &Path, quiet: bool) -> Result<()> {
    let written = write_artifacts(report, output)?;

    println!();
    print!("{}", generate_text_summary(report));
    println!();
    if !quiet {
        print_artifacts(&written);
    }
    println!(
        "{} {} redirect rules ready for import",
        "✓".green().bold(),
        report.rules.len()
    );
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let quiet = args.get_flag("quiet");
    let config = load_config(args.get_one::<PathBuf>("config").context("--config is required")?)?;
    let output = args
        .get_one::<PathBuf>("output")
        .map(|p| expand_path(p))
        .context("--output is required")?;

    let options = CrawlOptions {
        seeds_file: args.get_one::<PathBuf>("seeds-file").map(|p| expand_path(p)),
        gsc_dir: args.get_one::<PathBuf>("gsc-exports").map(|p| expand_path(p)),
        discover_links: !args.get_flag("no-discover"),
        workers: args.get_one::<usize>("threads").copied(),
        show_progress_bars: !quiet,
    };

    if !quiet {
        println!("\n🔀 Auditing {}", config.site.base_url.bright_white());
        println!("Max hops: {}", config.tracer.max_hops);
        println!(
            "Link discovery: {}\n",
            if options.discover_links {
                "on (same site only)"
            } else {
                "off (seed list only)"
            }
        );
    }

    let output_data = execute_crawl(&config, options, print_progress(quiet))
        .await
        .context("Crawl failed")?;
    println!(
        "\n{} Crawl complete! {} URLs traced",
        "✓".green().bold(),
        output_data.results.len()
    );

    let report = AuditReport::build(&output_data.results, &output_data.sitemap_urls, &config);
    finish_audit(&report, &output, quiet)
}

pub fn handle_build(args: &ArgMatches) -> Result<()> {
    let quiet = args.get_flag("quiet");
    let config = load_config(args.get_one::<PathBuf>("config").context("--config is required")?)?;
    let input = args
        .get_one::<PathBuf>("input")
        .map(|p| expand_path(p))
        .context("--input is required")?;
    let output = args
        .get_one::<PathBuf>("output")
        .map(|p| expand_path(p))
        .context("--output is required")?;

    let results = load_traces(&input)?;
    let sitemap_urls = match args.get_one::<PathBuf>("sitemap") {
        Some(path) => load_sitemap_urls(&expand_path(path))?,
        None => Vec::new(),
    };
    if results.is_empty() {
        bail!("{} contains no traces", input.display());
    }

    if !quiet {
        println!(
            "{} Loaded {} traces from {}",
            "✓".green().bold(),
            results.len(),
            input.display()
        );
    }

    let report = AuditReport::build(&results, &sitemap_urls, &config);
    finish_audit(&report, &output, quiet)
}

// ============================================================================
// trace
// ============================================================================

pub async fn handle_trace(args: &ArgMatches) -> Result<()> {
    let url = args.get_one::<Url>("URL").context("URL is required")?;
    let max_hops = *args.get_one::<usize>("max-hops").unwrap_or(&10);
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&15);

    let tracer = RedirectTracer::new(TracerOptions {
        max_hops,
        timeout: Duration::from_secs(timeout),
        ..Default::default()
    })?;

    let result = tracer.trace(url.as_str()).await;
    print!("{}", generate_trace_report(&result));
    Ok(())
}

// ============================================================================
// verify
// ============================================================================

fn verdict_glyph(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::Pass => "✓".green().bold(),
        Verdict::Warn => "⚠".yellow().bold(),
        Verdict::Fail => "✗".red().bold(),
    }
}

pub fn print_checks(checks: &[PageCheck]) {
    for check in checks {
        println!(
            "  {} {:<40} {}",
            verdict_glyph(check.verdict),
            check.name,
            check.result
        );
    }
}

/// Returns `false` when any page failed.
pub async fn handle_verify(args: &ArgMatches) -> Result<bool> {
    let quiet = args.get_flag("quiet");
    let config = load_config(args.get_one::<PathBuf>("config").context("--config is required")?)?;
    let output = args
        .get_one::<PathBuf>("output")
        .map(|p| expand_path(p))
        .context("--output is required")?;

    if !quiet {
        print_divider();
        println!("{}", "  POST-FIX VERIFICATION".bright_white().bold());
        print_divider();
        println!();
    }

    let checks = execute_verify(&config).await?;
    print_checks(&checks);

    let summary = VerifySummary::from_checks(&checks);
    println!();
    println!(
        "{} {}  {} {}  {} {}  (of {})",
        "PASS".green().bold(),
        summary.pass,
        "WARN".yellow().bold(),
        summary.warn,
        "FAIL".red().bold(),
        summary.fail,
        summary.total
    );

    let path = write_verification(&checks, &output)?;
    if !quiet {
        println!("\n{} Results saved to {}", "✓".green().bold(), path.display());
    }

    Ok(!summary.has_failures())
}
