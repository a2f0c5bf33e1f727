use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_OUTPUT_DIR: &str = "./redirect_audit";

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(true)
        .help("Path to the hopmap.toml site configuration")
        .value_parser(clap::value_parser!(PathBuf))
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <DIR>)
        .required(false)
        .help("Directory the audit artifacts are written to")
        .value_parser(clap::value_parser!(PathBuf))
        .default_value(DEFAULT_OUTPUT_DIR)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("hopmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("hopmap")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Show debug logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes an example hopmap.toml to get started")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration file")
                        .default_value("./hopmap.toml"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration file without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Trace every seed URL and write the full audit")
                .arg(config_arg())
                .arg(output_arg())
                .arg(
                    arg!(--"seeds-file" <PATH>)
                        .required(false)
                        .help("Extra newline-delimited URLs or site-relative paths to trace")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"gsc-exports" <DIR>)
                        .required(false)
                        .help("Directory of search console Coverage-Drilldown exports")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"no-discover")
                        .required(false)
                        .help("Only trace the seed list; do not follow internal links")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent traces when link discovery is off")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            command!("build")
                .about("Rebuild the audit artifacts from a saved crawl")
                .arg(config_arg())
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("A crawl_results_raw.json from a previous crawl")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"sitemap" <PATH>)
                        .required(false)
                        .help("A sitemap_urls.json from the same crawl")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("trace")
                .about("Trace a single URL hop by hop")
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("The URL to trace")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"max-hops" <N>)
                        .required(false)
                        .help("Give up after this many redirects")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("15"),
                ),
        )
        .subcommand(
            command!("verify")
                .about("Re-check the configured page list after fixes are deployed")
                .arg(config_arg())
                .arg(output_arg()),
        )
}
