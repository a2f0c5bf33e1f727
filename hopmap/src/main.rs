use colored::Colorize;
use hopmap::command_argument_builder;
use hopmap::handlers::{
    handle_build, handle_crawl, handle_init, handle_trace, handle_verify, init_logging,
};
use hopmap_core::print_banner;

fn fail(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "✗".red().bold(), err);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_logging(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let outcome = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => return,
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("build", primary_command)) => handle_build(primary_command),
        Some(("trace", primary_command)) => handle_trace(primary_command).await,
        Some(("verify", primary_command)) => match handle_verify(primary_command).await {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(1),
            Err(e) => Err(e),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        fail(e);
    }
}
