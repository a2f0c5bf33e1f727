pub mod audit;
pub mod classify;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod seeds;
pub mod verify;

pub use classify::{IssueCategory, classify};
pub use config::HopmapConfig;
pub use error::{HopmapError, Result};
pub use report::AuditReport;
pub use rules::{RedirectRule, RuleBuilder, RuleReason, build_rules};

pub fn print_banner() {
    println!(
        r#"
  _
 | |__   ___  _ __  _ __ ___   __ _ _ __
 | '_ \ / _ \| '_ \| '_ ` _ \ / _` | '_ \
 | | | | (_) | |_) | | | | | | (_| | |_) |
 |_| |_|\___/| .__/|_| |_| |_|\__,_| .__/
             |_|                   |_|      v{}
   redirect chain tracing & migration audit
"#,
        env!("CARGO_PKG_VERSION")
    );
}
