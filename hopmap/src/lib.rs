pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, DEFAULT_OUTPUT_DIR, command_argument_builder};
pub use handlers::{expand_path, init_logging, load_config, write_config_template};
