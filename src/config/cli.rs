use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the livetable binary.
#[derive(Debug, Parser)]
#[command(
    name = "livetable",
    version,
    about = "Live view cache reconciliation for back-office collections"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LIVETABLE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Replay a fixture of views and push messages through a fresh cache.
    Replay(ReplayArgs),
    /// Print the searchable fields and filters of one or all resources.
    Schema(SchemaArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ReplayArgs {
    /// JSON fixture with `resource`, `records`, `views` and `messages`.
    #[arg(value_name = "FIXTURE", value_hint = ValueHint::FilePath)]
    pub fixture: PathBuf,

    /// Pretty-print the JSON report.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub pretty: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SchemaArgs {
    /// Resource name, e.g. `users` or `contact_requests`; all when omitted.
    #[arg(value_name = "RESOURCE")]
    pub resource: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the debounce window in milliseconds.
    #[arg(long = "debounce-ms", value_name = "MILLIS", global = true)]
    pub debounce_ms: Option<u64>,

    /// Override the maximum number of cached views.
    #[arg(long = "max-views", value_name = "COUNT", global = true)]
    pub max_views: Option<u64>,
}
