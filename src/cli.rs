use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Input file, as `path` or `path:display_name` (repeatable)
    #[arg(short, long = "input", value_name = "PATH[:NAME]")]
    pub inputs: Vec<String>,

    /// Path to a JSON file holding the previous stage's encoded result
    #[arg(long)]
    pub pipe_result: Option<PathBuf>,

    /// Output directory for search results
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Workflow identifier recorded in the result
    #[arg(long, default_value = "local")]
    pub workflow_id: String,

    /// Regular expression to search for (extended syntax, case-insensitive)
    #[arg(short, long)]
    pub regex: Option<String>,

    /// Mount disk-image inputs and search their partition trees
    #[arg(long)]
    pub mount_disk_images: bool,

    /// Optional path to a task config file (YAML); CLI flags override it
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Seconds between progress polls
    #[arg(long, default_value_t = 3)]
    pub poll_interval_secs: u64,

    /// Abort a single search after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Print the declared task-configuration schema as JSON and exit
    #[arg(long)]
    pub print_metadata: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

/// Split an input argument into path and display name. Without an explicit
/// display name the file name component is used.
pub fn parse_input_arg(arg: &str) -> (String, String) {
    if let Some((path, name)) = arg.rsplit_once(':') {
        if !name.is_empty() && !path.is_empty() {
            return (path.to_string(), name.to_string());
        }
    }
    let display = std::path::Path::new(arg)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg.to_string());
    (arg.to_string(), display)
}
