//! Command-line surface for `oas_publisher`.
use std::path::PathBuf;

use clap::Parser;

use crate::settings::SETTINGS_FILENAME;

#[derive(Parser, Debug)]
#[command(
    name = "oas_publisher",
    version,
    about = "Render OpenAPI documents to HTML and publish them",
    long_about = "Reads one invocation event as JSON on stdin and writes the \
                  {status_code, body, headers} response as JSON on stdout."
)]
pub struct Cli {
    /// Settings file; missing means defaults
    #[arg(value_name = "SETTINGS", default_value = SETTINGS_FILENAME)]
    pub settings: PathBuf,

    /// Write a default settings file and exit
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = SETTINGS_FILENAME,
        conflicts_with = "settings"
    )]
    pub init_settings: Option<PathBuf>,
}
