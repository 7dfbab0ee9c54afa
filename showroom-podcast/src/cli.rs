//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

/// Exit code reported when the operator interrupts the process.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Monitors SHOWROOM rooms and archives every broadcast.
#[derive(Debug, Parser)]
#[command(name = "showroom-podcast", version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short = 'f', long = "file", value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub file: PathBuf,
}
