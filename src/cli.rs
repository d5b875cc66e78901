use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smmdb")]
#[command(author, version, about = "Super Mario Maker course database server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Decode a course file, archive or Wii U course folder and describe it
    Inspect {
        #[arg(required = true)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a course into another format
    Convert {
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (or directory for `wiiu`)
        #[arg(required = true)]
        output: PathBuf,

        /// Target format
        #[arg(long, value_enum, default_value_t = Format::Wiiu)]
        to: Format,

        /// Which course to take when the input holds several
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Create an account and print its API key
    CreateAccount {
        username: String,

        /// Grant administrator permissions
        #[arg(long)]
        admin: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Wii U save folder (course_data.cdt, thumbnails)
    Wiiu,
    /// 3DS course file
    #[value(name = "3ds")]
    N3ds,
    /// Decoded course as JSON
    Json,
    /// Canonical course buffer
    Raw,
}
