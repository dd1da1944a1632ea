pub mod archive;
pub mod doctor;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guestbox")]
#[command(version)]
#[command(about = "Event guest media uploads and archives", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "guestbox.toml", env = "GUESTBOX_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations
    Migrate,
    /// Build an event or album archive and write it to disk
    Archive {
        #[arg(long)]
        event: i64,
        #[arg(long)]
        album: Option<i64>,
        /// Output directory, or a path ending in `.zip`
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Record the build against the event's download state
        #[arg(long)]
        record: bool,
    },
    /// Check configuration, database, upload directory and video encoder
    Doctor,
}
