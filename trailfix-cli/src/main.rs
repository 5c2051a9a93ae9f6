//! Trailfix CLI - Command-line interface
//!
//! Replays recorded GPS feeds through the tracking engine and manages
//! the configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;

#[derive(Parser)]
#[command(name = "trailfix")]
#[command(version = trailfix::VERSION)]
#[command(about = "Live hiking position tracking from a BLE GPS or phone location", long_about = None)]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tracking session against recorded fixes
    Replay {
        /// File of BLE notification frames, one '<lat>,<lon>' per line
        #[arg(long)]
        frames: PathBuf,

        /// File of phone GPS fixes fed before the peripheral connects
        #[arg(long)]
        phone: Option<PathBuf>,

        /// Enable camera follow mode
        #[arg(long)]
        follow: bool,

        /// Make the peripheral refuse the connection
        #[arg(long)]
        fail_connect: bool,

        /// Peripheral to connect to, by address or name
        #[arg(long)]
        pick: Option<String>,

        /// Write the recorded path as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// Haversine distance in meters between two coordinates
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    },

    /// Manage ~/.trailfix/config.ini
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            frames,
            phone,
            follow,
            fail_connect,
            pick,
            geojson,
        } => commands::replay::run(ReplayArgs {
            frames,
            phone,
            follow,
            fail_connect,
            pick,
            geojson,
            verbose: cli.verbose,
        }),
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => commands::distance::run(lat1, lon1, lat2, lon2),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
