// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MDS - intel delivery engine.
//!
//! This is the binary entry point running the logistics and radio-delivery
//! services.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mds_config::model::MdsConfig;

/// MDS - intel delivery engine.
#[derive(Parser, Debug)]
#[command(name = "mds", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the delivery engine until SIGINT or SIGTERM.
    Serve {
        /// Config file to use instead of the standard lookup.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Manage MDS configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Load and validate the configuration, then exit.
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<MdsConfig, Vec<mds_config::ConfigError>> {
    match path {
        Some(path) => mds_config::load_and_validate_path(path),
        None => mds_config::load_and_validate(),
    }
}

/// Load the configuration or render its diagnostics and exit.
fn load_config_or_exit(path: Option<&Path>) -> MdsConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(errors) => {
            mds_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => {
            let config = load_config_or_exit(config.as_deref());
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config {
            action: ConfigCommands::Check { config },
        }) => {
            let config = load_config_or_exit(config.as_deref());
            println!(
                "mds: config ok (data_dir={}, pickup_timeout_secs={})",
                config.storage.data_dir,
                config.radio.pickup_timeout_secs.unwrap_or_default()
            );
        }
        None => {
            println!("mds: use --help for available commands");
        }
    }
}
