// SCR - Live Code Execution Visualizer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! SCR - Live Code Execution Visualizer
//!
//! Instruments scripts and inspects the traces their runs produce.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::Result;
use scr_common::{Position, Range};
use scr_engine::EngineConfig;

mod cmd;

/// Command-line interface for SCR
#[derive(Debug, Parser)]
#[command(name = "scr")]
#[command(about = "Live code execution visualizer - instrument scripts and query their traces")]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, env = "SCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write daily log files under the temp directory
    #[arg(long)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Instrument a script and print the result
    Instrument {
        /// Script to instrument
        file: PathBuf,

        /// Write the location map of the instrumented script as JSON
        #[arg(long)]
        locations: Option<PathBuf>,
    },
    /// Query the trace of a finished run
    Inspect(InspectArgs),
}

/// Queries to run against a recorded run.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Run result as reported by the execution host (JSON)
    pub run: PathBuf,

    /// Innermost expression value at ROW:COLUMN
    #[arg(long)]
    pub position: Option<Position>,

    /// Values touching a one-based line
    #[arg(long)]
    pub line: Option<usize>,

    /// Values within ROW:COLUMN-ROW:COLUMN
    #[arg(long)]
    pub range: Option<Range>,

    /// Hit counts of call sites and function entries
    #[arg(long)]
    pub stack: bool,

    /// Expression values in runtime order
    #[arg(long)]
    pub execution: bool,

    /// Call graph of the run, or of `--range` when given
    #[arg(long)]
    pub graph: bool,

    /// Only keep call graph branches matching this name
    #[arg(long, requires = "graph")]
    pub query: Option<String>,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    scr_common::logging::init_logging("scr", cli.log_file)?;

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading engine configuration from {}", path.display());
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };

    match &cli.command {
        Commands::Instrument { file, locations } => {
            cmd::instrument_file(file, locations.as_deref(), &config)
        }
        Commands::Inspect(args) => cmd::inspect_run(args),
    }
}
