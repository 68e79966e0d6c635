//! Command-line argument definitions for the MicroSynth CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. A subcommand selects what to do with a diagram; the
//! global flags select the configuration file and logging verbosity.

use clap::{Parser, Subcommand};

/// Command-line arguments for the MicroSynth diagram tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

/// What to do with a diagram
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a diagram snapshot and report on it
    Check {
        /// Path to the input snapshot (JSON)
        input: String,
    },

    /// Auto-arrange a diagram snapshot
    Arrange {
        /// Path to the input snapshot (JSON)
        input: String,

        /// Path to the arranged snapshot
        #[arg(short, long, default_value = "arranged.json")]
        output: String,
    },

    /// Generate a random service architecture
    Generate {
        /// Number of services
        #[arg(long)]
        nodes: usize,

        /// Number of services that receive no calls
        #[arg(long, default_value_t = 1)]
        roots: usize,

        /// Fraction of possible calls to create, between 0 and 1
        #[arg(long, default_value_t = 0.5)]
        density: f64,

        /// Implementation language to pick from; repeat for several
        #[arg(long = "language")]
        languages: Vec<String>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Make the weights of calls leaving each service sum to 1
        #[arg(long)]
        normalize: bool,

        /// Path to the generated snapshot
        #[arg(short, long, default_value = "generated.json")]
        output: String,
    },
}
