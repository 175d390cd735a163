//! Root CLI structure for particle-rs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::compile::CompileArgs;
use crate::commands::generate::GenerateArgs;

#[derive(Parser)]
#[command(name = "particle-rs")]
#[command(about = "Compile particle animation sets to shader code and vertex data", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate vertex, UV and fragment code for an animation set
    Compile(CompileArgs),

    /// Generate the interleaved per-particle vertex data
    Generate(GenerateArgs),

    /// Show node order and record layout of an animation set
    Info {
        /// Path to the animation set description (JSON)
        config: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
