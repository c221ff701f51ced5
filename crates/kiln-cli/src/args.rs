//! CLI arguments for the kiln binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "The kiln compiler and project manager")]
pub struct Cli {
    /// Sets the level of logging verbosity (-v info, -vv debug, -vvv
    /// trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the project file.
    #[arg(long, default_value = "project.yaml", global = true)]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a package and add it to the project.
    Install {
        /// Package URL or local path.
        url: String,

        /// Arguments forwarded to the package's build.
        #[arg(last = true)]
        arguments: Vec<String>,
    },

    /// Remove a package from the lock file.
    Remove {
        /// Package URL as recorded in the lock file.
        url: String,
    },

    /// Delete build outputs and package checkouts.
    Clean,

    /// Build the project, then run its executable output.
    Run,

    /// Build every file of the project.
    Build {
        /// Print the produced IR to stdout.
        #[arg(long = "print-ir")]
        print_ir: bool,
    },

    /// Compile a single source file outside any project.
    Compile {
        /// Source file to compile.
        file: PathBuf,

        /// Output path for the produced IR.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target triple.
        #[arg(long, default_value = "")]
        triple: String,

        /// Print the produced IR to stdout.
        #[arg(long = "print-ir")]
        print_ir: bool,
    },

    /// Print the public surface of a source file.
    Expose {
        /// Source file to inspect.
        file: PathBuf,
    },
}
