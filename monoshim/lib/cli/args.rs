use std::{ffi::OsString, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{cli::styles, RootConfig, ShimResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// monoshim - Run programs that write into a read-only tree, redirecting writes to an overlay
#[derive(Debug, Parser)]
#[command(name = "monoshim", author, about, version, styles=styles::styles())]
pub struct MonoshimArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: MonoshimSubcommand,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum MonoshimSubcommand {
    /// Run a program with path redirection
    #[command(name = "run")]
    Run {
        /// Root directories
        #[command(flatten)]
        roots: RootArgs,

        /// Path to the preload library
        #[arg(long, value_name = "LIB")]
        preload: Option<PathBuf>,

        /// Diagnostics filter for the program (e.g. `debug`)
        #[arg(long, value_name = "FILTER")]
        log: Option<String>,

        /// The program to run, followed by its arguments
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<OsString>,
    },

    /// Show where paths are redirected to
    #[command(name = "resolve")]
    Resolve {
        /// Root directories, defaulting to `MONOSHIM_ROOTS`
        #[command(flatten)]
        roots: RootArgs,

        /// Create missing writable parent directories, as a creating call would
        #[arg(long)]
        create: bool,

        /// Paths to resolve
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<OsString>,
    },
}

/// The root pair given on the command line.
#[derive(Debug, Args)]
pub struct RootArgs {
    /// The read-only root directory
    #[arg(long, value_name = "DIR", requires = "writable")]
    pub readonly: Option<PathBuf>,

    /// The writable root directory
    #[arg(long, value_name = "DIR", requires = "readonly")]
    pub writable: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RootArgs {
    /// Returns the root pair from the flags, or from `MONOSHIM_ROOTS` if they are absent.
    pub fn into_roots(self) -> ShimResult<RootConfig> {
        match (self.readonly, self.writable) {
            (Some(readonly), Some(writable)) => RootConfig::new(readonly, writable),
            _ => RootConfig::from_env(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
