//! `monoshim` redirects filesystem paths from a read-only tree to a writable overlay tree.
//!
//! # Overview
//!
//! A process that believes it owns a directory tree can be run against a read-only copy of that
//! tree plus an empty writable tree. Every path the process hands to the C library is rewritten:
//!
//! - paths that name something which exists on the read-only side keep reading it from there
//! - everything else lands on the writable side
//!
//! The rewriting lives in this crate. The `monoshim-preload` crate builds it into a shared object
//! that is injected with `LD_PRELOAD`, and the `monoshim` binary launches programs with that object
//! and the root pair configured.
//!
//! # Pipeline
//!
//! Each path argument goes through the same steps:
//!
//! 1. [`CanonicalPath`] makes it absolute and lexically normalized.
//! 2. [`redirect()`] matches it against the [`RootConfig`] and picks a [`Side`] with one existence
//!    probe.
//! 3. For creating calls, [`ensure_parents`] creates the missing writable ancestors.
//! 4. The [`Interceptor`] calls the original implementation with the physical path and hands back
//!    its result and errno untouched.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use monoshim::{DirectFs, RootConfig, Shim};
//!
//! fn main() -> anyhow::Result<()> {
//!     let shim = Shim::new(RootConfig::new("/srv/base", "/srv/overlay")?, DirectFs);
//!     let redirection = shim.resolve("open", c"/srv/base/etc/app.conf", false)?;
//!     println!("{redirection}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod canonical;
mod config;
mod creation;
mod dispatch;
mod error;
mod fs;
mod launch;
mod log;
mod materialize;
mod redirect;
mod shim;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod defaults;

pub use canonical::*;
pub use config::*;
pub use creation::*;
pub use dispatch::*;
pub use error::*;
pub use fs::*;
pub use launch::*;
pub use log::*;
pub use materialize::*;
pub use redirect::*;
pub use shim::*;
