//! `monoshim` runs programs with filesystem paths redirected from a read-only tree to a writable
//! overlay tree.
//!
//! ## Usage
//!
//! ### Run a program
//!
//! ```bash
//! monoshim run \
//!     --readonly=/srv/base \
//!     --writable=/srv/overlay \
//!     --log=debug \
//!     -- /bin/sh -c 'echo hello > /srv/base/greeting'
//! ```
//!
//! ### Inspect redirections
//!
//! ```bash
//! MONOSHIM_ROOTS=/srv/base:/srv/overlay monoshim resolve /srv/base/etc/app.conf
//! ```

use std::{ffi::CString, os::unix::ffi::OsStringExt};

use anyhow::Result;
use clap::Parser;
use monoshim::{
    cli::{MonoshimArgs, MonoshimSubcommand},
    defaults::LOG_ENV_VAR,
    init_tracing, locate_preload, CanonicalPath, DirectFs, Launch, Shim,
};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing(LOG_ENV_VAR);

    let args = MonoshimArgs::parse();
    match args.subcommand {
        MonoshimSubcommand::Run {
            roots,
            preload,
            log,
            command,
        } => {
            let roots = roots.into_roots()?;
            let preload = locate_preload(preload)?;
            let Some((program, args)) = command.split_first() else {
                anyhow::bail!("no command given");
            };

            let mut launch = Launch::new(roots, preload, program, args);
            if let Some(filter) = log {
                launch = launch.log_filter(filter);
            }

            Err(launch.exec().into())
        }
        MonoshimSubcommand::Resolve {
            roots,
            create,
            paths,
        } => {
            let shim = Shim::new(roots.into_roots()?, DirectFs);
            for path in paths {
                let path = CString::new(path.into_vec())?;
                let canonical = CanonicalPath::new(path.as_bytes())?;
                let redirection = shim.resolve("resolve", &path, create)?;
                println!("{} => {canonical} => {redirection}", path.to_string_lossy());
            }

            Ok(())
        }
    }
}
