//! `monoshim-preload` is the shared object that applies monoshim path redirection to a process.
//!
//! # Overview
//!
//! Loaded with `LD_PRELOAD`, the object exports C library entry points such as `open`, `stat`
//! and `rename` under their usual names, so the dynamic linker binds the program's calls to
//! them. Each export resolves its path arguments through a process-wide [`Shim`] and then calls
//! the next implementation of the same symbol in lookup order, normally the C library's own.
//!
//! The root pair is read from `MONOSHIM_ROOTS` on the first intercepted call. Without it the
//! object passes every call through untouched. Diagnostics go to stderr, filtered by
//! `MONOSHIM_LOG`.
//!
//! # Usage
//!
//! ```bash
//! MONOSHIM_ROOTS=/srv/base:/srv/overlay \
//! LD_PRELOAD=/path/to/libmonoshim_preload.so \
//!     sh -c 'echo hello > /srv/base/greeting'
//! ```
//!
//! The `monoshim run` launcher sets both variables.
//!
//! # Recursion
//!
//! Code in this object must never call a C library function it also exports: the call would
//! bind to the export and be redirected again. Probes and implicit directory creation go
//! through [`NextFs`], which calls the next `access` and `mkdir` directly.

mod interpose;
mod next;

use std::sync::OnceLock;

use monoshim::{defaults::LOG_ENV_VAR, Interceptor, Shim};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use interpose::*;
pub use next::*;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The redirection context of the process, set up by the first intercepted call.
static SHIM: OnceLock<Shim<NextFs>> = OnceLock::new();

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the interceptor shared by every export.
fn interceptor() -> Interceptor<'static, NextFs, NextSymbols> {
    let shim = SHIM.get_or_init(|| {
        monoshim::init_tracing(LOG_ENV_VAR);
        let shim = Shim::from_env(NextFs);
        tracing::trace!(
            pid = std::process::id(),
            pass_through = shim.is_pass_through(),
            "preload initialized"
        );
        shim
    });

    Interceptor::new(shim, &NextSymbols)
}
