use std::ffi::CStr;

use crate::{
    materialize, redirect, CanonicalPath, RawFs, Redirection, RootConfig, ShimError, ShimResult,
    Side,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The redirection context of a process: the configured roots and the raw filesystem binding.
///
/// A shim without roots is in pass-through mode and leaves every path untouched.
#[derive(Debug)]
pub struct Shim<F> {
    /// The configured root pair, or `None` in pass-through mode.
    roots: Option<RootConfig>,

    /// The raw binding used for probes and implicit directory creation.
    fs: F,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<F: RawFs> Shim<F> {
    /// Creates a shim redirecting between `roots`.
    pub fn new(roots: RootConfig, fs: F) -> Self {
        Self {
            roots: Some(roots),
            fs,
        }
    }

    /// Creates a shim that never redirects anything.
    pub fn pass_through(fs: F) -> Self {
        Self { roots: None, fs }
    }

    /// Creates a shim from the `MONOSHIM_ROOTS` environment variable.
    ///
    /// A missing or malformed variable is reported once and yields a pass-through shim, so the
    /// process can still perform unredirected filesystem operations.
    pub fn from_env(fs: F) -> Self {
        match RootConfig::from_env() {
            Ok(roots) => {
                tracing::debug!(%roots, "redirecting");
                Self::new(roots, fs)
            }
            Err(ShimError::MissingRoots) => {
                tracing::info!("no roots configured, passing through");
                Self::pass_through(fs)
            }
            Err(e) => {
                tracing::warn!("{e}, passing through");
                Self::pass_through(fs)
            }
        }
    }

    /// Returns the configured roots, if any.
    pub fn roots(&self) -> Option<&RootConfig> {
        self.roots.as_ref()
    }

    /// Returns the raw filesystem binding.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Returns whether the shim is in pass-through mode.
    pub fn is_pass_through(&self) -> bool {
        self.roots.is_none()
    }

    /// Resolves one path argument of the intercepted operation `op`.
    ///
    /// Empty paths are left alone so that the original call reports its usual error. When
    /// `materialize` is set and the path resolves into the writable tree, the missing parent
    /// directories of the target are created first.
    pub fn resolve(&self, op: &str, path: &CStr, materialize: bool) -> ShimResult<Redirection> {
        let Some(roots) = &self.roots else {
            return Ok(Redirection::Unchanged);
        };

        if path.is_empty() {
            return Ok(Redirection::Unchanged);
        }

        let canonical = CanonicalPath::new(path.to_bytes())?;
        let redirection = redirect::redirect(&canonical, roots, &self.fs)?;

        match &redirection {
            Redirection::Unchanged => {
                tracing::trace!(op, path = %path.to_string_lossy(), "[unmodified]");
            }
            Redirection::Resolved(target) => {
                if materialize && target.side() == Side::Writable {
                    materialize::ensure_parents(
                        &self.fs,
                        target.path().to_bytes(),
                        roots.writable_bytes(),
                    );
                }

                tracing::debug!(
                    op,
                    "{} => {} => {}",
                    path.to_string_lossy(),
                    canonical,
                    redirection
                );
            }
        }

        Ok(redirection)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
