//! Filesystem primitives that never go through the interception layer.
//!
//! The redirector probes for the readonly variant of every path, and the materializer creates
//! missing writable directories. Both must reach the real `access` and `mkdir`: calling the
//! intercepted entry points from inside the layer would redirect the probe itself and recurse
//! without bound. Implementations of [`RawFs`] are that raw binding.

use std::ffi::CStr;

use nix::{
    sys::stat::Mode,
    unistd::{self, AccessFlags},
};

use crate::ShimResult;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The raw filesystem capability used for existence probes and implicit directory creation.
pub trait RawFs {
    /// Returns whether `path` exists.
    ///
    /// Any failure of the underlying check counts as "does not exist". An error is returned only
    /// when the check itself is unavailable.
    fn exists(&self, path: &CStr) -> ShimResult<bool>;

    /// Creates the directory `path` with the given mode.
    fn mkdir(&self, path: &CStr, mode: u32) -> ShimResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`RawFs`] that calls libc directly.
///
/// This is only raw when the calling binary is not itself preloaded with the interception layer.
/// The launcher and tests use it; the preload library binds the next `access`/`mkdir` in the
/// lookup order instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFs;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl RawFs for DirectFs {
    fn exists(&self, path: &CStr) -> ShimResult<bool> {
        Ok(unistd::access(path, AccessFlags::F_OK).is_ok())
    }

    fn mkdir(&self, path: &CStr, mode: u32) -> ShimResult<()> {
        let mode = Mode::from_bits_truncate(mode as libc::mode_t);
        unistd::mkdir(path, mode).map_err(std::io::Error::from)?;
        Ok(())
    }
}

impl<T: RawFs + ?Sized> RawFs for &T {
    fn exists(&self, path: &CStr) -> ShimResult<bool> {
        (**self).exists(path)
    }

    fn mkdir(&self, path: &CStr, mode: u32) -> ShimResult<()> {
        (**self).mkdir(path, mode)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{ffi::CString, os::unix::fs::PermissionsExt};

    use tempfile::tempdir;

    use super::*;

    fn c_path(path: &std::path::Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_direct_fs_exists() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data")?;

        assert!(DirectFs.exists(&c_path(temp_dir.path()))?);
        assert!(DirectFs.exists(&c_path(&file))?);
        assert!(!DirectFs.exists(&c_path(&temp_dir.path().join("missing")))?);
        Ok(())
    }

    #[test]
    fn test_direct_fs_mkdir() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let dir = temp_dir.path().join("dir");

        DirectFs.mkdir(&c_path(&dir), 0o750)?;
        assert!(dir.is_dir());

        // The umask may only clear bits
        let mode = std::fs::metadata(&dir)?.permissions().mode() & 0o777;
        assert_eq!(mode & !0o750, 0);

        // Creating it again fails with the OS error
        let err = DirectFs.mkdir(&c_path(&dir), 0o750).unwrap_err();
        assert_eq!(err.errno(), libc::EEXIST);
        Ok(())
    }
}
