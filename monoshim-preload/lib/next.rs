use std::{
    ffi::{c_char, c_int, c_void, CStr},
    io,
    ptr::NonNull,
};

use monoshim::{Original, RawFs, ShimResult, SymbolLookup};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static ACCESS: Original<unsafe extern "C" fn(*const c_char, c_int) -> c_int> =
    unsafe { Original::new(c"access") };

static MKDIR: Original<unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int> =
    unsafe { Original::new(c"mkdir") };

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Finds the next definition of a symbol after this object, i.e. the implementation our exports
/// shadow.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSymbols;

/// A [`RawFs`] over the next `access` and `mkdir`, bypassing this object's own exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextFs;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl SymbolLookup for NextSymbols {
    fn lookup(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: `name` is NUL-terminated and RTLD_NEXT is a valid pseudo-handle.
        NonNull::new(unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) })
    }
}

impl RawFs for NextFs {
    fn exists(&self, path: &CStr) -> ShimResult<bool> {
        let access = ACCESS.get(&NextSymbols)?;
        // SAFETY: `access` matches the C signature and `path` is NUL-terminated.
        Ok(unsafe { access(path.as_ptr(), libc::F_OK) } == 0)
    }

    fn mkdir(&self, path: &CStr, mode: u32) -> ShimResult<()> {
        let mkdir = MKDIR.get(&NextSymbols)?;
        // SAFETY: `mkdir` matches the C signature and `path` is NUL-terminated.
        if unsafe { mkdir(path.as_ptr(), mode as libc::mode_t) } != 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(())
    }
}
