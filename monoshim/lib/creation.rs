//! Deciding from an intercepted call's arguments whether it creates its path.

use std::ffi::{c_char, c_int};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns whether `open` with `flags` may create its path. Only `O_CREAT` counts.
pub fn open_creates(flags: c_int) -> bool {
    flags & libc::O_CREAT != 0
}

/// Returns whether `fopen` with `mode` creates its path, which is the case for modes starting
/// with `w` or `a`.
///
/// ## Safety
///
/// `mode` must be null or point to a NUL-terminated string.
pub unsafe fn fopen_creates(mode: *const c_char) -> bool {
    !mode.is_null() && matches!(*mode as u8, b'w' | b'a')
}

/// Converts the `suffixlen` argument of `mkstemps`/`mkostemps` into the number of bytes that
/// follow the placeholder. Negative values count as no suffix.
pub fn template_suffix_len(suffix_len: c_int) -> usize {
    usize::try_from(suffix_len).unwrap_or(0)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
