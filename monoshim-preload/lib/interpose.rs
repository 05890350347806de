//! The exported C library entry points.
//!
//! Every export declares the original it shadows and forwards to one of the [`Interceptor`]
//! wrappers. Arguments other than paths reach the original unchanged.
//!
//! [`Interceptor`]: monoshim::Interceptor

use std::ffi::{c_char, c_int, c_void};

use libc::{gid_t, mode_t, off_t, size_t, ssize_t, timeval, uid_t, utimbuf, DIR, FILE};
use monoshim::{fopen_creates, open_creates, template_suffix_len, Original};

use crate::interceptor;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
type VersionedStatFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat) -> c_int;
type PathFn = unsafe extern "C" fn(*const c_char) -> c_int;
type PathModeFn = unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
type OwnerFn = unsafe extern "C" fn(*const c_char, uid_t, gid_t) -> c_int;
type GetXattrFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *mut c_void, size_t) -> ssize_t;
type SetXattrFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *const c_void, size_t, c_int) -> c_int;
type ListXattrFn = unsafe extern "C" fn(*const c_char, *mut c_char, size_t) -> ssize_t;
type RemoveXattrFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type GetFileconFn = unsafe extern "C" fn(*const c_char, *mut *mut c_char) -> c_int;
type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type TwoPathFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;

//--------------------------------------------------------------------------------------------------
// Functions: Metadata
//--------------------------------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    static ORIGINAL: Original<StatFn> = unsafe { Original::new(c"stat") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, buf))
}

#[no_mangle]
pub unsafe extern "C" fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    static ORIGINAL: Original<StatFn> = unsafe { Original::new(c"lstat") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, buf))
}

/// The `stat` entry point of C libraries that inline `stat` into a versioned call.
#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn __xstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    static ORIGINAL: Original<VersionedStatFn> = unsafe { Original::new(c"__xstat") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(ver, p, buf))
}

/// The `lstat` counterpart of [`__xstat`].
#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn __lxstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    static ORIGINAL: Original<VersionedStatFn> = unsafe { Original::new(c"__lxstat") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(ver, p, buf))
}

#[no_mangle]
pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char, c_int) -> c_int> =
        unsafe { Original::new(c"access") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn readlink(path: *const c_char, buf: *mut c_char, size: size_t) -> ssize_t {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char, *mut c_char, size_t) -> ssize_t> =
        unsafe { Original::new(c"readlink") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, buf, size))
}

//--------------------------------------------------------------------------------------------------
// Functions: Attributes
//--------------------------------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn chmod(path: *const c_char, mode: mode_t) -> c_int {
    static ORIGINAL: Original<PathModeFn> = unsafe { Original::new(c"chmod") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn chown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    static ORIGINAL: Original<OwnerFn> = unsafe { Original::new(c"chown") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, owner, group))
}

#[no_mangle]
pub unsafe extern "C" fn lchown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    static ORIGINAL: Original<OwnerFn> = unsafe { Original::new(c"lchown") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, owner, group))
}

#[no_mangle]
pub unsafe extern "C" fn utime(path: *const c_char, times: *const utimbuf) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char, *const utimbuf) -> c_int> =
        unsafe { Original::new(c"utime") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, times))
}

#[no_mangle]
pub unsafe extern "C" fn utimes(path: *const c_char, times: *const timeval) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char, *const timeval) -> c_int> =
        unsafe { Original::new(c"utimes") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, times))
}

#[no_mangle]
pub unsafe extern "C" fn truncate(path: *const c_char, length: off_t) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char, off_t) -> c_int> =
        unsafe { Original::new(c"truncate") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, length))
}

//--------------------------------------------------------------------------------------------------
// Functions: Extended Attributes
//--------------------------------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn getxattr(
    path: *const c_char,
    name: *const c_char,
    value: *mut c_void,
    size: size_t,
) -> ssize_t {
    static ORIGINAL: Original<GetXattrFn> = unsafe { Original::new(c"getxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name, value, size))
}

#[no_mangle]
pub unsafe extern "C" fn lgetxattr(
    path: *const c_char,
    name: *const c_char,
    value: *mut c_void,
    size: size_t,
) -> ssize_t {
    static ORIGINAL: Original<GetXattrFn> = unsafe { Original::new(c"lgetxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name, value, size))
}

#[no_mangle]
pub unsafe extern "C" fn setxattr(
    path: *const c_char,
    name: *const c_char,
    value: *const c_void,
    size: size_t,
    flags: c_int,
) -> c_int {
    static ORIGINAL: Original<SetXattrFn> = unsafe { Original::new(c"setxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name, value, size, flags))
}

#[no_mangle]
pub unsafe extern "C" fn lsetxattr(
    path: *const c_char,
    name: *const c_char,
    value: *const c_void,
    size: size_t,
    flags: c_int,
) -> c_int {
    static ORIGINAL: Original<SetXattrFn> = unsafe { Original::new(c"lsetxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name, value, size, flags))
}

#[no_mangle]
pub unsafe extern "C" fn listxattr(path: *const c_char, list: *mut c_char, size: size_t) -> ssize_t {
    static ORIGINAL: Original<ListXattrFn> = unsafe { Original::new(c"listxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, list, size))
}

#[no_mangle]
pub unsafe extern "C" fn llistxattr(
    path: *const c_char,
    list: *mut c_char,
    size: size_t,
) -> ssize_t {
    static ORIGINAL: Original<ListXattrFn> = unsafe { Original::new(c"llistxattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, list, size))
}

#[no_mangle]
pub unsafe extern "C" fn removexattr(path: *const c_char, name: *const c_char) -> c_int {
    static ORIGINAL: Original<RemoveXattrFn> = unsafe { Original::new(c"removexattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name))
}

#[no_mangle]
pub unsafe extern "C" fn lremovexattr(path: *const c_char, name: *const c_char) -> c_int {
    static ORIGINAL: Original<RemoveXattrFn> = unsafe { Original::new(c"lremovexattr") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, name))
}

//--------------------------------------------------------------------------------------------------
// Functions: Security Context
//--------------------------------------------------------------------------------------------------

// Provided by libselinux. Without it loaded, the lookup fails and the call reports ENOSYS.

#[no_mangle]
pub unsafe extern "C" fn getfilecon(path: *const c_char, con: *mut *mut c_char) -> c_int {
    static ORIGINAL: Original<GetFileconFn> = unsafe { Original::new(c"getfilecon") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, con))
}

#[no_mangle]
pub unsafe extern "C" fn lgetfilecon(path: *const c_char, con: *mut *mut c_char) -> c_int {
    static ORIGINAL: Original<GetFileconFn> = unsafe { Original::new(c"lgetfilecon") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p, con))
}

//--------------------------------------------------------------------------------------------------
// Functions: Directories & Removal
//--------------------------------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn chdir(path: *const c_char) -> c_int {
    static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"chdir") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p))
}

#[no_mangle]
pub unsafe extern "C" fn opendir(path: *const c_char) -> *mut DIR {
    static ORIGINAL: Original<unsafe extern "C" fn(*const c_char) -> *mut DIR> =
        unsafe { Original::new(c"opendir") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p))
}

#[no_mangle]
pub unsafe extern "C" fn rmdir(path: *const c_char) -> c_int {
    static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"rmdir") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p))
}

#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"unlink") };
    interceptor().call1(&ORIGINAL, path, false, |f, p| f(p))
}

//--------------------------------------------------------------------------------------------------
// Functions: Creation
//--------------------------------------------------------------------------------------------------

/// `open` is variadic in C. The mode is only read by the original when `O_CREAT` or `O_TMPFILE`
/// is set, so forwarding whatever the caller left in its slot is harmless.
#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    static ORIGINAL: Original<OpenFn> = unsafe { Original::new(c"open") };
    interceptor().call1(&ORIGINAL, path, open_creates(flags), |f, p| f(p, flags, mode))
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    static ORIGINAL: Original<OpenFn> = unsafe { Original::new(c"open64") };
    interceptor().call1(&ORIGINAL, path, open_creates(flags), |f, p| f(p, flags, mode))
}

#[no_mangle]
pub unsafe extern "C" fn creat(path: *const c_char, mode: mode_t) -> c_int {
    static ORIGINAL: Original<PathModeFn> = unsafe { Original::new(c"creat") };
    interceptor().call1(&ORIGINAL, path, true, |f, p| f(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn mkdir(path: *const c_char, mode: mode_t) -> c_int {
    static ORIGINAL: Original<PathModeFn> = unsafe { Original::new(c"mkdir") };
    interceptor().call1(&ORIGINAL, path, true, |f, p| f(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn mkstemp(template: *mut c_char) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*mut c_char) -> c_int> =
        unsafe { Original::new(c"mkstemp") };
    interceptor().call_template(&ORIGINAL, template, 0, |f, p| f(p))
}

#[no_mangle]
pub unsafe extern "C" fn mkstemps(template: *mut c_char, suffix_len: c_int) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*mut c_char, c_int) -> c_int> =
        unsafe { Original::new(c"mkstemps") };
    interceptor().call_template(&ORIGINAL, template, template_suffix_len(suffix_len), |f, p| {
        f(p, suffix_len)
    })
}

#[no_mangle]
pub unsafe extern "C" fn mkostemp(template: *mut c_char, flags: c_int) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*mut c_char, c_int) -> c_int> =
        unsafe { Original::new(c"mkostemp") };
    interceptor().call_template(&ORIGINAL, template, 0, |f, p| f(p, flags))
}

#[no_mangle]
pub unsafe extern "C" fn mkostemps(template: *mut c_char, suffix_len: c_int, flags: c_int) -> c_int {
    static ORIGINAL: Original<unsafe extern "C" fn(*mut c_char, c_int, c_int) -> c_int> =
        unsafe { Original::new(c"mkostemps") };
    interceptor().call_template(&ORIGINAL, template, template_suffix_len(suffix_len), |f, p| {
        f(p, suffix_len, flags)
    })
}

/// Always hands back the caller's own template, never the redirected buffer.
#[no_mangle]
pub unsafe extern "C" fn mktemp(template: *mut c_char) -> *mut c_char {
    static ORIGINAL: Original<unsafe extern "C" fn(*mut c_char) -> *mut c_char> =
        unsafe { Original::new(c"mktemp") };
    interceptor().call_template(&ORIGINAL, template, 0, |f, p| {
        f(p);
        template
    })
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    static ORIGINAL: Original<FopenFn> = unsafe { Original::new(c"fopen") };
    interceptor().call1(&ORIGINAL, path, fopen_creates(mode), |f, p| f(p, mode))
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE {
    static ORIGINAL: Original<FopenFn> = unsafe { Original::new(c"fopen64") };
    interceptor().call1(&ORIGINAL, path, fopen_creates(mode), |f, p| f(p, mode))
}

//--------------------------------------------------------------------------------------------------
// Functions: Two Paths
//--------------------------------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn link(from: *const c_char, to: *const c_char) -> c_int {
    static ORIGINAL: Original<TwoPathFn> = unsafe { Original::new(c"link") };
    interceptor().call2(&ORIGINAL, (from, false), (to, true), |f, p1, p2| f(p1, p2))
}

/// Both arguments are redirected, including the link contents.
#[no_mangle]
pub unsafe extern "C" fn symlink(target: *const c_char, link: *const c_char) -> c_int {
    static ORIGINAL: Original<TwoPathFn> = unsafe { Original::new(c"symlink") };
    interceptor().call2(&ORIGINAL, (target, false), (link, true), |f, p1, p2| f(p1, p2))
}

#[no_mangle]
pub unsafe extern "C" fn rename(from: *const c_char, to: *const c_char) -> c_int {
    static ORIGINAL: Original<TwoPathFn> = unsafe { Original::new(c"rename") };
    interceptor().call2(&ORIGINAL, (from, false), (to, true), |f, p1, p2| f(p1, p2))
}
