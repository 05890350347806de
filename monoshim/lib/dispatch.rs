//! The generic interception contract.
//!
//! Every intercepted operation follows the same steps: look up the original implementation,
//! resolve each path argument through the [`Shim`], call the original with the resolved paths,
//! release the temporary buffers and hand back the original's result and errno untouched. The
//! [`Interceptor`] implements those steps once; an intercepted operation only supplies its
//! [`Original`] symbol and a closure forwarding the remaining arguments.

use std::{
    ffi::{c_char, c_void, CStr},
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
    sync::OnceLock,
};

use crate::{defaults::TEMPLATE_PLACEHOLDER_LEN, RawFs, Redirection, Shim, ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Locates the original, non-intercepted implementation of a symbol.
pub trait SymbolLookup {
    /// Returns the address of `name`, or `None` if it cannot be found.
    fn lookup(&self, name: &CStr) -> Option<NonNull<c_void>>;
}

/// The value an intercepted operation returns when it fails.
pub trait ErrorReturn {
    /// Returns the generic failure value.
    fn error_return() -> Self;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A lazily resolved, memoized original implementation of an intercepted symbol.
///
/// `F` is the function pointer type of the symbol. Once found, the address is cached for the
/// life of the process. A failed lookup is not cached, so a library loaded later can still
/// provide the symbol.
pub struct Original<F> {
    /// The symbol name.
    name: &'static CStr,

    /// The resolved address.
    addr: OnceLock<usize>,

    _marker: PhantomData<F>,
}

/// One resolved path argument.
///
/// Holds the physical path buffer for as long as the original call needs it. Dropping it
/// releases the buffer; an unchanged argument owns nothing.
#[derive(Debug)]
pub struct PathArg {
    /// The pointer the caller passed in.
    original: *const c_char,

    /// How the argument was redirected.
    redirection: Redirection,
}

/// Applies the interception contract using a [`Shim`] and a [`SymbolLookup`].
#[derive(Debug)]
pub struct Interceptor<'a, F, L> {
    shim: &'a Shim<F>,
    lookup: &'a L,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<F: Copy> Original<F> {
    /// Declares the original implementation of `name`.
    ///
    /// ## Safety
    ///
    /// `F` must be an `extern "C"` function pointer type matching the C signature of `name`.
    pub const unsafe fn new(name: &'static CStr) -> Self {
        assert!(mem::size_of::<F>() == mem::size_of::<usize>());
        Self {
            name,
            addr: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the symbol name.
    pub fn name(&self) -> &'static CStr {
        self.name
    }

    /// Returns the original implementation, looking it up on first use.
    pub fn get(&self, lookup: &impl SymbolLookup) -> ShimResult<F> {
        let addr = match self.addr.get() {
            Some(&addr) => addr,
            None => {
                let found = lookup.lookup(self.name).ok_or_else(|| {
                    ShimError::SymbolNotFound(self.name.to_string_lossy().into_owned())
                })?;
                *self.addr.get_or_init(|| found.as_ptr() as usize)
            }
        };

        // SAFETY: `new` requires `F` to be a function pointer type of the same size as `usize`
        // whose signature matches the symbol found at `addr`.
        Ok(unsafe { mem::transmute_copy::<usize, F>(&addr) })
    }
}

impl PathArg {
    /// Resolves `path` through `shim`. A null pointer is passed through untouched.
    ///
    /// ## Safety
    ///
    /// `path` must be null or point to a NUL-terminated string.
    pub unsafe fn resolve<F: RawFs>(
        shim: &Shim<F>,
        op: &str,
        path: *const c_char,
        materialize: bool,
    ) -> ShimResult<Self> {
        let redirection = if path.is_null() {
            Redirection::Unchanged
        } else {
            shim.resolve(op, CStr::from_ptr(path), materialize)?
        };

        Ok(Self {
            original: path,
            redirection,
        })
    }

    /// Returns the pointer to hand to the original implementation.
    pub fn as_ptr(&self) -> *const c_char {
        match &self.redirection {
            Redirection::Unchanged => self.original,
            Redirection::Resolved(target) => target.path().as_ptr(),
        }
    }

    /// Returns how the argument was redirected.
    pub fn redirection(&self) -> &Redirection {
        &self.redirection
    }
}

impl<'a, F: RawFs, L: SymbolLookup> Interceptor<'a, F, L> {
    /// Creates an interceptor.
    pub fn new(shim: &'a Shim<F>, lookup: &'a L) -> Self {
        Self { shim, lookup }
    }

    /// Intercepts an operation taking one path argument.
    ///
    /// `invoke` receives the original implementation and the resolved path, and forwards the
    /// remaining arguments unchanged.
    ///
    /// ## Safety
    ///
    /// `path` must be null or point to a NUL-terminated string, and `invoke` must uphold the
    /// safety contract of the original implementation.
    pub unsafe fn call1<S: Copy, T: ErrorReturn>(
        &self,
        original: &Original<S>,
        path: *const c_char,
        materialize: bool,
        invoke: impl FnOnce(S, *const c_char) -> T,
    ) -> T {
        let result = (|| -> ShimResult<T> {
            let func = original.get(self.lookup)?;
            let arg = PathArg::resolve(self.shim, op_name(original), path, materialize)?;
            let resolved = arg.as_ptr();
            Ok(preserve_errno(|| invoke(func, resolved), arg))
        })();

        result.unwrap_or_else(|e| fail(original, e))
    }

    /// Intercepts an operation taking two path arguments.
    ///
    /// Both paths are resolved independently. If resolving the second fails, the first is
    /// released before the failure is reported.
    ///
    /// ## Safety
    ///
    /// Both paths must be null or point to NUL-terminated strings, and `invoke` must uphold the
    /// safety contract of the original implementation.
    pub unsafe fn call2<S: Copy, T: ErrorReturn>(
        &self,
        original: &Original<S>,
        (path1, materialize1): (*const c_char, bool),
        (path2, materialize2): (*const c_char, bool),
        invoke: impl FnOnce(S, *const c_char, *const c_char) -> T,
    ) -> T {
        let result = (|| -> ShimResult<T> {
            let func = original.get(self.lookup)?;
            let op = op_name(original);
            let arg1 = PathArg::resolve(self.shim, op, path1, materialize1)?;
            let arg2 = PathArg::resolve(self.shim, op, path2, materialize2)?;
            let (resolved1, resolved2) = (arg1.as_ptr(), arg2.as_ptr());
            Ok(preserve_errno(
                || invoke(func, resolved1, resolved2),
                (arg1, arg2),
            ))
        })();

        result.unwrap_or_else(|e| fail(original, e))
    }

    /// Intercepts a mkstemp-family operation, which fills in the template it is given.
    ///
    /// The template is always materialized. When it was redirected, the generated tail
    /// (the placeholder plus `suffix_len` bytes) is copied back into the caller's template so the
    /// caller learns the name that was created. If the original emptied the template to signal
    /// failure, the caller's template is emptied too.
    ///
    /// ## Safety
    ///
    /// `template` must be null or point to a writable NUL-terminated string, and `invoke` must
    /// uphold the safety contract of the original implementation.
    pub unsafe fn call_template<S: Copy, T: ErrorReturn>(
        &self,
        original: &Original<S>,
        template: *mut c_char,
        suffix_len: usize,
        invoke: impl FnOnce(S, *mut c_char) -> T,
    ) -> T {
        let result = (|| -> ShimResult<T> {
            let func = original.get(self.lookup)?;
            let arg = PathArg::resolve(self.shim, op_name(original), template, true)?;

            let Redirection::Resolved(target) = arg.redirection else {
                return Ok(invoke(func, template));
            };

            let mut buffer = target.into_path().into_bytes_with_nul();
            let ret = invoke(func, buffer.as_mut_ptr().cast());
            let saved = errno();
            copy_template_back(&buffer, template, suffix_len);
            drop(buffer);
            set_errno(saved);
            Ok(ret)
        })();

        result.unwrap_or_else(|e| fail(original, e))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn op_name<S>(original: &Original<S>) -> &str {
    original.name.to_str().unwrap_or("?")
}

/// Runs the original call, then releases `buffers` without disturbing the errno it left.
fn preserve_errno<T, B>(call: impl FnOnce() -> T, buffers: B) -> T {
    let ret = call();
    let saved = errno();
    drop(buffers);
    set_errno(saved);
    ret
}

fn fail<S, T: ErrorReturn>(original: &Original<S>, error: ShimError) -> T {
    let code = error.errno();
    match error {
        ShimError::SymbolNotFound(_) => tracing::debug!(op = op_name(original), "{error}"),
        _ => tracing::warn!(op = op_name(original), "{error}"),
    }
    set_errno(code);
    T::error_return()
}

/// Copies the generated tail of the redirected template in `buffer` back into `template`.
///
/// ## Safety
///
/// `template` must point to a writable NUL-terminated string.
unsafe fn copy_template_back(buffer: &[u8], template: *mut c_char, suffix_len: usize) {
    let resolved = match buffer.split_last() {
        Some((&0, bytes)) => bytes,
        _ => buffer,
    };

    if resolved.first().map_or(true, |&b| b == 0) {
        *template = 0;
        return;
    }

    let tail = TEMPLATE_PLACEHOLDER_LEN + suffix_len;
    let template_len = CStr::from_ptr(template).to_bytes().len();
    if resolved.len() < tail || template_len < tail {
        return;
    }

    ptr::copy_nonoverlapping(
        resolved[resolved.len() - tail..].as_ptr().cast::<c_char>(),
        template.add(template_len - tail),
        tail,
    );
}

/// Returns the calling thread's errno.
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Sets the calling thread's errno.
pub fn set_errno(code: i32) {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            // SAFETY: errno is a valid thread-local int.
            unsafe { *libc::__errno_location() = code };
        } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
            // SAFETY: errno is a valid thread-local int.
            unsafe { *libc::__error() = code };
        } else {
            compile_error!("unsupported platform");
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl ErrorReturn for i32 {
    fn error_return() -> Self {
        -1
    }
}

impl ErrorReturn for isize {
    fn error_return() -> Self {
        -1
    }
}

impl<T> ErrorReturn for *mut T {
    fn error_return() -> Self {
        ptr::null_mut()
    }
}

impl<F> std::fmt::Debug for Original<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Original")
            .field("name", &self.name)
            .field("addr", &self.addr.get())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        ffi::{c_int, CString},
        fs,
    };

    use tempfile::tempdir;

    use crate::{DirectFs, RootConfig};

    use super::*;

    type PathFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
    type TwoPathFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
    type TemplateFn = unsafe extern "C" fn(*mut c_char) -> c_int;

    thread_local! {
        static SEEN: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(path: *const c_char) {
        let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
        SEEN.with(|seen| seen.borrow_mut().push(path));
    }

    fn take_seen() -> Vec<String> {
        SEEN.with(|seen| seen.take())
    }

    unsafe extern "C" fn fake_access(path: *const c_char, mode: c_int) -> c_int {
        record(path);
        set_errno(libc::EACCES);
        mode
    }

    unsafe extern "C" fn fake_rename(from: *const c_char, to: *const c_char) -> c_int {
        record(from);
        record(to);
        0
    }

    unsafe extern "C" fn fake_mkstemp(template: *mut c_char) -> c_int {
        let len = CStr::from_ptr(template).to_bytes().len();
        let generated = b"abc123";
        ptr::copy_nonoverlapping(
            generated.as_ptr().cast::<c_char>(),
            template.add(len - generated.len()),
            generated.len(),
        );
        record(template);
        42
    }

    unsafe extern "C" fn fake_mkstemp_failing(template: *mut c_char) -> c_int {
        *template = 0;
        -1
    }

    struct FakeLookup;

    impl SymbolLookup for FakeLookup {
        fn lookup(&self, name: &CStr) -> Option<NonNull<c_void>> {
            let addr = match name.to_bytes() {
                b"access" => fake_access as PathFn as *const (),
                b"rename" => fake_rename as TwoPathFn as *const (),
                b"mkstemp" => fake_mkstemp as TemplateFn as *const (),
                b"mkstemp_failing" => fake_mkstemp_failing as TemplateFn as *const (),
                _ => return None,
            };
            NonNull::new(addr as *mut c_void)
        }
    }

    struct Fixture {
        _temp_dir: tempfile::TempDir,
        ro: std::path::PathBuf,
        rw: std::path::PathBuf,
        shim: Shim<DirectFs>,
    }

    fn fixture() -> Fixture {
        let temp_dir = tempdir().unwrap();
        let ro = temp_dir.path().join("ro");
        let rw = temp_dir.path().join("rw");
        fs::create_dir_all(ro.join("a/b")).unwrap();
        fs::write(ro.join("a/b/file"), b"pristine").unwrap();
        fs::create_dir(&rw).unwrap();
        let shim = Shim::new(RootConfig::new(&ro, &rw).unwrap(), DirectFs);
        Fixture {
            _temp_dir: temp_dir,
            ro,
            rw,
            shim,
        }
    }

    fn c(path: &std::path::Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_original_memoizes_address() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"access") };
        assert!(ORIGINAL.addr.get().is_none());
        ORIGINAL.get(&FakeLookup).unwrap();
        assert_eq!(
            ORIGINAL.addr.get().copied(),
            Some(fake_access as PathFn as usize)
        );
    }

    #[test]
    fn test_original_missing_symbol() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"nonexistent") };
        assert!(matches!(
            ORIGINAL.get(&FakeLookup),
            Err(ShimError::SymbolNotFound(name)) if name == "nonexistent"
        ));
        assert!(ORIGINAL.addr.get().is_none());
    }

    #[test]
    fn test_call1_redirects_and_forwards() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"access") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let logical = c(&fixture.rw.join("a/./b/file"));
        let ret = unsafe { interceptor.call1(&ORIGINAL, logical.as_ptr(), false, |f, p| f(p, 7)) };

        // Return value and errno come back exactly as the original left them
        assert_eq!(ret, 7);
        assert_eq!(errno(), libc::EACCES);
        assert_eq!(
            take_seen(),
            vec![fixture.ro.join("a/b/file").to_str().unwrap().to_string()]
        );
    }

    #[test]
    fn test_call1_outside_roots_passes_pointer_through() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"access") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let path = c"/elsewhere/./file";
        unsafe { interceptor.call1(&ORIGINAL, path.as_ptr(), false, |f, p| {
            assert_eq!(p, path.as_ptr());
            f(p, 0)
        }) };
        assert_eq!(take_seen(), vec!["/elsewhere/./file".to_string()]);
    }

    #[test]
    fn test_call1_pass_through_mode() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"access") };
        let shim = Shim::pass_through(DirectFs);
        let interceptor = Interceptor::new(&shim, &FakeLookup);

        let path = c"/ro/a/b/file";
        unsafe { interceptor.call1(&ORIGINAL, path.as_ptr(), true, |f, p| {
            assert_eq!(p, path.as_ptr());
            f(p, 0)
        }) };
        assert_eq!(take_seen(), vec!["/ro/a/b/file".to_string()]);
    }

    #[test]
    fn test_call1_null_path_passes_through() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"access") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let ret = unsafe {
            interceptor.call1(&ORIGINAL, ptr::null(), false, |_, p| {
                assert!(p.is_null());
                5
            })
        };
        assert_eq!(ret, 5);
    }

    #[test]
    fn test_call1_missing_symbol_fails() {
        static ORIGINAL: Original<PathFn> = unsafe { Original::new(c"nonexistent") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let path = c(&fixture.ro.join("a"));
        let ret: c_int = unsafe {
            interceptor.call1(&ORIGINAL, path.as_ptr(), false, |_, _| {
                unreachable!("the original is unavailable")
            })
        };
        assert_eq!(ret, -1);
        assert_eq!(errno(), libc::ENOSYS);

        let ret: *mut libc::DIR = unsafe {
            interceptor.call1(&ORIGINAL, path.as_ptr(), false, |_, _| {
                unreachable!("the original is unavailable")
            })
        };
        assert!(ret.is_null());
        assert_eq!(errno(), libc::ENOSYS);
    }

    #[test]
    fn test_call2_materializes_second_path_only() {
        static ORIGINAL: Original<TwoPathFn> = unsafe { Original::new(c"rename") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let from = c(&fixture.ro.join("x/missing"));
        let to = c(&fixture.ro.join("a/b/c/d/renamed"));
        let ret = unsafe {
            interceptor.call2(
                &ORIGINAL,
                (from.as_ptr(), false),
                (to.as_ptr(), true),
                |f, p1, p2| f(p1, p2),
            )
        };

        assert_eq!(ret, 0);
        assert_eq!(
            take_seen(),
            vec![
                fixture.rw.join("x/missing").to_str().unwrap().to_string(),
                fixture.rw.join("a/b/c/d/renamed").to_str().unwrap().to_string(),
            ]
        );
        assert!(!fixture.rw.join("x").exists());
        assert!(fixture.rw.join("a/b/c/d").is_dir());
    }

    #[test]
    fn test_call_template_copies_generated_name_back() {
        static ORIGINAL: Original<TemplateFn> = unsafe { Original::new(c"mkstemp") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let logical = fixture.ro.join("a/new/tmpXXXXXX");
        let mut template = c(&logical).into_bytes_with_nul();
        let ret = unsafe {
            interceptor.call_template(&ORIGINAL, template.as_mut_ptr().cast(), 0, |f, p| f(p))
        };

        assert_eq!(ret, 42);
        assert_eq!(
            take_seen(),
            vec![fixture.rw.join("a/new/tmpabc123").to_str().unwrap().to_string()]
        );
        assert!(fixture.rw.join("a/new").is_dir());

        let template = CStr::from_bytes_until_nul(&template).unwrap();
        assert_eq!(
            template.to_str().unwrap(),
            fixture.ro.join("a/new/tmpabc123").to_str().unwrap()
        );
    }

    #[test]
    fn test_call_template_propagates_emptied_template() {
        static ORIGINAL: Original<TemplateFn> = unsafe { Original::new(c"mkstemp_failing") };
        let fixture = fixture();
        let interceptor = Interceptor::new(&fixture.shim, &FakeLookup);

        let mut template = c(&fixture.rw.join("tmpXXXXXX")).into_bytes_with_nul();
        let ret = unsafe {
            interceptor.call_template(&ORIGINAL, template.as_mut_ptr().cast(), 0, |f, p| f(p))
        };

        assert_eq!(ret, -1);
        assert_eq!(template[0], 0);
    }

    #[test]
    fn test_copy_template_back_with_suffix() {
        let mut template = b"/ro/tmpXXXXXX.txt\0".to_vec();
        let buffer = b"/physical/rw/tmpq1w2e3.txt\0";
        unsafe { copy_template_back(buffer, template.as_mut_ptr().cast(), 4) };
        assert_eq!(template, b"/ro/tmpq1w2e3.txt\0");
    }

    #[test]
    fn test_set_errno_roundtrip() {
        set_errno(libc::ENOTDIR);
        assert_eq!(errno(), libc::ENOTDIR);
        set_errno(0);
        assert_eq!(errno(), 0);
    }
}
