use std::{
    ffi::{CStr, CString},
    fmt,
};

use crate::{CanonicalPath, RawFs, RootConfig, ShimResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The tree a redirected path was resolved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The path exists in the readonly tree.
    ReadOnly,

    /// The path does not exist in the readonly tree and is served from the writable tree.
    Writable,
}

/// A physical path a logical path was redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The physical path.
    path: CString,

    /// The tree the path lies in.
    side: Side,
}

/// The outcome of redirecting a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    /// The path lies outside both roots and is used exactly as the caller gave it.
    Unchanged,

    /// The path lies under one of the roots and resolves to the given target.
    Resolved(Target),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Target {
    /// Creates a target from its physical path.
    pub fn new(path: CString, side: Side) -> Self {
        Self { path, side }
    }

    /// Returns the physical path.
    pub fn path(&self) -> &CStr {
        &self.path
    }

    /// Returns the tree the path lies in.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Consumes the target, returning the physical path.
    pub fn into_path(self) -> CString {
        self.path
    }
}

impl Redirection {
    /// Returns the target if the path was resolved.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Redirection::Unchanged => None,
            Redirection::Resolved(target) => Some(target),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decides which physical path serves `canonical`.
///
/// Paths under either root are rebuilt on the readonly root if that variant exists, and on the
/// writable root otherwise. The readonly root is matched first. Existence is probed through the
/// raw binding on every call; nothing is cached since the trees may change between calls.
pub fn redirect(
    canonical: &CanonicalPath,
    roots: &RootConfig,
    fs: &impl RawFs,
) -> ShimResult<Redirection> {
    let Some(suffix) = canonical
        .strip_root(roots.readonly_bytes())
        .or_else(|| canonical.strip_root(roots.writable_bytes()))
    else {
        return Ok(Redirection::Unchanged);
    };

    let readonly = join(roots.readonly_bytes(), suffix)?;
    if fs.exists(&readonly)? {
        return Ok(Redirection::Resolved(Target::new(readonly, Side::ReadOnly)));
    }

    let writable = join(roots.writable_bytes(), suffix)?;
    Ok(Redirection::Resolved(Target::new(writable, Side::Writable)))
}

fn join(root: &[u8], suffix: &[u8]) -> ShimResult<CString> {
    let mut path = Vec::with_capacity(root.len() + suffix.len() + 1);
    path.extend_from_slice(root);
    path.extend_from_slice(suffix);
    Ok(CString::new(path)?)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::ReadOnly => write!(f, "readonly"),
            Side::Writable => write!(f, "writable"),
        }
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirection::Unchanged => write!(f, "[unmodified]"),
            Redirection::Resolved(target) => write!(
                f,
                "{} [{}]",
                target.path.to_string_lossy(),
                target.side
            ),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashSet, fs};

    use tempfile::tempdir;

    use crate::DirectFs;

    use super::*;

    /// A fake filesystem holding a fixed set of existing paths.
    #[derive(Default)]
    struct FakeFs {
        existing: HashSet<Vec<u8>>,
        probes: RefCell<Vec<Vec<u8>>>,
    }

    impl FakeFs {
        fn with(paths: &[&str]) -> Self {
            Self {
                existing: paths.iter().map(|p| p.as_bytes().to_vec()).collect(),
                ..Default::default()
            }
        }
    }

    impl RawFs for FakeFs {
        fn exists(&self, path: &CStr) -> ShimResult<bool> {
            self.probes.borrow_mut().push(path.to_bytes().to_vec());
            Ok(self.existing.contains(path.to_bytes()))
        }

        fn mkdir(&self, _path: &CStr, _mode: u32) -> ShimResult<()> {
            unreachable!("the redirector never creates directories")
        }
    }

    fn redirect_str(path: &str, fs: &impl RawFs) -> Redirection {
        let roots = RootConfig::new("/ro", "/rw").unwrap();
        let canonical = CanonicalPath::new(path.as_bytes()).unwrap();
        redirect(&canonical, &roots, fs).unwrap()
    }

    fn resolved(path: &str, side: Side) -> Redirection {
        Redirection::Resolved(Target::new(CString::new(path).unwrap(), side))
    }

    #[test]
    fn test_redirect_outside_roots_unchanged() {
        let fs = FakeFs::default();
        assert_eq!(redirect_str("/other/file", &fs), Redirection::Unchanged);
        assert_eq!(redirect_str("/", &fs), Redirection::Unchanged);
        assert!(fs.probes.borrow().is_empty());
    }

    #[test]
    fn test_redirect_prefers_readonly() {
        let fs = FakeFs::with(&["/ro/x/y"]);
        assert_eq!(
            redirect_str("/ro/x/y", &fs),
            resolved("/ro/x/y", Side::ReadOnly)
        );
        assert_eq!(
            redirect_str("/rw/x/y", &fs),
            resolved("/ro/x/y", Side::ReadOnly)
        );
    }

    #[test]
    fn test_redirect_falls_back_to_writable() {
        let fs = FakeFs::default();
        assert_eq!(
            redirect_str("/ro/x/y", &fs),
            resolved("/rw/x/y", Side::Writable)
        );
        assert_eq!(
            redirect_str("/rw/x/y", &fs),
            resolved("/rw/x/y", Side::Writable)
        );
    }

    #[test]
    fn test_redirect_probes_readonly_once() {
        let fs = FakeFs::default();
        redirect_str("/rw/a/../b", &fs);
        assert_eq!(*fs.probes.borrow(), vec![b"/ro/b".to_vec()]);
    }

    #[test]
    fn test_redirect_root_itself() {
        let fs = FakeFs::with(&["/ro"]);
        assert_eq!(redirect_str("/rw", &fs), resolved("/ro", Side::ReadOnly));

        // The trailing separator is part of the probed variant
        assert_eq!(redirect_str("/ro/", &fs), resolved("/rw/", Side::Writable));
    }

    #[test]
    fn test_redirect_segment_boundary() {
        let roots = RootConfig::new("/data", "/overlay").unwrap();
        let fs = FakeFs::default();
        let canonical = CanonicalPath::new(b"/data2/file").unwrap();
        assert_eq!(
            redirect(&canonical, &roots, &fs).unwrap(),
            Redirection::Unchanged
        );

        let canonical = CanonicalPath::new(b"/overlayfs/file").unwrap();
        assert_eq!(
            redirect(&canonical, &roots, &fs).unwrap(),
            Redirection::Unchanged
        );
    }

    #[test]
    fn test_redirect_on_disk() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let ro = temp_dir.path().join("ro");
        let rw = temp_dir.path().join("rw");
        fs::create_dir_all(ro.join("x"))?;
        fs::create_dir_all(&rw)?;
        fs::write(ro.join("x/y"), b"pristine")?;

        let roots = RootConfig::new(&ro, &rw)?;
        let logical = rw.join("x/y");
        let canonical = CanonicalPath::new(logical.to_str().unwrap().as_bytes())?;
        let redirection = redirect(&canonical, &roots, &DirectFs)?;
        let target = redirection.target().unwrap();
        assert_eq!(target.side(), Side::ReadOnly);
        assert_eq!(target.path().to_str()?, ro.join("x/y").to_str().unwrap());

        fs::remove_file(ro.join("x/y"))?;
        let redirection = redirect(&canonical, &roots, &DirectFs)?;
        let target = redirection.target().unwrap();
        assert_eq!(target.side(), Side::Writable);
        assert_eq!(target.path().to_str()?, rw.join("x/y").to_str().unwrap());
        Ok(())
    }

    #[test]
    fn test_redirection_display() {
        assert_eq!(Redirection::Unchanged.to_string(), "[unmodified]");
        assert_eq!(
            resolved("/rw/a", Side::Writable).to_string(),
            "/rw/a [writable]"
        );
    }
}
