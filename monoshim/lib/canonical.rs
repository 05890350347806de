use std::{
    env,
    ffi::{CString, OsStr},
    fmt,
    os::unix::ffi::OsStrExt,
    path::Path,
};

use crate::{ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An absolute path normalized without looking at the filesystem.
///
/// A canonical path contains no repeated separators and no `.` or `..` segments. Symbolic links
/// are never resolved and case is never folded. A trailing separator in the input is kept as a
/// single trailing separator, since it tells the kernel the path must name a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath(Vec<u8>);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CanonicalPath {
    /// Canonicalizes `path`, prefixing relative paths with the current working directory.
    ///
    /// ## Errors
    ///
    /// Returns [`ShimError::CurrentDirUnavailable`] if `path` is relative and the working
    /// directory cannot be determined.
    pub fn new(path: &[u8]) -> ShimResult<Self> {
        if path.first() == Some(&b'/') {
            return Ok(Self::with_base(b"/", path));
        }

        let cwd = env::current_dir().map_err(ShimError::CurrentDirUnavailable)?;
        Ok(Self::with_base(cwd.as_os_str().as_bytes(), path))
    }

    /// Canonicalizes `path` relative to `base`.
    ///
    /// Absolute paths ignore `base`. `base` is expected to be absolute; a relative base is
    /// treated as if it were rooted at `/`.
    pub fn with_base(base: &[u8], path: &[u8]) -> Self {
        let mut out = Vec::with_capacity(base.len() + path.len() + 1);
        out.push(b'/');

        if path.first() != Some(&b'/') {
            push_segments(&mut out, base);
        }
        push_segments(&mut out, path);

        let trailing = match path.last() {
            Some(&b) => b == b'/',
            None => base.last() == Some(&b'/'),
        };
        if trailing && out.len() > 1 {
            out.push(b'/');
        }

        tracing::trace!(
            path = %String::from_utf8_lossy(path),
            canonical = %String::from_utf8_lossy(&out),
            "canonicalized"
        );

        Self(out)
    }

    /// Returns the canonical path as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the canonical path as a [`Path`].
    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(&self.0))
    }

    /// Returns the part of the path below `root`, if the path lies under it.
    ///
    /// A path is under a root when it starts with the root's bytes and the next byte is either
    /// a separator or the end of the path, so `/data2` is not under `/data`. The returned suffix
    /// is empty when the path is the root itself.
    pub fn strip_root(&self, root: &[u8]) -> Option<&[u8]> {
        let rest = self.0.strip_prefix(root)?;
        match rest.first() {
            None | Some(b'/') => Some(rest),
            Some(_) => None,
        }
    }

    /// Converts the canonical path into a C string.
    pub fn into_c_string(self) -> ShimResult<CString> {
        Ok(CString::new(self.0)?)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Appends the segments of `path` to `out`, which always starts with `/`.
fn push_segments(out: &mut Vec<u8>, path: &[u8]) {
    for segment in path.split(|&b| b == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                // Cannot ascend above `/`.
                let parent = out.iter().rposition(|&b| b == b'/').unwrap_or(0);
                out.truncate(parent.max(1));
            }
            _ => {
                if out.len() > 1 {
                    out.push(b'/');
                }
                out.extend_from_slice(segment);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl AsRef<[u8]> for CanonicalPath {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<Path> for CanonicalPath {
    #[inline]
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
