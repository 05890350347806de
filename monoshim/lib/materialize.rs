use std::ffi::CString;

use crate::{defaults::IMPLICIT_DIR_MODE, RawFs};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates the missing ancestor directories of `target` below `floor`, ignoring failures.
///
/// Each missing ancestor is created top-down with [`IMPLICIT_DIR_MODE`]. When the parent already
/// exists this costs a single probe. Failures are only logged; the creating call that follows
/// reports its own error.
///
/// ## Arguments
///
/// * `fs` - The raw binding used to probe and create directories
/// * `target` - The physical path about to be created
/// * `floor` - An ancestor of `target` known to exist, usually the writable root; nothing at or
///   above it is ever created
pub fn ensure_parents(fs: &impl RawFs, target: &[u8], floor: &[u8]) {
    if !target.starts_with(floor) {
        tracing::debug!(
            path = %String::from_utf8_lossy(target),
            floor = %String::from_utf8_lossy(floor),
            "target is not below floor, not creating parents"
        );
        return;
    }

    ensure_dir_chain(fs, target, floor.len());
}

/// Returns the length of the parent directory of `path`, if the parent lies strictly below the
/// first `floor` bytes. A single trailing separator on `path` is ignored.
fn parent_len(path: &[u8], floor: usize) -> Option<usize> {
    let trimmed = match path.split_last() {
        Some((b'/', rest)) => rest,
        _ => path,
    };

    let separator = trimmed.iter().rposition(|&b| b == b'/')?;
    (separator > floor).then_some(separator)
}

fn ensure_dir_chain(fs: &impl RawFs, path: &[u8], floor: usize) {
    let Some(len) = parent_len(path, floor) else {
        return;
    };

    let parent = &path[..len];
    let Ok(parent_c) = CString::new(parent) else {
        return;
    };

    match fs.exists(&parent_c) {
        Ok(true) => return,
        Ok(false) => {}
        Err(e) => {
            tracing::debug!(parent = %parent_c.to_string_lossy(), "could not probe: {e}");
            return;
        }
    }

    ensure_dir_chain(fs, parent, floor);

    if let Err(e) = fs.mkdir(&parent_c, IMPLICIT_DIR_MODE) {
        tracing::debug!(parent = %parent_c.to_string_lossy(), "could not create: {e}");
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::HashSet,
        ffi::CStr,
        fs,
        os::unix::fs::PermissionsExt,
    };

    use tempfile::tempdir;

    use crate::{DirectFs, ShimError, ShimResult};

    use super::*;

    /// A fake filesystem that records every directory it is asked to create.
    struct RecordingFs {
        existing: RefCell<HashSet<Vec<u8>>>,
        created: RefCell<Vec<Vec<u8>>>,
        fail_mkdir: bool,
    }

    impl RecordingFs {
        fn with(paths: &[&str]) -> Self {
            Self {
                existing: RefCell::new(paths.iter().map(|p| p.as_bytes().to_vec()).collect()),
                created: RefCell::new(Vec::new()),
                fail_mkdir: false,
            }
        }

        fn created(&self) -> Vec<String> {
            self.created
                .borrow()
                .iter()
                .map(|p| String::from_utf8(p.clone()).unwrap())
                .collect()
        }
    }

    impl RawFs for RecordingFs {
        fn exists(&self, path: &CStr) -> ShimResult<bool> {
            Ok(self.existing.borrow().contains(path.to_bytes()))
        }

        fn mkdir(&self, path: &CStr, mode: u32) -> ShimResult<()> {
            assert_eq!(mode, 0o750);
            self.created.borrow_mut().push(path.to_bytes().to_vec());
            if self.fail_mkdir {
                return Err(ShimError::Io(std::io::Error::from_raw_os_error(
                    libc::EACCES,
                )));
            }
            self.existing.borrow_mut().insert(path.to_bytes().to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_parent_len() {
        assert_eq!(parent_len(b"/rw/a/b/new.txt", 3), Some(7));
        assert_eq!(parent_len(b"/rw/a/b/", 3), Some(5));
        assert_eq!(parent_len(b"/rw/a", 3), None);
        assert_eq!(parent_len(b"/rw/a/", 3), None);
        assert_eq!(parent_len(b"/rw", 3), None);
    }

    #[test]
    fn test_ensure_parents_existing_parent_is_noop() {
        let fs = RecordingFs::with(&["/rw", "/rw/a", "/rw/a/b"]);
        ensure_parents(&fs, b"/rw/a/b/new.txt", b"/rw");
        assert!(fs.created().is_empty());
    }

    #[test]
    fn test_ensure_parents_creates_top_down() {
        let fs = RecordingFs::with(&["/rw"]);
        ensure_parents(&fs, b"/rw/a/b/c/new.txt", b"/rw");
        assert_eq!(fs.created(), vec!["/rw/a", "/rw/a/b", "/rw/a/b/c"]);
    }

    #[test]
    fn test_ensure_parents_stops_at_existing_ancestor() {
        let fs = RecordingFs::with(&["/rw", "/rw/a"]);
        ensure_parents(&fs, b"/rw/a/b/c/new.txt", b"/rw");
        assert_eq!(fs.created(), vec!["/rw/a/b", "/rw/a/b/c"]);
    }

    #[test]
    fn test_ensure_parents_never_above_floor() {
        // Not even the floor itself is created when missing
        let fs = RecordingFs::with(&[]);
        ensure_parents(&fs, b"/rw/a/new.txt", b"/rw");
        assert_eq!(fs.created(), vec!["/rw/a"]);

        let fs = RecordingFs::with(&[]);
        ensure_parents(&fs, b"/rw/new.txt", b"/rw");
        assert!(fs.created().is_empty());

        let fs = RecordingFs::with(&[]);
        ensure_parents(&fs, b"/elsewhere/a/new.txt", b"/rw");
        assert!(fs.created().is_empty());
    }

    #[test]
    fn test_ensure_parents_directory_target_with_trailing_separator() {
        let fs = RecordingFs::with(&["/rw"]);
        ensure_parents(&fs, b"/rw/a/b/", b"/rw");
        assert_eq!(fs.created(), vec!["/rw/a"]);
    }

    #[test]
    fn test_ensure_parents_swallows_failures() {
        let mut fs = RecordingFs::with(&["/rw"]);
        fs.fail_mkdir = true;
        ensure_parents(&fs, b"/rw/a/b/new.txt", b"/rw");
        assert_eq!(fs.created(), vec!["/rw/a", "/rw/a/b"]);
    }

    #[test_log::test]
    fn test_ensure_parents_on_disk() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let rw = temp_dir.path().join("rw");
        fs::create_dir(&rw)?;

        let target = rw.join("a/b/new.txt");
        ensure_parents(
            &DirectFs,
            target.to_str().unwrap().as_bytes(),
            rw.to_str().unwrap().as_bytes(),
        );

        assert!(rw.join("a").is_dir());
        assert!(rw.join("a/b").is_dir());
        assert!(!target.exists());

        let mode = fs::metadata(rw.join("a/b"))?.permissions().mode() & 0o777;
        assert_eq!(mode & !0o750, 0);
        Ok(())
    }
}
