use std::{
    error::Error,
    ffi::NulError,
    fmt::{self, Display},
    io,
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monoshim-related operation.
pub type ShimResult<T> = Result<T, ShimError>;

/// An error that occurred while redirecting a filesystem operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ShimError {
    /// The root pair environment variable is not set.
    #[error("no readonly:writable root pair configured")]
    MissingRoots,

    /// The root pair is not of the form `READONLY:WRITABLE`.
    #[error("malformed root pair: {0}")]
    MalformedRoots(String),

    /// A relative path could not be made absolute.
    #[error("current working directory unavailable: {0}")]
    CurrentDirUnavailable(#[source] io::Error),

    /// A constructed path contained an interior NUL byte.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] NulError),

    /// The original implementation of an intercepted symbol could not be located.
    #[error("original symbol not found: {0}")]
    SymbolNotFound(String),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Custom error.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> ShimError {
        ShimError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Returns the errno an intercepted call reports when it fails with this error.
    pub fn errno(&self) -> i32 {
        match self {
            ShimError::SymbolNotFound(_) => libc::ENOSYS,
            ShimError::CurrentDirUnavailable(e) | ShimError::Io(e) => {
                e.raw_os_error().unwrap_or(libc::EIO)
            }
            ShimError::InvalidPath(_) => libc::EINVAL,
            ShimError::MissingRoots | ShimError::MalformedRoots(_) => libc::EINVAL,
            ShimError::Custom(_) => libc::EIO,
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `ShimResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> ShimResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_errno_mapping() {
        assert_eq!(
            ShimError::SymbolNotFound("stat".to_string()).errno(),
            libc::ENOSYS
        );
        assert_eq!(
            ShimError::CurrentDirUnavailable(io::Error::from_raw_os_error(libc::ENOENT)).errno(),
            libc::ENOENT
        );
        assert_eq!(
            ShimError::Io(io::Error::new(io::ErrorKind::Other, "boom")).errno(),
            libc::EIO
        );
        assert_eq!(ShimError::custom(anyhow::anyhow!("boom")).errno(), libc::EIO);
    }

    #[test]
    fn test_error_custom_downcast() {
        let error = ShimError::custom(io::Error::new(io::ErrorKind::Other, "boom"));
        let ShimError::Custom(any) = error else {
            panic!("expected a custom error");
        };

        assert!(any.downcast::<io::Error>().is_some());
        assert_eq!(any.to_string(), "boom");
    }
}
