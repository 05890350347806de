use std::{
    env,
    ffi::{OsStr, OsString},
    fmt,
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::PathBuf,
    str::FromStr,
};

use getset::Getters;

use crate::{defaults::ROOTS_ENV_VAR, ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The pair of directories paths are redirected between.
///
/// ## Format
/// The pair is written as `READONLY:WRITABLE`. The first `:` separates the two halves, so the
/// writable root may itself contain colons. Both halves are kept verbatim: they are neither
/// canonicalized nor stripped of trailing separators.
///
/// ## Examples
///
/// ```
/// use monoshim::RootConfig;
///
/// let roots = "/srv/app:/var/lib/app-overlay".parse::<RootConfig>().unwrap();
/// assert_eq!(roots.get_readonly().to_str(), Some("/srv/app"));
/// assert_eq!(roots.get_writable().to_str(), Some("/var/lib/app-overlay"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct RootConfig {
    /// The pristine tree that is preferred whenever a path exists there.
    readonly: PathBuf,

    /// The tree new entries are created in.
    writable: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RootConfig {
    /// Creates a root pair, rejecting empty halves.
    pub fn new(readonly: impl Into<PathBuf>, writable: impl Into<PathBuf>) -> ShimResult<Self> {
        let readonly = readonly.into();
        let writable = writable.into();
        if readonly.as_os_str().is_empty() || writable.as_os_str().is_empty() {
            return Err(ShimError::MalformedRoots(format!(
                "{}:{}",
                readonly.display(),
                writable.display()
            )));
        }

        Ok(Self { readonly, writable })
    }

    /// Reads the root pair from the `MONOSHIM_ROOTS` environment variable.
    pub fn from_env() -> ShimResult<Self> {
        Self::from_var(env::var_os(ROOTS_ENV_VAR))
    }

    /// Parses the root pair from the raw value of the environment variable, if any.
    pub fn from_var(value: Option<OsString>) -> ShimResult<Self> {
        let value = value.ok_or(ShimError::MissingRoots)?;
        Self::parse(&value)
    }

    /// Parses a `READONLY:WRITABLE` pair, splitting at the first `:`.
    pub fn parse(value: &OsStr) -> ShimResult<Self> {
        let bytes = value.as_bytes();
        let separator = bytes
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| ShimError::MalformedRoots(value.to_string_lossy().into_owned()))?;

        let readonly = OsString::from_vec(bytes[..separator].to_vec());
        let writable = OsString::from_vec(bytes[separator + 1..].to_vec());

        Self::new(readonly, writable)
            .map_err(|_| ShimError::MalformedRoots(value.to_string_lossy().into_owned()))
    }

    /// Returns the readonly root as raw bytes.
    pub fn readonly_bytes(&self) -> &[u8] {
        self.readonly.as_os_str().as_bytes()
    }

    /// Returns the writable root as raw bytes.
    pub fn writable_bytes(&self) -> &[u8] {
        self.writable.as_os_str().as_bytes()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for RootConfig {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(OsStr::new(s))
    }
}

impl fmt::Display for RootConfig {
    /// Formats the pair following the format "readonly:writable".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.readonly.display(), self.writable.display())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
