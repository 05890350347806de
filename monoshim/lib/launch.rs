use std::{
    env,
    ffi::{OsStr, OsString},
    os::unix::{ffi::OsStrExt, process::CommandExt},
    path::{Path, PathBuf},
    process::Command,
};

use getset::Getters;

use crate::{
    defaults::{
        DEFAULT_PRELOAD_LIB_NAME, LD_PRELOAD_ENV_VAR, LOG_ENV_VAR, PRELOAD_ENV_VAR, ROOTS_ENV_VAR,
    },
    RootConfig, ShimError, ShimResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A command to run with the preload library injected and the root pair configured.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Launch {
    /// The root pair handed to the preload library.
    roots: RootConfig,

    /// The preload library.
    preload: PathBuf,

    /// The diagnostics filter handed to the preload library, if any.
    log_filter: Option<String>,

    /// The program to run.
    program: OsString,

    /// The program's arguments.
    args: Vec<OsString>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Launch {
    /// Creates a launch of `program` with `args`.
    pub fn new(
        roots: RootConfig,
        preload: impl Into<PathBuf>,
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            roots,
            preload: preload.into(),
            log_filter: None,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the diagnostics filter for the launched process.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Returns the environment variables to set on the launched process.
    ///
    /// The preload library is put in front of any libraries already listed in
    /// `current_preload`.
    pub fn env_vars(&self, current_preload: Option<&OsStr>) -> Vec<(&'static str, OsString)> {
        let mut vars = vec![
            (ROOTS_ENV_VAR, OsString::from(self.roots.to_string())),
            (
                LD_PRELOAD_ENV_VAR,
                prepend_preload(&self.preload, current_preload),
            ),
        ];

        if let Some(filter) = &self.log_filter {
            vars.push((LOG_ENV_VAR, OsString::from(filter)));
        }

        vars
    }

    /// Builds the command.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env_vars(env::var_os(LD_PRELOAD_ENV_VAR).as_deref()));
        command
    }

    /// Replaces the current process with the command. Only returns on failure.
    pub fn exec(&self) -> ShimError {
        tracing::debug!(
            program = %self.program.to_string_lossy(),
            preload = %self.preload.display(),
            roots = %self.roots,
            "launching"
        );
        ShimError::Io(self.command().exec())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Finds the preload library.
///
/// Uses `explicit` if given, then the `MONOSHIM_PRELOAD` environment variable, then
/// `libmonoshim_preload.so` next to the running executable. The result is made absolute since
/// the launched program may change directory before the loader reads it.
pub fn locate_preload(explicit: Option<PathBuf>) -> ShimResult<PathBuf> {
    let candidate = match explicit.or_else(|| env::var_os(PRELOAD_ENV_VAR).map(PathBuf::from)) {
        Some(path) => path,
        None => env::current_exe()?.with_file_name(DEFAULT_PRELOAD_LIB_NAME),
    };

    let candidate = std::path::absolute(&candidate)?;
    if !candidate.is_file() {
        return Err(ShimError::custom(anyhow::anyhow!(
            "preload library not found at {}",
            candidate.display()
        )));
    }

    Ok(candidate)
}

/// Returns an `LD_PRELOAD` value with `lib` first, followed by the entries of `current`.
///
/// Entries may be separated by colons or spaces. An existing entry equal to `lib` is dropped
/// so the library is not loaded twice.
pub fn prepend_preload(lib: &Path, current: Option<&OsStr>) -> OsString {
    let lib = lib.as_os_str();
    let mut value = lib.to_os_string();

    let rest = current
        .map(|current| current.as_bytes())
        .unwrap_or_default()
        .split(|&b| b == b':' || b == b' ')
        .filter(|entry| !entry.is_empty() && *entry != lib.as_bytes());

    for entry in rest {
        value.push(":");
        value.push(OsStr::from_bytes(entry));
    }

    value
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
