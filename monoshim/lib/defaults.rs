//! Default values and environment variable names shared by the launcher and the preload library.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The environment variable holding the `READONLY:WRITABLE` root pair.
pub const ROOTS_ENV_VAR: &str = "MONOSHIM_ROOTS";

/// The environment variable holding the diagnostics filter directive.
pub const LOG_ENV_VAR: &str = "MONOSHIM_LOG";

/// The environment variable pointing the launcher at the preload library.
pub const PRELOAD_ENV_VAR: &str = "MONOSHIM_PRELOAD";

/// The dynamic loader's preload variable.
pub const LD_PRELOAD_ENV_VAR: &str = "LD_PRELOAD";

/// The filter used when no diagnostics filter is configured.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// The file name of the preload library looked up next to the launcher.
pub const DEFAULT_PRELOAD_LIB_NAME: &str = "libmonoshim_preload.so";

/// Mode for directories created implicitly in the writable tree. Subject to the umask.
pub const IMPLICIT_DIR_MODE: u32 = 0o750;

/// Number of `X` characters the mkstemp family replaces in a template.
pub const TEMPLATE_PLACEHOLDER_LEN: usize = 6;
