use std::{
    env,
    io::{self, IsTerminal},
};

use tracing::Subscriber;
use tracing_subscriber::{fmt::MakeWriter, util::SubscriberInitExt, EnvFilter};

use crate::defaults::DEFAULT_LOG_FILTER;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Installs a stderr `tracing` subscriber filtered by the directive in the `env_var` variable.
///
/// Falls back to [`DEFAULT_LOG_FILTER`] when the variable is unset or unparsable. Colors are only
/// used when stderr is a terminal. If a global subscriber is already installed it is left in
/// place.
pub fn init_tracing(env_var: &str) {
    let ansi = io::stderr().is_terminal();
    let _ = subscriber(env::var(env_var).ok(), ansi, io::stderr).try_init();
}

/// Builds the formatting subscriber used by [`init_tracing`].
fn subscriber<W>(directive: Option<String>, ansi: bool, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .finish()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
