//! Installs the `tracing` subscriber used by the command line tool.

use std::{fs::OpenOptions, io, path::PathBuf, sync::Mutex};

use tracing_subscriber::{
    filter::Targets, fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
    Layer, Registry,
};

use crate::config::{ConfigError, LogConfig, LogFormat};

/// Targets used by this crate.
pub const TARGETS: [&str; 4] = [
    "polyglot::registry",
    "polyglot::engine",
    "polyglot::lisp",
    "polyglot::jsonscript",
];

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open log file `{}`", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

pub fn targets_for(config: &LogConfig) -> Result<Targets, ConfigError> {
    let mut targets = Targets::new().with_default(config.global_level()?);
    for target in TARGETS {
        targets = targets.with_target(target, config.level_for(target)?);
    }
    for (target, level) in &config.targets {
        targets = targets.with_target(target.clone(), crate::config::parse_level(level)?);
    }
    Ok(targets)
}

/// Installs a global subscriber writing to stderr, and to the configured
/// log file if there is one.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let targets = targets_for(config)?;
    let console = format_layer(config.format, io::stderr).with_filter(targets.clone());

    let file = match &config.file {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(handle))
                    .with_filter(targets),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

fn format_layer<W>(format: LogFormat, make_writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}

/// Routes log output through the test harness.
#[cfg(test)]
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
