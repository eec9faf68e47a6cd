//! File logging.
//!
//! Stdout carries the transcript, so diagnostics go to a log file through a
//! non-blocking writer. `RUST_LOG` overrides the default directives.

use std::fs::{self, OpenOptions};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

const CRATES: [&str; 4] = ["term_chat", "chat_api", "chat_transport", "transcript_store"];

pub fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered lines are flushed on exit.
pub fn init(config: &EnvConfig) -> anyhow::Result<WorkerGuard> {
    if let Some(parent) = config.log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
    }

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }
    let log_file = log_file_opts
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_ansi(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::default_directives;

    #[test]
    fn debug_flag_lowers_every_workspace_target() {
        assert_eq!(
            default_directives(false),
            "term_chat=info,chat_api=info,chat_transport=info,transcript_store=info"
        );
        assert!(default_directives(true)
            .split(',')
            .all(|directive| directive.ends_with("=debug")));
    }
}
