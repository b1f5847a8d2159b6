// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Logging configuration for CPG components
//!
//! Provides centralized logging setup with:
//! - Structured console output
//! - Optional file logging to a temporary directory
//! - Environment variable support (RUST_LOG)
//! - Default INFO level

use eyre::Result;
use std::{env, fs, path::PathBuf, sync::Once};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static INIT: Once = Once::new();

/// Initialize logging for a CPG component.
///
/// Sets up a console layer honoring `RUST_LOG` (default `info`) and, when
/// `enable_file_logging` is set, a daily-rotated file log under the system
/// temporary directory. Calling this more than once is a no-op.
///
/// # Arguments
/// * `component_name` - Name of the component (e.g., "cpg-engine")
/// * `enable_file_logging` - Whether to also log to a rolling file
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = init_logging_inner(component_name, enable_file_logging);
    });
    result
}

fn init_logging_inner(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_ansi(true);

    if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;
        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (non_blocking_appender, guard) = non_blocking(file_appender);
        // The guard must outlive the process for the writer thread to flush.
        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer.boxed())
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(component = component_name, log_dir = %log_dir.display(), "logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;
    }

    Ok(())
}

fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join("cpg-logs").join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}
