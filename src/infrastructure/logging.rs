//! Logging system configuration and initialization
//!
//! - Console output plus a non-blocking log file
//! - Optional JSON formatting for the file layer
//! - Existing log file is rotated (renamed with its timestamp) on startup
//! - Only `max_files` log files are kept
//! - `RUST_LOG` overrides the configured level

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        self,
        format::{DefaultFields, Format, Full},
        time::FormatTime,
    },
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const LOG_FILE_NAME: &str = "yc-directory-crawler.log";

// Keeps the non-blocking writer alive for the life of the process
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if !config.log_dir.is_empty() {
        return PathBuf::from(&config.log_dir);
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level with noisy crates clamped
fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);

        if !level.to_lowercase().contains("trace") {
            for directive in [
                "reqwest=info",
                "hyper=warn",
                "hyper_util=warn",
                "h2=warn",
                "tokio=info",
                "runtime=warn",
                "chromiumoxide=warn",
                "tungstenite=warn",
                "html5ever=warn",
                "selectors=warn",
            ] {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
            if let Ok(d) = format!("yc_directory_crawler={}", level).parse() {
                filter = filter.add_directive(d);
            }
        }

        filter
    })
}

type ConsoleLayer<S> = fmt::Layer<S, DefaultFields, Format<Full, LocalTimeFormatter>>;

/// Stdout layer; built per call so it can sit on either file-layer stack
fn console_layer<S>(enabled: bool) -> Option<ConsoleLayer<S>> {
    enabled.then(|| fmt::Layer::new().with_timer(LocalTimeFormatter).with_target(false))
}

/// Initialize logging with the given configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let log_dir = get_log_directory(config);
    let registry = Registry::default().with(build_env_filter(&config.level));

    match (config.file_output, config.console_output) {
        (true, console) => {
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
            rotate_existing_log_file(&log_dir)?;
            cleanup_old_logs(&log_dir, config.max_files);

            let (file_writer, file_guard) = non_blocking(rolling::never(&log_dir, LOG_FILE_NAME));
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry.with(file_layer).with(console_layer(console)).try_init()?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry.with(file_layer).with(console_layer(console)).try_init()?;
            }
        }
        (false, true) => {
            registry.with(console_layer(true)).try_init()?;
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    Ok(())
}

/// Rename the previous run's log file with its modification timestamp
fn rotate_existing_log_file(log_dir: &Path) -> Result<()> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Local> = file_time.into();

    let file_stem = LOG_FILE_NAME.trim_end_matches(".log");
    let timestamped_path =
        log_dir.join(format!("{}.{}.log", file_stem, datetime.format("%Y%m%dT%H%M%S")));

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;
    Ok(())
}

/// Delete the oldest `.log` files beyond `max_files`
fn cleanup_old_logs(log_dir: &Path, max_files: u32) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "log"))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_log_dir_wins() {
        let config = LoggingConfig {
            log_dir: "/tmp/ycdc-logs".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/tmp/ycdc-logs"));
    }

    #[test]
    fn default_log_dir_ends_with_logs() {
        let log_dir = get_log_directory(&LoggingConfig::default());
        assert!(log_dir.to_string_lossy().ends_with("logs"));
    }

    #[test]
    fn cleanup_keeps_only_max_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("run{}.log", i)), "x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path(), 2);

        let remaining_logs = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
            .count();
        assert_eq!(remaining_logs, 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn console_layer_stacks_on_json_and_text_file_layers() {
        let json = Registry::default()
            .with(EnvFilter::new("info"))
            .with(fmt::Layer::new().json().with_writer(std::io::sink))
            .with(console_layer(false));
        tracing::subscriber::with_default(json, || info!("json stack"));

        let text = Registry::default()
            .with(EnvFilter::new("info"))
            .with(fmt::Layer::new().with_writer(std::io::sink).with_ansi(false))
            .with(console_layer(false));
        tracing::subscriber::with_default(text, || info!("text stack"));
    }

    #[test]
    fn rotation_renames_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "previous run").unwrap();

        rotate_existing_log_file(dir.path()).unwrap();

        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        let rotated = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(rotated, 1);
    }
}
