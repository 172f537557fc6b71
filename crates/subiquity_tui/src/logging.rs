use log::LevelFilter;
use std::{path::PathBuf, str::FromStr};

pub const LOG_LEVEL_ENV: &str = "SUBIQUITY_TUI_LOG_LEVEL";
pub const LOG_FILE_ENV: &str = "SUBIQUITY_TUI_LOG_FILE";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
const LOG_SUBDIR: &str = "subiquity-tui";
const LOG_FILENAME: &str = "subiquity-tui.log";

/// stdout is the render surface, so unlike `subiquityd` this always logs to
/// a file: 1. `--log-level`/`--log-file` 2. the environment variables above
/// 3. `$XDG_STATE_HOME`.
pub fn get_log_level(cli_level: Option<LevelFilter>) -> LevelFilter {
    if let Some(level) = cli_level {
        return level;
    }
    if let Ok(level_str) = std::env::var(LOG_LEVEL_ENV) {
        if let Ok(level) = LevelFilter::from_str(&level_str.to_lowercase()) {
            return level;
        }
        eprintln!("Warning: invalid log level '{level_str}' in {LOG_LEVEL_ENV}, using default.");
    }
    DEFAULT_LOG_LEVEL
}

pub fn init_logging(cli_level: Option<LevelFilter>, cli_file: Option<PathBuf>) {
    let log_level = get_log_level(cli_level);
    let log_file = cli_file
        .or_else(|| std::env::var(LOG_FILE_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(get_default_log_file);

    if let Some(parent) = log_file.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|_| panic!("failed to create log directory: {parent:?}"));
        }
    }

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{:<5}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log_level)
        .chain(fern::log_file(&log_file).expect("failed to open log file for writing"))
        .apply();

    if let Err(e) = result {
        eprintln!("Error initializing logger: {e}");
        panic!("failed to initialize logger");
    }

    log::info!("logging initialized at {log_level} -> {}", log_file.display());
}

fn get_default_log_file() -> PathBuf {
    match dirs::state_dir() {
        Some(dir) => dir.join(LOG_SUBDIR).join(LOG_FILENAME),
        None => std::env::temp_dir().join(LOG_SUBDIR).join(LOG_FILENAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_overrides_default_level() {
        unsafe {
            std::env::set_var(LOG_LEVEL_ENV, "debug");
        }
        assert_eq!(get_log_level(None), LevelFilter::Debug);
        unsafe {
            std::env::remove_var(LOG_LEVEL_ENV);
        }
    }

    #[test]
    fn cli_level_wins_over_env_var() {
        unsafe {
            std::env::set_var(LOG_LEVEL_ENV, "error");
        }
        assert_eq!(get_log_level(Some(LevelFilter::Trace)), LevelFilter::Trace);
        unsafe {
            std::env::remove_var(LOG_LEVEL_ENV);
        }
    }

    #[test]
    fn invalid_env_value_falls_back_to_default() {
        unsafe {
            std::env::set_var(LOG_LEVEL_ENV, "not-a-level");
        }
        assert_eq!(get_log_level(None), DEFAULT_LOG_LEVEL);
        unsafe {
            std::env::remove_var(LOG_LEVEL_ENV);
        }
    }
}
