//! Default locations for the progress file and the config file.

pub const DEFAULT_PROGRESS_FILE: &str = ".task-progress.json";
pub const DEFAULT_CONFIG_FILE: &str = "tasktrail.toml";

fn env_or(var: &str, default: &str) -> String {
    resolve(std::env::var(var).ok(), default)
}

fn resolve(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Resolve the progress file path.
/// Checks `TASKTRAIL_FILE` env var, falls back to `.task-progress.json` in
/// the current directory.
pub fn progress_path() -> String {
    env_or("TASKTRAIL_FILE", DEFAULT_PROGRESS_FILE)
}

/// Resolve the config file path.
/// Checks `TASKTRAIL_CONFIG` env var, falls back to `tasktrail.toml` in the
/// current directory.
pub fn config_path() -> String {
    env_or("TASKTRAIL_CONFIG", DEFAULT_CONFIG_FILE)
}
