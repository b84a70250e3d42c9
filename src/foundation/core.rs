use std::path::{Path, PathBuf};

/// Application folder name used under the per-user data directories.
pub const APP_DIR_NAME: &str = "Overlord";

/// Render a path with forward slashes, for logs and for the job descriptor.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Human-readable byte size (`512 B`, `1.5 KB`, `2.0 GB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Roaming per-user data directory (`%APPDATA%\Overlord`, or `~/Overlord` elsewhere).
pub fn app_data_dir() -> PathBuf {
    base_dir_from_env("APPDATA").join(APP_DIR_NAME)
}

/// Machine-local per-user data directory (`%LOCALAPPDATA%\Overlord`, or `~/.local/share/Overlord`).
pub fn local_app_data_dir() -> PathBuf {
    if let Some(v) = std::env::var_os("LOCALAPPDATA") {
        return PathBuf::from(v).join(APP_DIR_NAME);
    }
    home_dir().join(".local").join("share").join(APP_DIR_NAME)
}

fn base_dir_from_env(var: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(home_dir)
}

fn home_dir() -> PathBuf {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
