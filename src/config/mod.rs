use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "snapedit";
const APP_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 20;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 30_000;
pub const DEFAULT_MIN_CROP_SIZE: f64 = 50.0;
pub const DEFAULT_HANDLE_SIZE: f64 = 16.0;

/// Editor limits and tuning from `config.json`.
///
/// Every field is optional in the file; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_history_length: usize,
    pub max_upload_bytes: u64,
    pub max_dimension: u32,
    pub min_crop_size: f64,
    pub handle_size: f64,
    pub preview_debounce_ms: u64,
    pub preview_frame_ms: u64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub font_paths: Vec<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            min_crop_size: DEFAULT_MIN_CROP_SIZE,
            handle_size: DEFAULT_HANDLE_SIZE,
            preview_debounce_ms: 100,
            preview_frame_ms: 16,
            min_zoom: 0.1,
            max_zoom: 5.0,
            font_paths: Vec::new(),
        }
    }
}

impl EditorConfig {
    /// Clamps values a hand-edited file could break invariants with.
    pub fn sanitized(mut self) -> Self {
        self.max_history_length = self.max_history_length.max(1);
        self.max_dimension = self.max_dimension.max(1);
        if !self.min_crop_size.is_finite() || self.min_crop_size < 1.0 {
            self.min_crop_size = DEFAULT_MIN_CROP_SIZE;
        }
        if !self.handle_size.is_finite() || self.handle_size <= 0.0 {
            self.handle_size = DEFAULT_HANDLE_SIZE;
        }
        if !(self.min_zoom > 0.0 && self.min_zoom.is_finite()) {
            self.min_zoom = 0.1;
        }
        if !(self.max_zoom >= self.min_zoom && self.max_zoom.is_finite()) {
            self.max_zoom = self.min_zoom.max(5.0);
        }
        self
    }
}

pub fn load_editor_config() -> EditorConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_editor_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_editor_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EditorConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return EditorConfig::default(),
    };
    if !path.exists() {
        return EditorConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_editor_config(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EditorConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            EditorConfig::default()
        }
    }
}

pub(crate) fn parse_editor_config(contents: &str) -> serde_json::Result<EditorConfig> {
    serde_json::from_str::<EditorConfig>(contents).map(EditorConfig::sanitized)
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
