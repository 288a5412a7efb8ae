//! Optional config file loading. Search order: ./epubtext.toml, then
//! $XDG_CONFIG_HOME/epubtext/config.toml (or ~/.config/epubtext/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Directory scanned for .epub files when no input is given. Paths are relative to CWD.
    pub input_dir: Option<PathBuf>,
    /// Root of the per-book output directories when -o is not set.
    pub output_dir: Option<PathBuf>,
    /// Chapter file naming: "title" (default) or "numbered".
    pub naming: Option<String>,
    /// Maximum length of a file or directory name, in characters (default 100).
    pub max_name_len: Option<usize>,
    /// Chapters with fewer characters are collected into non_chapter_content.txt. 0 or unset disables.
    pub min_chapter_chars: Option<usize>,
    /// Use in-document headings as titles when the table of contents has none (default true).
    pub heading_titles: Option<bool>,
}

/// Search order: (1) ./epubtext.toml, (2) $XDG_CONFIG_HOME/epubtext/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("epubtext.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("epubtext").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_file(path).map(Some);
        }
    }
    Ok(None)
}

/// Read and parse one config file.
pub fn load_config_file(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
