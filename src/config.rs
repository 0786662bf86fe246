//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EML2PDF_CONFIG` (environment variable)
//! 2. `~/.config/eml2pdf/config.toml` (Linux/macOS)
//!    `%APPDATA%\eml2pdf\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::export::backend::{CommandRenderer, HtmlRenderer, Renderer};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Output defaults.
    pub output: OutputConfig,
    /// External renderer invocation.
    pub renderer: RendererConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Which backend turns HTML into output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Standalone HTML files.
    #[default]
    Html,
    /// Pipe through the external command in `[renderer]`.
    Command,
}

/// Output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Page size and optional orientation, e.g. "a4" or "letter landscape".
    pub page: String,
    /// Skip HTML sanitization.
    pub unsafe_html: bool,
    /// Write the final HTML next to each output.
    pub debug_html: bool,
    /// Backend used when `--renderer` is not given.
    pub renderer: RendererKind,
}

/// External renderer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Program reading HTML on stdin and writing the document to stdout.
    pub command: String,
    /// Arguments passed to `command`.
    pub args: Vec<String>,
    /// Extension of the files `command` produces.
    pub extension: String,
}

/// Performance tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker threads (0 = available parallelism).
    pub jobs: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            page: "a4".to_string(),
            unsafe_html: false,
            debug_html: false,
            renderer: RendererKind::Html,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "weasyprint".to_string(),
            args: vec!["-".to_string(), "-".to_string()],
            extension: "pdf".to_string(),
        }
    }
}

impl Config {
    /// Build the renderer selected by `kind`.
    pub fn build_renderer(&self, kind: RendererKind) -> Box<dyn Renderer> {
        match kind {
            RendererKind::Html => Box::new(HtmlRenderer),
            RendererKind::Command => Box::new(CommandRenderer::new(
                self.renderer.command.clone(),
                self.renderer.args.clone(),
                self.renderer.extension.clone(),
            )),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EML2PDF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("eml2pdf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eml2pdf")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("eml2pdf.log")
}
