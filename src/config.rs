//! Application configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! the `BOX_ANNOTATE_BACKEND_URL` environment variable, then command line
//! flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};

/// Environment variable overriding the backend URL.
pub const BACKEND_URL_ENV: &str = "BOX_ANNOTATE_BACKEND_URL";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Canvas appearance and zoom limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Annotation stroke width in display pixels
    pub stroke_width: f32,
    /// Class label font size in display pixels
    pub label_font_size: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl ViewConfig {
    /// Reject values that would break the canvas transform or painting.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return Err(AnnotateError::invalid_config(format!(
                "min_zoom must be a positive number, got {}",
                self.min_zoom
            )));
        }
        if !(self.max_zoom.is_finite() && self.max_zoom >= self.min_zoom) {
            return Err(AnnotateError::invalid_config(format!(
                "max_zoom must be at least min_zoom ({}), got {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.stroke_width.is_finite() && self.stroke_width > 0.0) {
            return Err(AnnotateError::invalid_config(format!(
                "stroke_width must be positive, got {}",
                self.stroke_width
            )));
        }
        if !(self.label_font_size.is_finite() && self.label_font_size > 0.0) {
            return Err(AnnotateError::invalid_config(format!(
                "label_font_size must be positive, got {}",
                self.label_font_size
            )));
        }
        Ok(())
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            label_font_size: 14.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub log_level: LogLevel,
    pub view: ViewConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 30,
            log_level: LogLevel::default(),
            view: ViewConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.view.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply an environment override for the backend URL.
    pub fn apply_env(&mut self, backend_url: Option<String>) {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = url;
        }
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(url) = &args.backend {
            self.backend_url = url.clone();
        }
        if let Some(level) = args.log_level {
            self.log_level = level;
        }
    }

    /// Build the effective configuration for a run.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(BACKEND_URL_ENV).ok());
        config.apply_args(args);
        config.view.validate()?;
        Ok(config)
    }
}

/// Draw labeled boxes on images and save them to an annotation backend.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "box-annotate", version)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend base URL
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Log verbosity
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Image to upload on startup
    pub image: Option<PathBuf>,
}
