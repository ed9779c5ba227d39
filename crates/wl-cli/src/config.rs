//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use wl_core::{AnalysisConfig, DEFAULT_MAX_WINDOW, DEFAULT_WINDOW_MINUTES, WindowPolicy};

/// Positions of the fields the sessionizer needs, counted in whitespace-separated
/// tokens with quoted strings kept whole.
///
/// Defaults match the AWS classic load balancer access log layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLayout {
    pub timestamp: usize,
    pub client: usize,
    pub resource: usize,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self {
            timestamp: 0,
            client: 2,
            resource: 11,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session window in minutes; also the fallback when discovery finds nothing.
    pub session_window: f64,
    /// Discover the session window from the data instead of using `session_window`.
    pub discover_window: bool,
    /// Largest candidate window tried during discovery.
    pub max_window: u32,
    /// Number of window cohorts the selector looks for.
    pub cohort_count: usize,
    /// Number of most engaged clients shown in the summary.
    pub top_clients: usize,
    /// Directory report files are written to.
    pub output_dir: PathBuf,
    pub fields: FieldLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_window: DEFAULT_WINDOW_MINUTES,
            discover_window: true,
            max_window: DEFAULT_MAX_WINDOW,
            cohort_count: 2,
            top_clients: 15,
            output_dir: PathBuf::from("out"),
            fields: FieldLayout::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WL_*, nested keys as WL_FIELDS__CLIENT)
        figment = figment.merge(Env::prefixed("WL_").split("__"));

        figment.extract()
    }

    /// The pipeline configuration this config describes.
    pub const fn analysis_config(&self) -> AnalysisConfig {
        let window = if self.discover_window {
            WindowPolicy::Discover {
                fallback: self.session_window,
            }
        } else {
            WindowPolicy::Fixed(self.session_window)
        };
        AnalysisConfig {
            window,
            max_window: self.max_window,
            cohort_count: self.cohort_count,
        }
    }
}

/// Returns the platform-specific config directory for wl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wl"))
}
