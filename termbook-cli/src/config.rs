use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use termbook_core::NavigatorOptions;
use termbook_tty::LayoutOptions;
use tracing::debug;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_text_width: usize,
    pub horizontal_margin: usize,
    pub tab_width: usize,
    pub show_help: bool,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_text_width: 80,
            horizontal_margin: 10,
            tab_width: 4,
            show_help: true,
            log_filter: None,
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {:?}", path))
            }
        };
        toml::from_str(&raw).with_context(|| format!("invalid config {:?}", path))
    }

    pub fn layout(&self) -> LayoutOptions {
        LayoutOptions {
            max_text_width: self.max_text_width.max(1),
            horizontal_margin: self.horizontal_margin,
            show_help: self.show_help,
        }
    }

    pub fn navigator(&self) -> NavigatorOptions {
        NavigatorOptions {
            tab_width: self.tab_width,
        }
    }
}
