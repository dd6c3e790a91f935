//! Application configuration.
//!
//! Values come from an optional TOML file and from environment variables
//! prefixed with `SALES_REPORT`, nested keys separated by `__`
//! (`SALES_REPORT__SERVER__PORT=8080`). Every section falls back to its
//! defaults, so running without any configuration works.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::loader::ColumnNames;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "SALES_REPORT";

/// Stylesheet and upload form shipped with the crate
pub const SHIPPED_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub columns: ColumnNames,
    pub report: ReportSettings,
    pub chart: ChartStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// Directory served under `/static`, the crate's `static/` by default
    pub static_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 10 * 1024 * 1024,
            static_dir: SHIPPED_STATIC_DIR.to_string(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Title printed at the top of the PDF
    pub title: String,
    /// File name offered for the PDF download
    pub file_name: String,
    /// Width of each chart in the PDF, in millimetres
    pub image_width_mm: f32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Annual Sales Report".to_string(),
            file_name: "sales_report.pdf".to_string(),
            image_width_mm: 180.0,
        }
    }
}

/// Look of the rendered charts
///
/// Passed explicitly to every chart function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    /// Width of the graph in pixels
    pub width: u32,
    /// Height of the graph in pixels
    pub height: u32,
    pub font_family: String,
    pub caption_size: u32,
    pub label_size: u32,
    /// Series colours as RGB triples, reused cyclically
    pub palette: Vec<[u8; 3]>,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
            font_family: "sans-serif".to_string(),
            caption_size: 26,
            label_size: 14,
            // viridis samples
            palette: vec![
                [68, 1, 84],
                [59, 82, 139],
                [33, 145, 140],
                [94, 201, 98],
                [253, 231, 37],
                [72, 40, 120],
                [49, 104, 142],
                [53, 183, 121],
            ],
        }
    }
}

impl ChartStyle {
    /// Colour for the `index`-th series, black when the palette is empty
    pub fn color(&self, index: usize) -> [u8; 3] {
        if self.palette.is_empty() {
            return [0, 0, 0];
        }
        self.palette[index % self.palette.len()]
    }
}

/// Load settings from `path` (or `config.toml` when absent) and the environment
///
/// A missing default file is not an error; an explicitly named file must exist.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    log::debug!("loaded settings: {:?}", settings);
    Ok(settings)
}
