use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_TOOL_PROGRAM: &str = "java";
const DEFAULT_TOOL_JAR: &str = "plantuml.jar";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MIN_PNG_BYTES: usize = 1000;
const DEFAULT_SCRATCH_DIR: &str = "pumlview";
const DEFAULT_DIAGRAM_DIR: &str = "PUML";
const DEFAULT_RSVG_CONVERT: &str = "rsvg-convert";
const DEFAULT_MAGICK: &str = "magick";

/// Where Graphviz usually lives, most specific first. Bare names are looked up on `PATH`.
const DEFAULT_LAYOUT_HELPERS: &[&str] = &[
    "/opt/homebrew/bin/dot",
    "/usr/local/bin/dot",
    "/usr/bin/dot",
    "dot",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {} as TOML or YAML: {toml_error}", .path.display())]
    Parse { path: PathBuf, toml_error: String },
}

/// How the external renderer is launched. Invocation-specific arguments are
/// appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_tool_program")]
    pub program: String,
    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,
}

impl ToolConfig {
    /// Launch `java -jar <jar>`.
    pub fn java_jar(jar: impl AsRef<Path>) -> Self {
        Self {
            program: DEFAULT_TOOL_PROGRAM.to_string(),
            args: vec![
                "-jar".to_string(),
                jar.as_ref().to_string_lossy().into_owned(),
            ],
        }
    }

    /// Launch a standalone executable (e.g. a `plantuml` wrapper script).
    pub fn executable(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::java_jar(DEFAULT_TOOL_JAR)
    }
}

/// SVG to raster conversion capabilities, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConverterKind {
    /// In-process rasterization with resvg.
    Resvg,
    /// librsvg's `rsvg-convert` command.
    RsvgConvert,
    /// ImageMagick's `magick` command.
    #[serde(rename = "imagemagick", alias = "image-magick")]
    ImageMagick,
}

impl ConverterKind {
    pub fn name(self) -> &'static str {
        match self {
            ConverterKind::Resvg => "resvg",
            ConverterKind::RsvgConvert => "rsvg-convert",
            ConverterKind::ImageMagick => "imagemagick",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default = "default_layout_helpers")]
    pub layout_helpers: Vec<String>,
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_png_bytes")]
    pub min_png_bytes: usize,
    /// Keep produced artifacts on disk for inspection after a request.
    #[serde(default = "default_retain_outputs")]
    pub retain_outputs: bool,
    #[serde(default = "default_converters")]
    pub converters: Vec<ConverterKind>,
    #[serde(default = "default_rsvg_convert")]
    pub rsvg_convert: String,
    #[serde(default = "default_magick")]
    pub magick: String,
    #[serde(default = "default_diagram_dir")]
    pub diagram_dir: PathBuf,
}

fn default_tool_program() -> String {
    DEFAULT_TOOL_PROGRAM.to_string()
}
fn default_tool_args() -> Vec<String> {
    ToolConfig::default().args
}
fn default_layout_helpers() -> Vec<String> {
    DEFAULT_LAYOUT_HELPERS.iter().map(|s| s.to_string()).collect()
}
fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_SCRATCH_DIR)
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_min_png_bytes() -> usize {
    DEFAULT_MIN_PNG_BYTES
}
fn default_retain_outputs() -> bool {
    true
}
fn default_converters() -> Vec<ConverterKind> {
    vec![
        ConverterKind::Resvg,
        ConverterKind::RsvgConvert,
        ConverterKind::ImageMagick,
    ]
}
fn default_rsvg_convert() -> String {
    DEFAULT_RSVG_CONVERT.to_string()
}
fn default_magick() -> String {
    DEFAULT_MAGICK.to_string()
}
fn default_diagram_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DIAGRAM_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: ToolConfig::default(),
            layout_helpers: default_layout_helpers(),
            scratch_root: default_scratch_root(),
            timeout_secs: default_timeout_secs(),
            min_png_bytes: default_min_png_bytes(),
            retain_outputs: default_retain_outputs(),
            converters: default_converters(),
            rsvg_convert: default_rsvg_convert(),
            magick: default_magick(),
            diagram_dir: default_diagram_dir(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML config: {}", e))
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| format!("Failed to parse YAML config: {}", e))
    }

    /// Load a config file, trying TOML first and YAML second.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match Self::from_toml(&content) {
            Ok(config) => Ok(config),
            Err(toml_error) => Self::from_yaml(&content).map_err(|_| ConfigError::Parse {
                path: path.to_path_buf(),
                toml_error,
            }),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
