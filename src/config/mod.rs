use anyhow::bail;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variables with this prefix override file settings,
/// e.g. `GEOAPI_BATCH_SIZE=250`.
pub const ENV_PREFIX: &str = "GEOAPI";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub api_version: String,
    pub output_style: OutputStyle,
    /// Documents with fewer records than this are pretty-printed in `auto` style.
    pub pretty_threshold: usize,
    pub coordinate_precision: u32,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub error_mode: ErrorMode,
    pub clean_output: bool,
    pub cdn_base_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./db"),
            output_dir: PathBuf::from("./dist/api/v1"),
            api_version: "v1".to_string(),
            output_style: OutputStyle::Compact,
            pretty_threshold: 100,
            coordinate_precision: 8,
            batch_size: 100,
            max_concurrency: 5,
            error_mode: ErrorMode::Warn,
            clean_output: false,
            cdn_base_url: None,
        }
    }
}

impl Settings {
    /// Layer defaults, an optional YAML file and `GEOAPI_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            bail!("Config: batch_size must be greater than zero");
        }
        if self.max_concurrency == 0 {
            bail!("Config: max_concurrency must be greater than zero");
        }
        if self.coordinate_precision > 15 {
            bail!(
                "Config: coordinate_precision {} exceeds f64 precision (max 15)",
                self.coordinate_precision
            );
        }
        if self.api_version.trim().is_empty() {
            bail!("Config: api_version must not be empty");
        }
        Ok(())
    }
}

/// How a failure is treated: `strict` aborts the run, `warn` records it and
/// continues, `ignore` continues silently.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    Strict,
    #[default]
    Warn,
    Ignore,
}

impl ErrorMode {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorMode::Strict => "strict",
            ErrorMode::Warn => "warn",
            ErrorMode::Ignore => "ignore",
        }
    }
}

impl FromStr for ErrorMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Ok(ErrorMode::Strict),
            "warn" => Ok(ErrorMode::Warn),
            "ignore" => Ok(ErrorMode::Ignore),
            _ => Err(format!("invalid error_mode: {value}")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    Pretty,
    #[default]
    Compact,
    /// Pretty below `pretty_threshold` records, compact otherwise.
    Auto,
}

impl OutputStyle {
    pub fn label(&self) -> &'static str {
        match self {
            OutputStyle::Pretty => "pretty",
            OutputStyle::Compact => "compact",
            OutputStyle::Auto => "auto",
        }
    }
}

impl FromStr for OutputStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Ok(OutputStyle::Pretty),
            "compact" => Ok(OutputStyle::Compact),
            "auto" => Ok(OutputStyle::Auto),
            _ => Err(format!("invalid output_style: {value}")),
        }
    }
}
