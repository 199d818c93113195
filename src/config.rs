use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::EXCLUDED_SAMPLE_TYPES;
use crate::error::ValidatorError;

pub const CONFIG_FILE_NAME: &str = "xena-validate.json";
pub const DEFAULT_API_BASE: &str = "https://api.gdc.cancer.gov";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub page_sizes: Option<PageSizesEntry>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub manifest_file: Option<String>,
    #[serde(default)]
    pub transfer: Option<TransferKind>,
    #[serde(default)]
    pub excluded_sample_types: Option<Vec<String>>,
    #[serde(default)]
    pub max_flatten_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PageSizesEntry {
    #[serde(default)]
    pub cases: Option<usize>,
    #[serde(default)]
    pub files: Option<usize>,
    #[serde(default)]
    pub survival: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Http,
    Curl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub cases: usize,
    pub files: usize,
    pub survival: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            cases: 20000,
            files: 100,
            survival: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub page_sizes: PageSizes,
    pub download_dir: Utf8PathBuf,
    pub manifest_file: Utf8PathBuf,
    pub transfer: TransferKind,
    pub excluded_sample_types: Vec<String>,
    pub max_flatten_depth: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 120,
            max_retries: 3,
            page_sizes: PageSizes::default(),
            download_dir: Utf8PathBuf::from("gdc_download"),
            manifest_file: Utf8PathBuf::from("request.txt"),
            transfer: TransferKind::Http,
            excluded_sample_types: EXCLUDED_SAMPLE_TYPES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            max_flatten_depth: 5,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, then `./xena-validate.json`, then the platform config
    /// directory. With none of them present the built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ValidatorError> {
        let config_path = match path {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ValidatorError::MissingConfig(path));
                }
                Some(path)
            }
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| ValidatorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ValidatorError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("org", "xena", "xena-gdc-validator")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ValidatorError> {
        let defaults = ResolvedConfig::default();
        let page_sizes = match config.page_sizes {
            Some(entry) => PageSizes {
                cases: entry.cases.unwrap_or(defaults.page_sizes.cases),
                files: entry.files.unwrap_or(defaults.page_sizes.files),
                survival: entry.survival.unwrap_or(defaults.page_sizes.survival),
            },
            None => defaults.page_sizes,
        };
        if page_sizes.cases == 0 || page_sizes.files == 0 || page_sizes.survival == 0 {
            return Err(ValidatorError::ConfigParse(
                "page sizes must be greater than zero".to_string(),
            ));
        }

        let max_flatten_depth = config
            .max_flatten_depth
            .unwrap_or(defaults.max_flatten_depth);
        if max_flatten_depth == 0 {
            return Err(ValidatorError::ConfigParse(
                "max_flatten_depth must be at least 1".to_string(),
            ));
        }

        let api_base = config
            .api_base
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            api_base,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            page_sizes,
            download_dir: config
                .download_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.download_dir),
            manifest_file: config
                .manifest_file
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.manifest_file),
            transfer: config.transfer.unwrap_or(defaults.transfer),
            excluded_sample_types: config
                .excluded_sample_types
                .unwrap_or(defaults.excluded_sample_types),
            max_flatten_depth,
        })
    }
}
