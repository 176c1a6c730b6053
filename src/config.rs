use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DecompressorKind, FieldPath, FieldSpec, MissingArchivePolicy, default_columns,
};
use crate::error::AssemblyError;
use crate::eutils::{DEFAULT_RETMAX, EutilsConfig};
use crate::formatter::check_column_names;

pub const CONFIG_FILE_NAME: &str = "kira-asm.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DELIMITER: char = ';';

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub retmax: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnEntry>>,
    #[serde(default)]
    pub decompressor: Option<DecompressorKind>,
    #[serde(default)]
    pub on_missing_archive: Option<MissingArchivePolicy>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    Shorthand(String),
    Detailed(ColumnEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ColumnEntryObject {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub eutils: EutilsConfig,
    pub output_dir: Utf8PathBuf,
    pub delimiter: char,
    pub columns: Vec<FieldSpec>,
    pub decompressor: DecompressorKind,
    pub on_missing_archive: MissingArchivePolicy,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            eutils: EutilsConfig::default(),
            output_dir: Utf8PathBuf::from("."),
            delimiter: DEFAULT_DELIMITER,
            columns: default_columns(),
            decompressor: DecompressorKind::default(),
            on_missing_archive: MissingArchivePolicy::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the explicit config, the project-local one, or the user-level one, in that order.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, AssemblyError> {
        let mut config = match Self::locate(path) {
            Some(config_path) => {
                tracing::debug!(path = %config_path.display(), "loading config");
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| AssemblyError::ConfigRead(config_path.clone()))?;
                serde_json::from_str::<Config>(&content)
                    .map_err(|err| AssemblyError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        if config.email.is_none() {
            config.email = non_empty_env("NCBI_EMAIL");
        }
        if config.api_key.is_none() {
            config.api_key = non_empty_env("NCBI_API_KEY");
        }

        Self::resolve_config(config)
    }

    fn locate(path: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("kira-asm").join(CONFIG_FILE_NAME))
            .filter(|candidate| candidate.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, AssemblyError> {
        let defaults = EutilsConfig::default();
        let timeout = match config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let eutils = EutilsConfig {
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            tool: config.tool.unwrap_or(defaults.tool),
            email: config.email.filter(|email| !email.trim().is_empty()),
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            retmax: config.retmax.unwrap_or(DEFAULT_RETMAX),
            timeout,
        };

        let delimiter = match config.delimiter {
            Some(value) => parse_delimiter(&value)?,
            None => DEFAULT_DELIMITER,
        };

        let columns = match config.columns {
            Some(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    ColumnEntry::Shorthand(name) => FieldSpec::shorthand(&name),
                    ColumnEntry::Detailed(obj) => {
                        let path = obj.path.parse::<FieldPath>().map_err(|_| {
                            AssemblyError::InvalidFieldPath {
                                name: obj.name.clone(),
                                path: obj.path.clone(),
                            }
                        })?;
                        Ok(FieldSpec::new(obj.name, path))
                    }
                })
                .collect::<Result<Vec<_>, AssemblyError>>()?,
            None => default_columns(),
        };
        check_column_names(&columns, delimiter)?;

        Ok(ResolvedConfig {
            eutils,
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| Utf8PathBuf::from(".")),
            delimiter,
            columns,
            decompressor: config.decompressor.unwrap_or_default(),
            on_missing_archive: config.on_missing_archive.unwrap_or_default(),
        })
    }
}

pub fn parse_delimiter(value: &str) -> Result<char, AssemblyError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch != '\n' && ch != '\r' => Ok(ch),
        _ => Err(AssemblyError::InvalidDelimiter(value.to_string())),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
