use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Source;
use crate::error::SraError;
use crate::fetch::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "sradownload.json";
pub const TOOLKIT_BUNDLE: &str = "sratoolkit.2.9.6-1-ubuntu64";
pub const TOOLKIT_URL: &str =
    "https://ftp-trace.ncbi.nlm.nih.gov/sra/sdk/2.9.6-1/sratoolkit.2.9.6-1-ubuntu64.tar.gz";
pub const ENA_FILEREPORT_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/filereport?accession={acc}&result=read_run&fields=base_count,fastq_ftp,submitted_ftp";

/// On-disk configuration. Every field is optional and falls back to the built-in default.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub sources: Option<String>,
    #[serde(default)]
    pub max_bases: Option<u64>,
    #[serde(default)]
    pub toolkit_dir: Option<PathBuf>,
    #[serde(default)]
    pub toolkit_url: Option<String>,
    #[serde(default)]
    pub toolkit_bundle: Option<String>,
    #[serde(default)]
    pub sra_cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub ena_endpoint: Option<String>,
    #[serde(default)]
    pub estimate_args: Option<Vec<String>>,
    #[serde(default)]
    pub extract_args: Option<Vec<String>>,
    #[serde(default)]
    pub download_attempts: Option<usize>,
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,
    #[serde(default)]
    pub metadata_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ToolkitSettings {
    pub install_dir: PathBuf,
    pub bundle: String,
    pub url: String,
}

impl ToolkitSettings {
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join(&self.bundle).join("bin")
    }
}

#[derive(Debug, Clone)]
pub struct SraSettings {
    /// Where sratoolkit stages `.sra` archives (`~/ncbi/public/sra` unless reconfigured).
    pub cache_dir: PathBuf,
    pub estimate_args: Vec<String>,
    pub extract_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EnaSettings {
    /// File report URL; `{acc}` is replaced by the run accession.
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub folder: Utf8PathBuf,
    pub sources: Vec<Source>,
    pub max_bases: Option<u64>,
    pub toolkit: ToolkitSettings,
    pub sra: SraSettings,
    pub ena: EnaSettings,
    pub retry: RetryPolicy,
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub folder: Option<Utf8PathBuf>,
    pub sources: Option<Vec<Source>>,
    pub max_bases: Option<u64>,
    pub toolkit_dir: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(folder) = overrides.folder {
            self.folder = folder;
        }
        if let Some(sources) = overrides.sources {
            self.sources = sources;
        }
        if overrides.max_bases.is_some() {
            self.max_bases = overrides.max_bases;
        }
        if let Some(dir) = overrides.toolkit_dir {
            self.toolkit.install_dir = dir;
        }
        self
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `sradownload.json` from the current directory when no path is given.
    /// A missing default file is not an error; a missing explicit file is.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SraError> {
        let sources = match config.sources.as_deref() {
            Some(value) => Source::parse_list(value)?,
            None => Source::default_order(),
        };

        let dirs = BaseDirs::new();
        let install_dir = match config.toolkit_dir {
            Some(dir) => dir,
            None => dirs
                .as_ref()
                .map(|dirs| dirs.data_dir().join("sradownload"))
                .ok_or_else(|| {
                    SraError::Filesystem("unable to resolve data directory".to_string())
                })?,
        };
        let cache_dir = match config.sra_cache_dir {
            Some(dir) => dir,
            None => dirs
                .as_ref()
                .map(|dirs| default_sra_cache_dir(dirs.home_dir()))
                .ok_or_else(|| {
                    SraError::Filesystem("unable to resolve home directory".to_string())
                })?,
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = config.download_attempts {
            retry.attempts = attempts.max(1);
        }
        if let Some(secs) = config.retry_delay_secs {
            retry.delay = Duration::from_secs(secs);
        }

        Ok(ResolvedConfig {
            folder: Utf8PathBuf::from(config.folder.unwrap_or_else(|| ".".to_string())),
            sources,
            max_bases: config.max_bases,
            toolkit: ToolkitSettings {
                install_dir,
                bundle: config
                    .toolkit_bundle
                    .unwrap_or_else(|| TOOLKIT_BUNDLE.to_string()),
                url: config.toolkit_url.unwrap_or_else(|| TOOLKIT_URL.to_string()),
            },
            sra: SraSettings {
                cache_dir,
                estimate_args: config.estimate_args.unwrap_or_else(default_estimate_args),
                extract_args: config.extract_args.unwrap_or_else(default_extract_args),
            },
            ena: EnaSettings {
                endpoint: config
                    .ena_endpoint
                    .unwrap_or_else(|| ENA_FILEREPORT_URL.to_string()),
                timeout: Duration::from_secs(config.metadata_timeout_secs.unwrap_or(30)),
            },
            retry,
        })
    }
}

pub fn default_sra_cache_dir(home: &Path) -> PathBuf {
    home.join("ncbi").join("public").join("sra")
}

pub fn default_estimate_args() -> Vec<String> {
    vec!["{acc}".to_string()]
}

pub fn default_extract_args() -> Vec<String> {
    ["{acc}", "-f", "--split-3", "-O", "."]
        .into_iter()
        .map(String::from)
        .collect()
}
