//! The config module parses the TOML configuration file.
//!
//! Every key is optional and falls back to the built-in default. Invalid values fail with an error
//! naming the key and the file; keys we do not recognize are reported as a warning so that typos do
//! not go unnoticed.
//!
//! ```toml
//! max_proc = 4
//! log_dir = "~/.local/state/rose-match"
//!
//! [matching]
//! min_pair_score = 0.45
//! ambiguity_margin = 0.05
//!
//! [candidate_cache]
//! ttl_secs = 3600
//! capacity = 128
//!
//! [tag_policy]
//! trackartist = "overwrite"
//! releasetitle = "preserve"
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::candidate_cache::CachePolicy;
use crate::common::{default_max_proc, APP_NAME};
use crate::error::{Result, RoseError, RoseExpectedError};
use crate::local::TagField;
use crate::resolver::Thresholds;
use crate::tagplan::{FieldPolicy, TagPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub thresholds: Thresholds,
    pub max_proc: usize,
    pub tag_policy: TagPolicy,
    pub candidate_cache: CachePolicy,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            thresholds: Thresholds::default(),
            max_proc: default_max_proc(),
            tag_policy: TagPolicy::default(),
            candidate_cache: CachePolicy::default(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn parse(config_path_override: Option<&Path>) -> Result<Config> {
        let cfgpath = match config_path_override {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()
                .ok_or_else(|| RoseError::Generic("Failed to determine configuration directory".to_string()))?,
        };
        let text = match fs::read_to_string(&cfgpath) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RoseExpectedError::ConfigNotFound { path: cfgpath }.into());
            }
            Err(e) => return Err(e.into()),
        };
        debug!("loading configuration from {}", cfgpath.display());
        Self::from_toml_str(&text, &cfgpath)
    }

    /// Parses configuration text. `cfgpath` is only used in error messages.
    pub fn from_toml_str(text: &str, cfgpath: &Path) -> Result<Config> {
        let mut data: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| RoseExpectedError::ConfigDecode(e.to_string()))?;
        let mut config = Config::default();
        let mut unrecognized: Vec<String> = Vec::new();

        if let Some(value) = data.remove("max_proc") {
            config.max_proc = match value.as_integer() {
                Some(n) if n > 0 => n as usize,
                _ => return Err(invalid(cfgpath, "max_proc", format!("must be a positive integer: got {value}"))),
            };
        }

        if let Some(value) = data.remove("log_dir") {
            let dir = value
                .as_str()
                .ok_or_else(|| invalid(cfgpath, "log_dir", format!("must be a path: got {value}")))?;
            config.log_dir = Some(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        }

        if let Some(value) = data.remove("matching") {
            let mut table = into_table(value, cfgpath, "matching")?;
            if let Some(v) = table.remove("min_pair_score") {
                config.thresholds.min_pair_score = take_fraction(&v, cfgpath, "matching.min_pair_score")?;
            }
            if let Some(v) = table.remove("ambiguity_margin") {
                config.thresholds.ambiguity_margin = take_fraction(&v, cfgpath, "matching.ambiguity_margin")?;
            }
            unrecognized.extend(table.keys().map(|k| format!("matching.{k}")));
        }

        if let Some(value) = data.remove("candidate_cache") {
            let mut table = into_table(value, cfgpath, "candidate_cache")?;
            if let Some(v) = table.remove("ttl_secs") {
                config.candidate_cache.ttl_secs = match v.as_integer() {
                    Some(n) if n >= 0 => n,
                    _ => {
                        return Err(invalid(
                            cfgpath,
                            "candidate_cache.ttl_secs",
                            format!("must be a non-negative integer: got {v}"),
                        ))
                    }
                };
            }
            if let Some(v) = table.remove("capacity") {
                config.candidate_cache.capacity = match v.as_integer() {
                    Some(n) if n >= 0 => n as usize,
                    _ => {
                        return Err(invalid(
                            cfgpath,
                            "candidate_cache.capacity",
                            format!("must be a non-negative integer: got {v}"),
                        ))
                    }
                };
            }
            unrecognized.extend(table.keys().map(|k| format!("candidate_cache.{k}")));
        }

        if let Some(value) = data.remove("tag_policy") {
            let table = into_table(value, cfgpath, "tag_policy")?;
            for (name, v) in table {
                let key = format!("tag_policy.{name}");
                let field: TagField = name.parse().map_err(|e: RoseExpectedError| invalid(cfgpath, &key, e.to_string()))?;
                let policy: FieldPolicy = v
                    .as_str()
                    .ok_or_else(|| invalid(cfgpath, &key, format!("must be a string: got {v}")))?
                    .parse()
                    .map_err(|e: RoseExpectedError| invalid(cfgpath, &key, e.to_string()))?;
                config
                    .tag_policy
                    .set(field, policy)
                    .map_err(|e| invalid(cfgpath, &key, e.to_string()))?;
            }
        }

        unrecognized.extend(data.keys().cloned());
        if !unrecognized.is_empty() {
            unrecognized.sort();
            warn!("Unrecognized options found in configuration file: {}", unrecognized.join(", "));
        }

        Ok(config)
    }
}

fn invalid(cfgpath: &Path, key: &str, message: impl Into<String>) -> RoseError {
    RoseExpectedError::InvalidConfigValue {
        path: cfgpath.to_path_buf(),
        key: key.to_string(),
        message: message.into(),
    }
    .into()
}

fn into_table(value: toml::Value, cfgpath: &Path, key: &str) -> Result<toml::Table> {
    match value {
        toml::Value::Table(table) => Ok(table),
        other => Err(invalid(cfgpath, key, format!("must be a table: got {other}"))),
    }
}

fn take_fraction(value: &toml::Value, cfgpath: &Path, key: &str) -> Result<f64> {
    let number = match value {
        toml::Value::Float(f) => *f,
        toml::Value::Integer(i) => *i as f64,
        other => return Err(invalid(cfgpath, key, format!("must be a number: got {other}"))),
    };
    if !(0.0..=1.0).contains(&number) {
        return Err(invalid(cfgpath, key, format!("must be between 0 and 1: got {number}")));
    }
    Ok(number)
}
