#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::fetch::{DEFAULT_MAX_PAGES, DEFAULT_PARTS, FetchOptions, MAX_PAGE_SIZE};
use crate::http::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DATA_ROOT: &str = "data";

#[derive(Clone)]
pub struct RuntimeSettings {
    pub api_key: Option<String>,
    pub data_root: PathBuf,
    pub api_base_url: String,
}

impl std::fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("data_root", &self.data_root)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl RuntimeSettings {
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set"))
    }

    /// Directory fetched snapshots are written to.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_root.join("raw")
    }

    /// Directory exported tables are written to.
    pub fn tables_dir(&self) -> PathBuf {
        self.data_root.join("tables")
    }
}

pub fn load_runtime_settings() -> Result<RuntimeSettings> {
    resolve_runtime_settings(RuntimeOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub api_key: Option<String>,
    pub data_root: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_runtime_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> RuntimeSettings {
    build_runtime_settings_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_runtime_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeSettings {
    let api_key = non_blank(overrides.api_key)
        .or_else(|| lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup));
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());
    let api_base_url = non_blank(overrides.api_base_url)
        .or_else(|| lookup_value("API_BASE_URL", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    RuntimeSettings {
        api_key,
        data_root: PathBuf::from(data_root),
        api_base_url,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// `[fetch]` table of the optional tuning file. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSection {
    pub page_size: Option<u32>,
    pub max_pages: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub parts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub fetch: FetchSection,
}

impl FetchConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Parsing fetch config")
    }

    /// No path means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Page size is clamped to `1..=MAX_PAGE_SIZE`; an empty part list falls
    /// back to the default parts.
    pub fn fetch_options(&self) -> FetchOptions {
        let section = &self.fetch;
        let parts: Vec<String> = section
            .parts
            .iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();
        FetchOptions {
            page_size: section
                .page_size
                .unwrap_or(MAX_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            max_pages: section.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            parts: if parts.is_empty() {
                DEFAULT_PARTS.iter().map(|part| part.to_string()).collect()
            } else {
                parts
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        match self.fetch.request_timeout_secs {
            Some(0) | None => DEFAULT_TIMEOUT,
            Some(secs) => Duration::from_secs(secs),
        }
    }
}
