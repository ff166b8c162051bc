//! INI file configuration adapter with environment overrides.

use std::collections::HashMap;
use std::path::Path;

use configparser::ini::Ini;

use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
    /// (section, key) → value, lowercase keys. Wins over the file.
    overrides: HashMap<(String, String), String>,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self {
            config,
            overrides: HashMap::new(),
        })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self {
            config,
            overrides: HashMap::new(),
        })
    }

    /// Apply `PREFIX_SECTION_KEY=value` variables from the process environment,
    /// e.g. `ZONETRADER_ZONES_TRIGGER_MODE=low-touches-level`.
    pub fn with_env_prefix(self, prefix: &str) -> Self {
        self.with_vars(prefix, std::env::vars())
    }

    /// Same as [`with_env_prefix`](Self::with_env_prefix) over an explicit
    /// variable list.
    pub fn with_vars<I>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{}_", prefix.to_uppercase());
        for (name, value) in vars {
            let Some(rest) = name.to_uppercase().strip_prefix(&marker).map(str::to_string) else {
                continue;
            };
            let Some((section, key)) = rest.split_once('_') else {
                continue;
            };
            if section.is_empty() || key.is_empty() {
                continue;
            }
            tracing::debug!(section = %section.to_lowercase(), key = %key.to_lowercase(), "config override from environment");
            self.overrides
                .insert((section.to_lowercase(), key.to_lowercase()), value);
        }
        self
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.overrides
            .get(&(section.to_lowercase(), key.to_lowercase()))
            .cloned()
            .or_else(|| self.config.get(section, key))
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}
