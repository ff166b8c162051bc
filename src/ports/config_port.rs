//! Configuration access port trait.

use crate::domain::error::ZonetraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Non-empty string value or `ConfigMissing`.
    fn require_string(&self, section: &str, key: &str) -> Result<String, ZonetraderError> {
        match self.get_string(section, key) {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(ZonetraderError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            }),
        }
    }
}
