//! Runtime configuration, filled in from CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::geohash::{MAX_PRECISION, MIN_PRECISION};

pub const DEFAULT_PRECISIONS: &[usize] = &[4, 5, 6];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs on a private in-memory database.
    pub db_path: Option<PathBuf>,
    /// Precisions the index maintains, ascending after `validate`.
    pub precisions: Vec<usize>,
    pub search_timeout: Duration,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: Some(Self::default_db_path()),
            precisions: DEFAULT_PRECISIONS.to_vec(),
            search_timeout: Duration::from_millis(2_000),
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl Config {
    /// Platform data directory, falling back to the working directory.
    pub fn default_db_path() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("vicinity"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vicinity.db")
    }

    /// Normalize (sort, dedup precisions) and check every field. Error
    /// strings are meant for the CLI to print.
    pub fn validate(&mut self) -> Result<(), String> {
        self.precisions.sort_unstable();
        self.precisions.dedup();
        if self.precisions.is_empty() {
            return Err("at least one precision must be maintained".to_string());
        }
        for &p in &self.precisions {
            if !(MIN_PRECISION..=MAX_PRECISION).contains(&p) {
                return Err(format!(
                    "precision {p} out of range ({MIN_PRECISION} to {MAX_PRECISION})"
                ));
            }
        }
        if self.search_timeout.is_zero() {
            return Err("search timeout must be positive".to_string());
        }
        if self.default_limit == 0 {
            return Err("default limit must be at least 1".to_string());
        }
        if self.max_limit < self.default_limit {
            return Err(format!(
                "max limit {} is below the default limit {}",
                self.max_limit, self.default_limit
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.precisions, vec![4, 5, 6]);
    }

    #[test]
    fn test_validate_sorts_and_dedups_precisions() {
        let mut config = Config {
            precisions: vec![6, 4, 6, 5],
            ..Config::default()
        };
        config.validate().unwrap();
        assert_eq!(config.precisions, vec![4, 5, 6]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            precisions: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            precisions: vec![4, 13],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            search_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            default_limit: 50,
            max_limit: 10,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
