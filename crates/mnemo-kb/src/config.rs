//! Configuration for the knowledge base and the company-tier seed list.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a [`crate::KnowledgeBase`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Remote retry budget (first attempt included).
    #[serde(default = "default_max_attempts")]
    pub max_retry_attempts: u32,
    /// Delay before the second remote attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    /// Deadline for any single remote call, in seconds.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_remote_timeout_secs() -> u64 {
    30
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("mnemo-kb.db"),
            max_retry_attempts: default_max_attempts(),
            retry_initial_delay_ms: default_initial_delay_ms(),
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Retry config derived from these settings.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(self.max_retry_attempts)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
    }

    /// Remote call deadline derived from these settings.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

/// One company-tier record to seed at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySeed {
    /// Stable record id (also used for idempotent re-seeding).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional admin-defined category.
    #[serde(default)]
    pub category: Option<Category>,
}

/// Parse a seed list from a JSON document.
pub fn seeds_from_json(json: &str) -> Result<Vec<CompanySeed>> {
    let seeds: Vec<CompanySeed> = serde_json::from_str(json)?;
    validate_seeds(&seeds)?;
    Ok(seeds)
}

/// Load a seed list from a JSON file.
pub fn seeds_from_path(path: &Path) -> Result<Vec<CompanySeed>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    seeds_from_json(&json)
}

fn validate_seeds(seeds: &[CompanySeed]) -> Result<()> {
    let mut seen = HashSet::new();
    for seed in seeds {
        if seed.id.is_empty() {
            return Err(Error::Config("company seed with empty id".to_string()));
        }
        if seed.name.is_empty() {
            return Err(Error::Config(format!("company seed {} has empty name", seed.id)));
        }
        if !seen.insert(seed.id.as_str()) {
            return Err(Error::Config(format!("duplicate company seed id {}", seed.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeds_parse() {
        let json = r#"[
            {"id": "vs_handbook", "name": "Company Handbook"},
            {"id": "vs_runbooks", "name": "Runbooks", "category": "knowledge"}
        ]"#;
        let seeds = seeds_from_json(json).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].id, "vs_handbook");
        assert_eq!(seeds[1].category, Some(Category::Knowledge));
    }

    #[test]
    fn test_duplicate_seed_ids_rejected() {
        let json = r#"[
            {"id": "vs_a", "name": "A"},
            {"id": "vs_a", "name": "B"}
        ]"#;
        assert!(matches!(seeds_from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(seeds_from_json(r#"[{"id": "", "name": "A"}]"#).is_err());
        assert!(seeds_from_json(r#"[{"id": "vs_a", "name": ""}]"#).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = KnowledgeBaseConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.remote_timeout(), Duration::from_secs(30));
        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: KnowledgeBaseConfig =
            serde_json::from_str(r#"{"db_path": "/tmp/kb.db"}"#).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/kb.db"));
        assert_eq!(config.max_retry_attempts, 3);
    }
}
