// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Practice Configuration Types
//
// Defines the YAML configuration for a Skillforge installation:
// - Kubernetes-style manifest envelope (apiVersion/kind/metadata/spec)
// - Storage backend selection
// - Generation service endpoint and retry budget
// - Drill admission caps and generation targets
// - Insight retention parameters

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::drill::DrillType;

pub const API_VERSION: &str = "skillforge/v1";
pub const KIND: &str = "PracticeConfig";
pub const CONFIG_PATH_ENV: &str = "SKILLFORGE_CONFIG_PATH";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// API version (must be "skillforge/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PracticeConfig")
    pub kind: String,

    #[serde(default)]
    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: PracticeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            name: "skillforge".to_string(),
            version: Some("1.0.0".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub drills: DrillConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    /// Jaccard threshold for insight de-duplication
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// Jaccard threshold for the local compression fallback
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,
}

impl Default for PracticeSpec {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            generation: GenerationConfig::default(),
            drills: DrillConfig::default(),
            retention: RetentionConfig::default(),
            dedup_threshold: default_dedup_threshold(),
            compression_threshold: default_compression_threshold(),
        }
    }
}

fn default_dedup_threshold() -> f64 {
    0.6
}

fn default_compression_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    #[default]
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Sled database directory (default: ~/.skillforge/data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sled,
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".skillforge")
                .join("data")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Generation attempts per skill
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Service calls allowed inside one attempt
    #[serde(default = "default_max_retries")]
    pub max_retries_per_attempt: u32,

    /// Base delay for exponential backoff between calls
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_attempts: default_max_attempts(),
            max_retries_per_attempt: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillConfig {
    #[serde(default = "default_drills_per_skill")]
    pub drills_per_skill: usize,

    /// Minimum run size when enough weak skills are available
    #[serde(default = "default_target_floor")]
    pub target_floor: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total: Option<usize>,

    #[serde(default = "default_max_per_skill")]
    pub max_per_skill: usize,

    #[serde(default = "default_max_per_skill_type")]
    pub max_per_skill_type: usize,

    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<DrillType>,

    /// Minimum seconds between two generation runs
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Weak skills derived when none are supplied
    #[serde(default = "default_derive_limit")]
    pub derive_limit: usize,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            drills_per_skill: default_drills_per_skill(),
            target_floor: default_target_floor(),
            max_total: None,
            max_per_skill: default_max_per_skill(),
            max_per_skill_type: default_max_per_skill_type(),
            allowed_types: default_allowed_types(),
            cooldown_seconds: default_cooldown_seconds(),
            derive_limit: default_derive_limit(),
        }
    }
}

fn default_drills_per_skill() -> usize {
    3
}

fn default_target_floor() -> usize {
    12
}

fn default_max_per_skill() -> usize {
    9
}

fn default_max_per_skill_type() -> usize {
    3
}

fn default_allowed_types() -> Vec<DrillType> {
    DrillType::ALL.to_vec()
}

fn default_cooldown_seconds() -> u64 {
    30
}

fn default_derive_limit() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    #[serde(default = "default_min_weight")]
    pub min_weight: f64,

    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// How often the background maintenance loop runs
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep expired insights in a separate archive instead of dropping them
    #[serde(default)]
    pub retain_archive: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            min_weight: default_min_weight(),
            max_age_days: default_max_age_days(),
            interval_seconds: default_interval_seconds(),
            enabled: true,
            retain_archive: false,
        }
    }
}

fn default_decay_rate() -> f64 {
    0.95
}

fn default_min_weight() -> f64 {
    0.1
}

fn default_max_age_days() -> i64 {
    30
}

fn default_interval_seconds() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata::default(),
            spec: PracticeSpec::default(),
        }
    }
}

impl PracticeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SKILLFORGE_CONFIG_PATH environment variable
    /// 2. ./skillforge-config.yaml (working directory)
    /// 3. ~/.skillforge/config.yaml (user home)
    /// 4. /etc/skillforge/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./skillforge-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".skillforge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/skillforge/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SKILLFORGE_GENERATION_ENDPOINT") {
            tracing::info!("Environment override: SKILLFORGE_GENERATION_ENDPOINT={}", val);
            self.spec.generation.endpoint = val;
        }

        if let Ok(val) = std::env::var("SKILLFORGE_GENERATION_MODEL") {
            tracing::info!("Environment override: SKILLFORGE_GENERATION_MODEL={}", val);
            self.spec.generation.model = val;
        }

        if let Ok(val) = std::env::var("SKILLFORGE_GENERATION_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.spec.generation.enabled = true,
                "false" | "0" | "no" | "off" => self.spec.generation.enabled = false,
                _ => {
                    tracing::warn!(
                        "Invalid value for SKILLFORGE_GENERATION_ENABLED: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        for (name, value) in [
            ("dedup_threshold", spec.dedup_threshold),
            ("compression_threshold", spec.compression_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        let generation = &spec.generation;
        if generation.enabled {
            if generation.endpoint.is_empty() {
                anyhow::bail!("generation.endpoint cannot be empty when generation is enabled");
            }
            if generation.model.is_empty() {
                anyhow::bail!("generation.model cannot be empty when generation is enabled");
            }
        }
        if generation.max_attempts == 0 {
            anyhow::bail!("generation.max_attempts must be at least 1");
        }

        let drills = &spec.drills;
        if drills.drills_per_skill == 0 {
            anyhow::bail!("drills.drills_per_skill must be at least 1");
        }
        if drills.max_per_skill == 0 || drills.max_per_skill_type == 0 {
            anyhow::bail!("drills admission caps must be at least 1");
        }
        if drills.allowed_types.is_empty() {
            anyhow::bail!("drills.allowed_types cannot be empty");
        }

        let retention = &spec.retention;
        if !(retention.decay_rate > 0.0 && retention.decay_rate <= 1.0) {
            anyhow::bail!("retention.decay_rate must be within (0, 1], got {}", retention.decay_rate);
        }
        if retention.min_weight < 0.0 {
            anyhow::bail!("retention.min_weight cannot be negative");
        }
        if retention.max_age_days < 1 {
            anyhow::bail!("retention.max_age_days must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PracticeConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.drills.max_per_skill, 9);
        assert_eq!(config.spec.drills.max_per_skill_type, 3);
        assert_eq!(config.spec.retention.decay_rate, 0.95);
        assert_eq!(config.spec.dedup_threshold, 0.6);
        assert!(!config.spec.generation.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: skillforge/v1
kind: PracticeConfig
spec:
  storage:
    backend: in_memory
  drills:
    drills_per_skill: 2
    allowed_types: [fill-in-blank, critique]
"#;
        let config = PracticeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.spec.storage.backend, StorageBackend::InMemory);
        assert_eq!(config.spec.drills.drills_per_skill, 2);
        assert_eq!(config.spec.drills.allowed_types, vec![DrillType::FillInBlank, DrillType::Critique]);
        assert_eq!(config.spec.drills.target_floor, 12);
        assert_eq!(config.spec.generation.max_retries_per_attempt, 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PracticeConfig::default();
        config.kind = "NodeConfig".to_string();
        assert!(config.validate().is_err());

        let mut config = PracticeConfig::default();
        config.spec.retention.decay_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = PracticeConfig::default();
        config.spec.drills.allowed_types.clear();
        assert!(config.validate().is_err());

        let mut config = PracticeConfig::default();
        config.spec.generation.enabled = true;
        config.spec.generation.model.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = PracticeConfig::default();
        config.spec.drills.max_total = Some(20);
        config.to_yaml_file(&path).unwrap();

        let loaded = PracticeConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.drills.max_total, Some(20));
    }
}
