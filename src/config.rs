use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{AssistantError, Result};
use crate::pagination::PaginationPolicy;
use crate::synth::SynthesisMode;

const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_OPENAI_API_KEY";

/// Main configuration structure for the case-law assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub judilibre: JudilibreConfig,
    pub openai: OpenAIConfig,
    pub extraction: ExtractionConfig,
    pub search: SearchConfig,
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudilibreConfig {
    pub auth_url: String,
    pub search_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    /// Alternative OpenAI-compatible endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Prefix each summary with the decision number
    pub include_record_number: bool,
    pub pagination: PaginationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub mode: SynthesisMode,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Applies to opening the stream and to the wait between increments
    pub timeout_seconds: u64,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!(
                "No .env file found in any expected location - continuing with env vars only"
            );
        }

        let config_path =
            env::var("JUDILIBRE_CHAT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    ///
    /// The preset is applied between the connection and pipeline overrides, so
    /// `JUDILIBRE_CHAT_MAX_PAGES` and `JUDILIBRE_CHAT_MODE` refine a preset instead of being
    /// replaced by it.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_connection_overrides(&lookup);
        self.apply_pipeline_preset();
        self.apply_pipeline_overrides(&lookup);
    }

    fn apply_connection_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // PISTE / Judilibre
        if let Some(id) = lookup("PISTE_CLIENT_ID") {
            self.judilibre.client_id = id;
        }
        if let Some(secret) = lookup("PISTE_CLIENT_SECRET") {
            self.judilibre.client_secret = secret;
        }
        if let Some(url) = lookup("JUDILIBRE_AUTH_URL") {
            self.judilibre.auth_url = url;
        }
        if let Some(url) = lookup("JUDILIBRE_SEARCH_URL") {
            self.judilibre.search_url = url;
        }

        // OpenAI
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = api_key;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.openai.base_url = Some(base_url);
        }

        if let Some(preset) = lookup("JUDILIBRE_CHAT_PRESET") {
            self.preset = Some(preset);
        }
    }

    fn apply_pipeline_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(max) = lookup("JUDILIBRE_CHAT_MAX_PAGES") {
            match max.parse() {
                Ok(max_pages) => {
                    self.search.pagination = self.search.pagination.clone().with_max_pages(max_pages)
                }
                Err(e) => tracing::warn!("Ignoring JUDILIBRE_CHAT_MAX_PAGES={}: {}", max, e),
            }
        }
        if let Some(mode) = lookup("JUDILIBRE_CHAT_MODE") {
            match mode.to_lowercase().as_str() {
                "cluster" => self.synthesis.mode = SynthesisMode::Cluster,
                "answer" => self.synthesis.mode = SynthesisMode::Answer,
                other => tracing::warn!("Unknown synthesis mode: {}", other),
            }
        }
    }

    fn apply_pipeline_preset(&mut self) {
        if let Some(ref preset_raw) = self.preset {
            let preset = preset_raw.to_lowercase();
            match preset.as_str() {
                // One page, bare summaries, thematic clustering
                "simple" => {
                    self.search.pagination = PaginationPolicy::SinglePage;
                    self.search.include_record_number = false;
                    self.synthesis.mode = SynthesisMode::Cluster;
                }
                // Two pages by score, numbered summaries, direct grounded answer
                "detailed" => {
                    self.search.pagination = PaginationPolicy::bounded_default();
                    self.search.include_record_number = true;
                    self.synthesis.mode = SynthesisMode::Answer;
                    self.synthesis.temperature = Some(0.0);
                }
                other => {
                    tracing::warn!("Unknown pipeline preset: {}. Using existing settings.", other);
                    return;
                }
            }
            tracing::info!(
                "Applied pipeline preset '{}': pagination={:?}, include_record_number={}, mode={:?}",
                preset,
                self.search.pagination,
                self.search.include_record_number,
                self.synthesis.mode
            );
        }
    }

    /// Validate configuration
    fn validate(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.judilibre.client_id.is_empty() || self.judilibre.client_secret.is_empty() {
            return Err("PISTE_CLIENT_ID and PISTE_CLIENT_SECRET must be set".into());
        }
        if self.judilibre.timeout_seconds == 0
            || self.extraction.timeout_seconds == 0
            || self.synthesis.timeout_seconds == 0
        {
            return Err("Timeouts must be greater than 0 seconds".into());
        }
        if let PaginationPolicy::BoundedMultiPage {
            max_pages,
            page_size,
            ..
        } = &self.search.pagination
        {
            if *max_pages == 0 {
                return Err("pagination.max_pages cannot be 0".into());
            }
            if *page_size == 0 {
                return Err("pagination.page_size cannot be 0".into());
            }
        }
        for (name, val) in [
            ("extraction.temperature", Some(self.extraction.temperature)),
            ("synthesis.temperature", self.synthesis.temperature),
        ] {
            if let Some(val) = val {
                if !(0.0..=2.0).contains(&val) {
                    return Err(format!("{name} must be between 0.0 and 2.0").into());
                }
            }
        }
        if self.openai.api_key.is_empty() || self.openai.api_key == PLACEHOLDER_API_KEY {
            return Err("OPENAI_API_KEY environment variable must be set".into());
        }
        Ok(())
    }

    /// The model API key, or `MissingApiKey` when none was provided
    pub fn openai_api_key(&self) -> Result<&str> {
        let key = self.openai.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            return Err(AssistantError::MissingApiKey);
        }
        Ok(key)
    }

    pub fn judilibre_timeout(&self) -> Duration {
        Duration::from_secs(self.judilibre.timeout_seconds)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_seconds)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judilibre: JudilibreConfig {
                auth_url: "https://oauth.piste.gouv.fr/api/oauth/token".to_string(),
                search_url: "https://api.piste.gouv.fr/cassation/judilibre/v1.0/search"
                    .to_string(),
                client_id: String::new(),
                client_secret: String::new(),
                timeout_seconds: 30,
            },
            openai: OpenAIConfig {
                api_key: PLACEHOLDER_API_KEY.to_string(),
                model: "gpt-4o-mini".to_string(),
                base_url: None,
            },
            extraction: ExtractionConfig {
                temperature: 0.0,
                timeout_seconds: 30,
            },
            search: SearchConfig {
                include_record_number: false,
                pagination: PaginationPolicy::SinglePage,
            },
            synthesis: SynthesisConfig {
                mode: SynthesisMode::Cluster,
                temperature: Some(0.0),
                timeout_seconds: 60,
            },
            preset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_api_key_is_missing() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.openai_api_key(),
            Err(AssistantError::MissingApiKey)
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PISTE_CLIENT_ID", "id"),
            ("PISTE_CLIENT_SECRET", "secret"),
            ("JUDILIBRE_CHAT_MODE", "answer"),
        ]));
        assert_eq!(cfg.openai_api_key().unwrap(), "sk-test");
        assert_eq!(cfg.judilibre.client_id, "id");
        assert_eq!(cfg.judilibre.client_secret, "secret");
        assert_eq!(cfg.synthesis.mode, SynthesisMode::Answer);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_max_pages_override_on_bounded_policy() {
        let mut cfg = Config::default();
        cfg.search.pagination = PaginationPolicy::bounded_default();
        cfg.apply_overrides(lookup_from(&[("JUDILIBRE_CHAT_MAX_PAGES", "3")]));
        assert_eq!(cfg.search.pagination.max_pages(), 3);
    }

    #[test]
    fn test_detailed_preset() {
        let mut cfg = Config::default();
        cfg.preset = Some("Detailed".to_string());
        cfg.apply_pipeline_preset();
        assert_eq!(cfg.search.pagination, PaginationPolicy::bounded_default());
        assert!(cfg.search.include_record_number);
        assert_eq!(cfg.synthesis.mode, SynthesisMode::Answer);
        assert_eq!(cfg.synthesis.temperature, Some(0.0));
    }

    #[test]
    fn test_simple_preset_overrides_prior_settings() {
        let mut cfg = Config::default();
        cfg.search.include_record_number = true;
        cfg.synthesis.mode = SynthesisMode::Answer;
        cfg.preset = Some("simple".to_string());
        cfg.apply_pipeline_preset();
        assert_eq!(cfg.search.pagination, PaginationPolicy::SinglePage);
        assert!(!cfg.search.include_record_number);
        assert_eq!(cfg.synthesis.mode, SynthesisMode::Cluster);
    }

    #[test]
    fn test_pipeline_overrides_refine_the_preset() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("JUDILIBRE_CHAT_PRESET", "detailed"),
            ("JUDILIBRE_CHAT_MAX_PAGES", "3"),
            ("JUDILIBRE_CHAT_MODE", "cluster"),
        ]));
        assert_eq!(cfg.preset.as_deref(), Some("detailed"));
        assert_eq!(cfg.search.pagination.max_pages(), 3);
        assert!(cfg.search.include_record_number);
        assert_eq!(cfg.synthesis.mode, SynthesisMode::Cluster);
    }

    #[test]
    fn test_yaml_roundtrip_of_pagination_section() {
        let yaml = r#"
judilibre:
  auth_url: "https://auth.example"
  search_url: "https://search.example"
  client_id: "id"
  client_secret: "secret"
  timeout_seconds: 10
openai:
  api_key: "sk-yaml"
  model: "gpt-4o-mini"
extraction:
  temperature: 0.0
  timeout_seconds: 10
search:
  include_record_number: true
  pagination:
    policy: bounded_multi_page
    max_pages: 2
    page_size: 50
    sort: score
synthesis:
  mode: answer
  timeout_seconds: 20
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("yaml config should parse");
        assert_eq!(cfg.search.pagination, PaginationPolicy::bounded_default());
        assert_eq!(cfg.synthesis.temperature, None);
        assert_eq!(cfg.openai.base_url, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max_pages() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PISTE_CLIENT_ID", "id"),
            ("PISTE_CLIENT_SECRET", "secret"),
        ]));
        cfg.search.pagination = PaginationPolicy::BoundedMultiPage {
            max_pages: 0,
            page_size: 50,
            sort: "score".to_string(),
        };
        assert!(cfg.validate().is_err());
    }
}
