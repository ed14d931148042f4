use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PrscopeError;
use crate::types::{
    CommentMode, ProviderKind, ReviewProfile, CONFIG_FILENAMES, DEFAULT_MAX_DIFF_BYTES,
    DEFAULT_MAX_FILES,
};

/// Top-level configuration loaded from `prscope.config.json`, `.prscopeRC.json`,
/// or `.prscope.toml`.
///
/// Keys are camelCase in both JSON and TOML. `provider`, `model`, and
/// `apiKeyEnv` are required; everything else has a default. Enumerated values
/// (provider, profile, comment mode) are rejected when unknown.
///
/// # Examples
///
/// ```
/// use prscope_core::{PrscopeConfig, ReviewProfile};
///
/// let config = PrscopeConfig::from_json(
///     r#"{"provider": "openai", "model": "gpt-4o", "apiKeyEnv": "OPENAI_API_KEY"}"#,
/// )
/// .unwrap();
/// assert_eq!(config.profile, ReviewProfile::Balanced);
/// assert_eq!(config.max_files, 30);
/// assert_eq!(config.max_diff_bytes, 100_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrscopeConfig {
    /// Model provider.
    pub provider: ProviderKind,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Custom base URL for the provider API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Review emphasis (default: balanced).
    #[serde(default)]
    pub profile: ReviewProfile,
    /// How results are posted (default: summary-only).
    #[serde(default)]
    pub comment_mode: CommentMode,
    /// Maximum number of files sent to the model (default: 30).
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Total diff byte budget across all files (default: 100000).
    #[serde(default = "default_max_diff_bytes")]
    pub max_diff_bytes: usize,
    /// Extra glob patterns to skip on top of the built-in noise filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_patterns: Vec<String>,
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_diff_bytes() -> usize {
    DEFAULT_MAX_DIFF_BYTES
}

impl PrscopeConfig {
    /// Build a config with defaults for everything but the required fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use prscope_core::{PrscopeConfig, ProviderKind};
    ///
    /// let config = PrscopeConfig::new(ProviderKind::Ollama, "llama3.1", "OLLAMA_API_KEY");
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(
        provider: ProviderKind,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key_env: api_key_env.into(),
            base_url: None,
            profile: ReviewProfile::default(),
            comment_mode: CommentMode::default(),
            max_files: DEFAULT_MAX_FILES,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            skip_patterns: Vec::new(),
        }
    }

    /// Load configuration from a file, choosing TOML or JSON by extension.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::FileNotFound`] if `path` does not exist,
    /// [`PrscopeError::Io`] if it cannot be read, a parse error if the content
    /// is malformed, or [`PrscopeError::Config`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, PrscopeError> {
        if !path.exists() {
            return Err(PrscopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Parse and validate configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Serialization`] if parsing fails or
    /// [`PrscopeError::Config`] if validation fails.
    pub fn from_json(content: &str) -> Result<Self, PrscopeError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Toml`] if parsing fails or
    /// [`PrscopeError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use prscope_core::{PrscopeConfig, ReviewProfile};
    ///
    /// let toml = r#"
    /// provider = "anthropic"
    /// model = "claude-sonnet-4-20250514"
    /// apiKeyEnv = "ANTHROPIC_API_KEY"
    /// profile = "strict"
    /// "#;
    /// let config = PrscopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.profile, ReviewProfile::Strict);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, PrscopeError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find and load the first config file from [`CONFIG_FILENAMES`] in `dir`.
    ///
    /// Returns `Ok(None)` when none of the files exist. A file that exists but
    /// fails to parse is an error rather than being skipped.
    pub fn discover(dir: &Path) -> Result<Option<(PathBuf, Self)>, PrscopeError> {
        for name in CONFIG_FILENAMES {
            let path = dir.join(name);
            if path.is_file() {
                let config = Self::from_file(&path)?;
                return Ok(Some((path, config)));
            }
        }
        Ok(None)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), PrscopeError> {
        if self.model.trim().is_empty() {
            return Err(PrscopeError::Config("model must not be empty".into()));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(PrscopeError::Config("apiKeyEnv must not be empty".into()));
        }
        if self.max_files == 0 {
            return Err(PrscopeError::Config("maxFiles must be positive".into()));
        }
        if self.max_diff_bytes == 0 {
            return Err(PrscopeError::Config("maxDiffBytes must be positive".into()));
        }
        for pattern in &self.skip_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                PrscopeError::Config(format!("invalid skip pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }

    /// Read the API key from the environment variable named by `api_key_env`.
    ///
    /// Empty values count as unset.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Values supplied outside the config file (CLI flags, action inputs).
///
/// Set fields win over the file config. When no file exists, a complete
/// config can still be built as long as provider, model, and apiKeyEnv are set.
///
/// # Examples
///
/// ```
/// use prscope_core::{ConfigOverrides, ProviderKind, PrscopeConfig};
///
/// let base = PrscopeConfig::new(ProviderKind::OpenAi, "gpt-4o", "OPENAI_API_KEY");
/// let overrides = ConfigOverrides {
///     max_files: Some(5),
///     ..ConfigOverrides::default()
/// };
/// let config = overrides.apply_to(base).unwrap();
/// assert_eq!(config.max_files, 5);
/// assert_eq!(config.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub profile: Option<ReviewProfile>,
    pub comment_mode: Option<CommentMode>,
    pub max_files: Option<usize>,
    pub max_diff_bytes: Option<usize>,
    /// Appended to the file config's patterns.
    pub skip_patterns: Vec<String>,
}

impl ConfigOverrides {
    /// Layer these overrides on top of `base` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Config`] if the merged config is invalid.
    pub fn apply_to(self, mut base: PrscopeConfig) -> Result<PrscopeConfig, PrscopeError> {
        if let Some(provider) = self.provider {
            base.provider = provider;
        }
        if let Some(model) = self.model {
            base.model = model;
        }
        if let Some(api_key_env) = self.api_key_env {
            base.api_key_env = api_key_env;
        }
        if let Some(base_url) = self.base_url {
            base.base_url = Some(base_url);
        }
        if let Some(profile) = self.profile {
            base.profile = profile;
        }
        if let Some(mode) = self.comment_mode {
            base.comment_mode = mode;
        }
        if let Some(max_files) = self.max_files {
            base.max_files = max_files;
        }
        if let Some(max_diff_bytes) = self.max_diff_bytes {
            base.max_diff_bytes = max_diff_bytes;
        }
        base.skip_patterns.extend(self.skip_patterns);
        base.validate()?;
        Ok(base)
    }

    /// Build a config from overrides alone, for runs without a config file.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Config`] unless provider and model are set, or
    /// if the resulting config is invalid. A missing apiKeyEnv falls back to
    /// [`ProviderKind::default_api_key_env`].
    pub fn into_config(self) -> Result<PrscopeConfig, PrscopeError> {
        let (Some(provider), Some(model)) = (self.provider, self.model.clone()) else {
            return Err(PrscopeError::Config(format!(
                "no config found; create {} or pass a provider and model",
                CONFIG_FILENAMES.join(" / ")
            )));
        };
        let api_key_env = self
            .api_key_env
            .clone()
            .unwrap_or_else(|| provider.default_api_key_env().to_string());
        self.apply_to(PrscopeConfig::new(provider, model, api_key_env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str =
        r#"{"provider": "openai", "model": "gpt-4o", "apiKeyEnv": "OPENAI_API_KEY"}"#;

    #[test]
    fn minimal_json_gets_defaults() {
        let config = PrscopeConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.profile, ReviewProfile::Balanced);
        assert_eq!(config.comment_mode, CommentMode::SummaryOnly);
        assert_eq!(config.max_files, 30);
        assert_eq!(config.max_diff_bytes, 100_000);
        assert!(config.base_url.is_none());
        assert!(config.skip_patterns.is_empty());
    }

    #[test]
    fn full_json_parses() {
        let json = r#"{
            "provider": "openai-compat",
            "model": "qwen2.5-coder",
            "apiKeyEnv": "LMSTUDIO_KEY",
            "baseUrl": "http://localhost:1234",
            "profile": "performance",
            "commentMode": "inline+summary",
            "maxFiles": 10,
            "maxDiffBytes": 50000,
            "skipPatterns": ["fixtures/**"]
        }"#;
        let config = PrscopeConfig::from_json(json).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAiCompat);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(config.profile, ReviewProfile::Performance);
        assert_eq!(config.comment_mode, CommentMode::InlineAndSummary);
        assert_eq!(config.max_files, 10);
        assert_eq!(config.skip_patterns, vec!["fixtures/**"]);
    }

    #[test]
    fn missing_required_fields_rejected() {
        assert!(PrscopeConfig::from_json(r#"{"provider": "openai"}"#).is_err());
        assert!(PrscopeConfig::from_json("{}").is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let json = r#"{"provider": "grok", "model": "x", "apiKeyEnv": "KEY"}"#;
        assert!(PrscopeConfig::from_json(json).is_err());
    }

    #[test]
    fn unknown_profile_rejected_not_defaulted() {
        let json = r#"{"provider": "openai", "model": "x", "apiKeyEnv": "KEY", "profile": "paranoid"}"#;
        assert!(PrscopeConfig::from_json(json).is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let json = r#"{"provider": "openai", "model": "x", "apiKeyEnv": "KEY", "maxFiles": 0}"#;
        let err = PrscopeConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("maxFiles"));
    }

    #[test]
    fn empty_model_rejected() {
        let json = r#"{"provider": "openai", "model": "", "apiKeyEnv": "KEY"}"#;
        assert!(PrscopeConfig::from_json(json).is_err());
    }

    #[test]
    fn invalid_skip_pattern_rejected() {
        let mut config = PrscopeConfig::new(ProviderKind::Ollama, "llama3.1", "KEY");
        config.skip_patterns.push("[unclosed".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn toml_and_json_agree() {
        let toml = r#"
provider = "openai"
model = "gpt-4o"
apiKeyEnv = "OPENAI_API_KEY"
"#;
        assert_eq!(
            PrscopeConfig::from_toml(toml).unwrap(),
            PrscopeConfig::from_json(MINIMAL).unwrap()
        );
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(PrscopeConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn discover_prefers_first_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".prscopeRC.json"), MINIMAL).unwrap();
        std::fs::write(
            dir.path().join("prscope.config.json"),
            r#"{"provider": "ollama", "model": "llama3.1", "apiKeyEnv": "NONE"}"#,
        )
        .unwrap();
        let (path, config) = PrscopeConfig::discover(dir.path()).unwrap().unwrap();
        assert!(path.ends_with("prscope.config.json"));
        assert_eq!(config.provider, ProviderKind::Ollama);
    }

    #[test]
    fn discover_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".prscope.toml"),
            "provider = \"anthropic\"\nmodel = \"claude\"\napiKeyEnv = \"ANTHROPIC_API_KEY\"\n",
        )
        .unwrap();
        let (_, config) = PrscopeConfig::discover(dir.path()).unwrap().unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
    }

    #[test]
    fn discover_without_files_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PrscopeConfig::discover(dir.path()).unwrap().is_none());
    }

    #[test]
    fn discover_surfaces_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prscope.config.json"), "{ not json").unwrap();
        assert!(PrscopeConfig::discover(dir.path()).is_err());
    }

    #[test]
    fn from_file_missing_path() {
        let err = PrscopeConfig::from_file(Path::new("/nonexistent/prscope.config.json"))
            .unwrap_err();
        assert!(matches!(err, PrscopeError::FileNotFound(_)));
    }

    #[test]
    fn overrides_win_over_file() {
        let base = PrscopeConfig::from_json(MINIMAL).unwrap();
        let overrides = ConfigOverrides {
            model: Some("gpt-4o-mini".into()),
            profile: Some(ReviewProfile::Security),
            skip_patterns: vec!["*.snap.ts".into()],
            ..ConfigOverrides::default()
        };
        let config = overrides.apply_to(base).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.profile, ReviewProfile::Security);
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.skip_patterns, vec!["*.snap.ts"]);
    }

    #[test]
    fn overrides_alone_need_provider_and_model() {
        let partial = ConfigOverrides {
            provider: Some(ProviderKind::OpenAi),
            ..ConfigOverrides::default()
        };
        assert!(partial.into_config().is_err());

        let complete = ConfigOverrides {
            provider: Some(ProviderKind::Anthropic),
            model: Some("claude-sonnet-4-20250514".into()),
            ..ConfigOverrides::default()
        };
        let config = complete.into_config().unwrap();
        assert_eq!(config.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.max_files, 30);

        let explicit = ConfigOverrides {
            provider: Some(ProviderKind::OpenAiCompat),
            model: Some("local".into()),
            api_key_env: Some("MY_KEY".into()),
            ..ConfigOverrides::default()
        };
        assert_eq!(explicit.into_config().unwrap().api_key_env, "MY_KEY");
    }

    #[test]
    fn overrides_are_validated() {
        let base = PrscopeConfig::from_json(MINIMAL).unwrap();
        let overrides = ConfigOverrides {
            max_diff_bytes: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(overrides.apply_to(base).is_err());
    }

    #[test]
    fn api_key_reads_named_env_var() {
        let config = PrscopeConfig::new(
            ProviderKind::OpenAi,
            "gpt-4o",
            "PRSCOPE_TEST_SURELY_UNSET_KEY",
        );
        assert!(config.api_key().is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let config = PrscopeConfig::from_json(MINIMAL).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["apiKeyEnv"], "OPENAI_API_KEY");
        assert_eq!(json["maxDiffBytes"], 100_000);
        assert_eq!(json["commentMode"], "summary-only");
        assert!(json.get("baseUrl").is_none());
    }
}
