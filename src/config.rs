//! Agent configuration
//!
//! A single immutable [`AgentConfig`] is built at process start from
//! defaults, an optional TOML file and environment overrides, then handed to
//! every call session.

use crate::{Result, VoiceChatError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Model that does not reliably use the end-call tool and is told to say
/// "Goodbye!" instead
pub const GOODBYE_PROMPT_MODEL: &str = "gemini-2.5-flash-lite";

/// Default Gemini REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_AGENT_PROMPT: &str = "You are an emotional support helper named Samantha. You are warm, empathetic, and a good listener. Your goal is to provide comfort, understanding, and support to users who are going through difficult times. Focus on active listening, validating feelings, and offering gentle encouragement. Do not offer medical advice or professional therapy.";

const DEFAULT_INITIAL_MESSAGE: &str = "Hello there. I'm Samantha, and I'm here to listen and offer support if you need it. How are you feeling today?";

/// Configuration for the voice agent
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the provider
    pub model_id: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Thinking token budget (0 = disabled)
    pub thinking_budget: i32,

    /// Persona text placed at the top of the system prompt
    pub agent_prompt: String,

    /// Location mentioned in the context block and greeting
    pub location: String,

    /// Greeting template spoken when the call starts.
    /// Supports `{current_date}` and `{current_location}`.
    pub initial_message: Option<String>,

    /// Maximum number of conversation turns kept per call
    pub max_context_length: usize,

    /// Base URL of the Gemini API
    pub api_base_url: String,

    /// Connect timeout for the HTTP client, in seconds
    pub connect_timeout_secs: u64,

    /// Provider API key, only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_id: GOODBYE_PROMPT_MODEL.to_string(),
            temperature: 0.7,
            thinking_budget: 0,
            agent_prompt: DEFAULT_AGENT_PROMPT.to_string(),
            location: "San Francisco, California".to_string(),
            initial_message: Some(DEFAULT_INITIAL_MESSAGE.to_string()),
            max_context_length: 100,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            api_key: None,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("thinking_budget", &self.thinking_budget)
            .field("location", &self.location)
            .field("initial_message", &self.initial_message)
            .field("max_context_length", &self.max_context_length)
            .field("api_base_url", &self.api_base_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl AgentConfig {
    /// Create a configuration for the specified model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text; absent keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| VoiceChatError::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VoiceChatError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("VOICE_CHAT_MODEL").filter(|v| !v.is_empty()) {
            self.model_id = model;
        }

        let key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.is_empty())
            .or_else(|| lookup("GOOGLE_API_KEY").filter(|v| !v.is_empty()));
        if key.is_some() {
            self.api_key = key;
        }

        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the thinking budget
    pub fn with_thinking_budget(mut self, budget: i32) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Set the persona text
    pub fn with_agent_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.agent_prompt = prompt.into();
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set or clear the greeting template
    pub fn with_initial_message(mut self, message: Option<String>) -> Self {
        self.initial_message = message;
        self
    }

    /// Set the maximum number of conversation turns
    pub fn with_max_context_length(mut self, max: usize) -> Self {
        self.max_context_length = max;
        self
    }

    /// Point the client at a different API host
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Whether the model ends calls by saying "Goodbye!" rather than calling
    /// the end-call tool
    pub fn uses_goodbye_prompt(&self) -> bool {
        self.model_id == GOODBYE_PROMPT_MODEL
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(VoiceChatError::ConfigError("model_id is empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(VoiceChatError::ConfigError(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }

        if self.max_context_length == 0 {
            return Err(VoiceChatError::ConfigError(
                "max_context_length must be at least 1".to_string(),
            ));
        }

        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(VoiceChatError::ConfigError(
                "GEMINI_API_KEY or GOOGLE_API_KEY must be set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.model_id, "gemini-2.5-flash-lite");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.thinking_budget, 0);
        assert_eq!(config.max_context_length, 100);
        assert_eq!(config.location, "San Francisco, California");
        assert!(config.initial_message.is_some());
        assert!(config.uses_goodbye_prompt());
    }

    #[test]
    fn test_builder_pattern() {
        let config = AgentConfig::new("gemini-2.5-flash")
            .with_temperature(0.3)
            .with_location("Berlin")
            .with_initial_message(None)
            .with_max_context_length(10);

        assert_eq!(config.model_id, "gemini-2.5-flash");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.location, "Berlin");
        assert!(config.initial_message.is_none());
        assert_eq!(config.max_context_length, 10);
        assert!(!config.uses_goodbye_prompt());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            model_id = "gemini-2.5-flash"
            location = "Lisbon, Portugal"
            "#,
        )
        .unwrap();

        assert_eq!(config.model_id, "gemini-2.5-flash");
        assert_eq!(config.location, "Lisbon, Portugal");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_context_length, 100);
    }

    #[test]
    fn test_invalid_toml() {
        let err = AgentConfig::from_toml_str("temperature = \"hot\"").unwrap_err();
        assert!(matches!(err, VoiceChatError::ConfigError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temperature = 0.2").unwrap();
        writeln!(file, "max_context_length = 20").unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_context_length, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AgentConfig::load("/nonexistent/voice-chat.toml").unwrap_err();
        assert!(matches!(err, VoiceChatError::ConfigError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VOICE_CHAT_MODEL", "gemini-2.5-pro"),
            ("GOOGLE_API_KEY", "google-key"),
        ]
        .into_iter()
        .collect();

        let config =
            AgentConfig::default().apply_env_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.model_id, "gemini-2.5-pro");
        assert_eq!(config.api_key.as_deref(), Some("google-key"));
    }

    #[test]
    fn test_gemini_key_takes_precedence() {
        let vars: HashMap<&str, &str> = [("GEMINI_API_KEY", "gemini-key"), ("GOOGLE_API_KEY", "g")]
            .into_iter()
            .collect();

        let config =
            AgentConfig::default().apply_env_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("gemini-key"));
    }

    #[test]
    fn test_validate() {
        assert!(AgentConfig::default().validate().is_err());
        assert!(AgentConfig::default().with_api_key("k").validate().is_ok());
        assert!(AgentConfig::default()
            .with_api_key("k")
            .with_temperature(3.5)
            .validate()
            .is_err());
        assert!(AgentConfig::default()
            .with_api_key("k")
            .with_max_context_length(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AgentConfig::default().with_api_key("secret-value");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-value"));
        assert!(printed.contains("<redacted>"));
    }
}
