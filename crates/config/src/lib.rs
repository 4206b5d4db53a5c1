//! Configuration loading, validation, and management for textmill.
//!
//! Loads configuration from `textmill.toml` with environment variable
//! overrides. Validates all settings at load. The resulting [`AppConfig`]
//! is immutable for the duration of a run; the pipeline consumes it
//! read-only.

use serde::{Deserialize, Serialize};
use std::path::Path;
use textmill_core::{ConfigError, SamplingParams};

/// The root configuration structure.
///
/// Maps directly to `textmill.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the generation server.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Optional API password, passed through as a bearer credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_password: Option<String>,

    /// Directory holding prompt template files.
    #[serde(default = "default_templates_directory")]
    pub templates_directory: String,

    /// Name of the template file to use (without extension). When unset,
    /// the built-in instruct template is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Target language for the translate task.
    #[serde(default = "default_translation_language")]
    pub translation_language: String,

    /// Raw text-completion mode flag, passed through opaquely.
    #[serde(default)]
    pub text_completion: bool,

    /// Sampling parameters, passed through opaquely to the server.
    #[serde(default)]
    pub sampling: SamplingParams,
}

fn default_api_url() -> String {
    "http://localhost:5001".into()
}
fn default_templates_directory() -> String {
    "templates".into()
}
fn default_translation_language() -> String {
    "English".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_url", &self.api_url)
            .field("api_password", &redact(&self.api_password))
            .field("templates_directory", &self.templates_directory)
            .field("template", &self.template)
            .field("translation_language", &self.translation_language)
            .field("text_completion", &self.text_completion)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_password: None,
            templates_directory: default_templates_directory(),
            template: None,
            translation_language: default_translation_language(),
            text_completion: false,
            sampling: SamplingParams::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `textmill.toml` in the working directory.
    ///
    /// Environment variable overrides (highest priority):
    /// - `TEXTMILL_API_URL`
    /// - `TEXTMILL_API_PASSWORD`
    /// - `TEXTMILL_LANGUAGE`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("textmill.toml"))?;

        if let Ok(url) = std::env::var("TEXTMILL_API_URL") {
            config.api_url = url;
        }
        if let Ok(password) = std::env::var("TEXTMILL_API_PASSWORD") {
            config.api_password = Some(password);
        }
        if let Ok(language) = std::env::var("TEXTMILL_LANGUAGE") {
            config.translation_language = language;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            return Err(ConfigError::Invalid(
                "sampling.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling.top_p) {
            return Err(ConfigError::Invalid(
                "sampling.top_p must be between 0.0 and 1.0".into(),
            ));
        }
        if self.sampling.rep_pen < 1.0 {
            return Err(ConfigError::Invalid(
                "sampling.rep_pen must be at least 1.0".into(),
            ));
        }
        if self.translation_language.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "translation_language must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_url, "http://localhost:5001");
        assert_eq!(config.translation_language, "English");
        assert!(!config.text_completion);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/textmill.toml")).unwrap();
        assert_eq!(config.templates_directory, "templates");
    }

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = \"http://10.0.0.5:5001\"").unwrap();
        writeln!(file, "translation_language = \"German\"").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.api_url, "http://10.0.0.5:5001");
        assert_eq!(config.translation_language, "German");
        // Unspecified fields keep defaults
        assert!((config.sampling.temperature - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_invalid_temperature() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sampling]").unwrap();
        writeln!(file, "temperature = 3.5").unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = [not valid").unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = AppConfig {
            api_password: Some("hunter2".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
