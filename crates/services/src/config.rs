use std::env;

use assess_core::model::{ApiKey, EvaluatorSettings, EvaluatorSettingsDraft, EvaluatorSettingsError};
use serde::Serialize;

pub const ENV_API_KEY: &str = "ASSESS_AI_API_KEY";
pub const ENV_BASE_URL: &str = "ASSESS_AI_BASE_URL";
pub const ENV_MODEL: &str = "ASSESS_AI_MODEL";

/// Fixed sampling parameters sent with every evaluation request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    settings: EvaluatorSettings,
    generation: GenerationConfig,
}

impl EvaluatorConfig {
    #[must_use]
    pub fn new(settings: EvaluatorSettings) -> Self {
        Self {
            settings,
            generation: GenerationConfig::default(),
        }
    }

    /// Read `ASSESS_AI_API_KEY`, `ASSESS_AI_BASE_URL` and `ASSESS_AI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorSettingsError` when the base URL is set but invalid.
    pub fn from_env() -> Result<Self, EvaluatorSettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EvaluatorConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorSettingsError` when the base URL is set but invalid.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EvaluatorSettingsError> {
        let settings = EvaluatorSettingsDraft {
            api_key: lookup(ENV_API_KEY),
            model: lookup(ENV_MODEL),
            base_url: lookup(ENV_BASE_URL),
        }
        .validate()?;
        Ok(Self::new(settings))
    }

    #[must_use]
    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    #[must_use]
    pub fn generation(&self) -> GenerationConfig {
        self.generation
    }

    /// Key configured in the environment, used to pre-fill a session credential.
    #[must_use]
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.settings.api_key()
    }
}
