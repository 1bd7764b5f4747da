use std::fmt;

use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// User-supplied evaluator credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Trim and accept a key; blank input yields `None`.
    #[must_use]
    pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluatorSettings {
    api_key: Option<ApiKey>,
    model: String,
    base_url: Url,
}

#[derive(Clone, Debug, Default)]
pub struct EvaluatorSettingsDraft {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluatorSettingsError {
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("base URL `{0}` must use http or https")]
    UnsupportedScheme(String),
}

impl EvaluatorSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft, filling unset values with defaults.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorSettingsError` if the base URL is present but invalid.
    pub fn validate(self) -> Result<EvaluatorSettings, EvaluatorSettingsError> {
        let api_key = self.api_key.as_deref().and_then(ApiKey::parse);
        let model = normalize_optional(self.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let raw_url =
            normalize_optional(self.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let base_url = Url::parse(raw_url.trim_end_matches('/'))
            .map_err(|_| EvaluatorSettingsError::InvalidBaseUrl(raw_url.clone()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(EvaluatorSettingsError::UnsupportedScheme(raw_url));
        }

        Ok(EvaluatorSettings {
            api_key,
            model,
            base_url,
        })
    }
}

impl EvaluatorSettings {
    #[must_use]
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
