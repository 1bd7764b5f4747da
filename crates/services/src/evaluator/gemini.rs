use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use assess_core::model::{EvaluatorSettingsError, Score};

use super::{Evaluation, EvaluationRequest, Evaluator, build_prompt};
use crate::config::{EvaluatorConfig, GenerationConfig};
use crate::error::EvaluatorError;

/// Decoded `{score, justification}` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: Score,
    pub justification: String,
}

/// Generative-language API adapter.
#[derive(Clone)]
pub struct GeminiEvaluator {
    client: Client,
    config: EvaluatorConfig,
}

impl GeminiEvaluator {
    /// Build from `ASSESS_AI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorSettingsError` when the configured base URL is invalid.
    pub fn from_env() -> Result<Self, EvaluatorSettingsError> {
        Ok(Self::new(EvaluatorConfig::from_env()?))
    }

    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        let settings = self.config.settings();
        format!(
            "{}/models/{}:generateContent",
            settings.base_url().as_str().trim_end_matches('/'),
            settings.model()
        )
    }

    /// Issue one scoring request and decode the verdict.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorError` when the credential is missing, the request fails,
    /// or the response cannot be decoded into a verdict.
    pub async fn request_verdict(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Verdict, EvaluatorError> {
        let credential = request
            .credential
            .as_ref()
            .ok_or(EvaluatorError::MissingCredential)?;

        let payload = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![GeneratePart {
                    text: build_prompt(request),
                }],
            }],
            generation_config: self.config.generation(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", credential.expose())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EvaluatorError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let decoded: GenerateResponse =
            serde_json::from_str(&body).map_err(EvaluatorError::Decode)?;
        let text = decoded
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(EvaluatorError::EmptyResponse)?;

        decode_verdict(&text)
    }
}

#[async_trait]
impl Evaluator for GeminiEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        match self.request_verdict(request).await {
            Ok(verdict) => Evaluation::scored(verdict.score, verdict.justification),
            Err(EvaluatorError::MissingCredential) => {
                tracing::warn!(item_id = %request.item_id, "evaluation skipped: no API key");
                Evaluation::missing_credential()
            }
            Err(err) if err.is_transport() => {
                tracing::warn!(item_id = %request.item_id, error = %err, "evaluation request failed");
                Evaluation::transport_failed()
            }
            Err(err) => {
                tracing::warn!(item_id = %request.item_id, error = %err, "evaluation response malformed");
                Evaluation::malformed()
            }
        }
    }
}

/// Remove a surrounding fenced code block (```` ```json ... ``` ````) if present.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Strictly decode the model's text into a [`Verdict`].
///
/// Scores outside 0..=10 are clamped and fractional scores rounded.
///
/// # Errors
///
/// Returns `EvaluatorError::InvalidVerdict` when the text is not the expected
/// JSON object, and `EvaluatorError::NonNumericScore` when `score` is not a number.
pub fn decode_verdict(text: &str) -> Result<Verdict, EvaluatorError> {
    let raw: RawVerdict =
        serde_json::from_str(strip_code_fence(text)).map_err(EvaluatorError::InvalidVerdict)?;

    let value = match raw.score.as_i64() {
        Some(v) => v,
        None => {
            let float = raw
                .score
                .as_f64()
                .filter(|f| f.is_finite())
                .ok_or(EvaluatorError::NonNumericScore)?;
            // Float-to-int `as` saturates, which the clamp below relies on.
            #[allow(clippy::cast_possible_truncation)]
            let rounded = float.round() as i64;
            rounded
        }
    };

    let (score, clamped) = Score::clamped(value);
    if clamped {
        tracing::warn!(raw_score = value, clamped = score.value(), "evaluator score out of range");
    }

    Ok(Verdict {
        score,
        justification: raw.justification.trim().to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Serialize)]
struct GeneratePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: serde_json::Number,
    justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"score\": 8, \"justification\": \"ok\"}\n```";
        assert_eq!(strip_code_fence(text), "{\"score\": 8, \"justification\": \"ok\"}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }

    #[test]
    fn single_line_fence_drops_info_string() {
        assert_eq!(strip_code_fence("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");

        let verdict =
            decode_verdict(r#"```json {"score": 8, "justification": "ok"}```"#).unwrap();
        assert_eq!(verdict.score.value(), 8);
    }

    #[test]
    fn decodes_plain_and_fenced_verdicts() {
        let plain = decode_verdict(r#"{"score": 7, "justification": " fine "}"#).unwrap();
        assert_eq!(plain.score.value(), 7);
        assert_eq!(plain.justification, "fine");

        let fenced =
            decode_verdict("```json\n{\"score\": 9, \"justification\": \"great\"}\n```").unwrap();
        assert_eq!(fenced.score.value(), 9);
    }

    #[test]
    fn clamps_and_rounds_scores() {
        assert_eq!(
            decode_verdict(r#"{"score": 42, "justification": "x"}"#).unwrap().score,
            Score::MAX
        );
        assert_eq!(
            decode_verdict(r#"{"score": -2, "justification": "x"}"#).unwrap().score,
            Score::MIN
        );
        assert_eq!(
            decode_verdict(r#"{"score": 6.5, "justification": "x"}"#)
                .unwrap()
                .score
                .value(),
            7
        );
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(matches!(
            decode_verdict("The answer deserves an 8."),
            Err(EvaluatorError::InvalidVerdict(_))
        ));
        assert!(matches!(
            decode_verdict(r#"{"score": "8", "justification": "x"}"#),
            Err(EvaluatorError::InvalidVerdict(_))
        ));
        assert!(matches!(
            decode_verdict(r#"{"score": 8}"#),
            Err(EvaluatorError::InvalidVerdict(_))
        ));
    }

    #[test]
    fn endpoint_includes_model() {
        let config = EvaluatorConfig::from_lookup(|_| None).unwrap();
        let evaluator = GeminiEvaluator::new(config);
        assert_eq!(
            evaluator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }
}
