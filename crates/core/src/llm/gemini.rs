use crate::config::Settings;
use crate::llm::error::{ModelCallError, ModelCallKind};
use crate::llm::{LlmClient, ModelVariant};
use anyhow::Context;
use serde::{Deserialize, Serialize};

const TEMPERATURE: f32 = 0.2;
const JSON_MIME_TYPE: &str = "application/json";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> anyhow::Result<Self> {
        // The guard owns the wall-clock timeout.
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = settings.gemini_api_key.clone() else {
            return Ok(None);
        };
        Self::new(api_key, settings.gemini_base_url.clone()).map(Some)
    }

    fn endpoint(&self, variant: &ModelVariant) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            variant.api_version.as_str(),
            variant.model
        )
    }

    fn request_body(variant: &ModelVariant, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: variant
                    .api_version
                    .supports_json_mime_type()
                    .then_some(JSON_MIME_TYPE),
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        }
    }

    fn response_text(body: &str) -> Result<String, ModelCallError> {
        let parsed = serde_json::from_str::<GenerateContentResponse>(body).map_err(|err| {
            ModelCallError::new(ModelCallKind::InvalidJson, "decode_response", err.to_string())
                .with_raw_output(body)
        })?;
        parsed
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|parts| parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ModelCallError::new(ModelCallKind::EmptyResponse, "decode_response", "no candidate text")
                    .with_raw_output(body)
            })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, variant: &ModelVariant, prompt: &str) -> Result<String, ModelCallError> {
        let res = self
            .http
            .post(self.endpoint(variant))
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(variant, prompt))
            .send()
            .await
            // The URL carries the API key.
            .map_err(|err| {
                ModelCallError::new(ModelCallKind::Transport, "http", err.without_url().to_string())
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| {
            ModelCallError::new(ModelCallKind::Transport, "read_body", err.without_url().to_string())
        })?;
        if !status.is_success() {
            let snippet: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ModelCallError::new(
                ModelCallKind::HttpStatus(status.as_u16()),
                "http",
                format!("status={status}"),
            )
            .with_raw_output(snippet));
        }
        Self::response_text(&text)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    generation_config: GenerationConfig,
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ApiVersion;
    use serde_json::json;

    #[test]
    fn beta_requests_force_json_output() {
        let beta = ModelVariant::new("gemini-flash-latest", ApiVersion::V1Beta);
        let body = serde_json::to_value(GeminiClient::request_body(&beta, "hi")).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], json!("application/json"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!("hi"));

        let v1 = ModelVariant::new("gemini-flash-latest", ApiVersion::V1);
        let body = serde_json::to_value(GeminiClient::request_body(&v1, "hi")).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn endpoint_includes_version_and_model() {
        let client = GeminiClient::new("k".to_string(), "https://gen.test/".to_string()).unwrap();
        let variant = ModelVariant::new("gemini-2.0-flash", ApiVersion::V1);
        assert_eq!(
            client.endpoint(&variant),
            "https://gen.test/v1/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "{\"a\":1}"}]}}]}).to_string();
        assert_eq!(GeminiClient::response_text(&body).unwrap(), "{\"a\":1}");

        let err = GeminiClient::response_text(r#"{"candidates": []}"#).unwrap_err();
        assert_eq!(err.kind, ModelCallKind::EmptyResponse);
        let err = GeminiClient::response_text("not json").unwrap_err();
        assert_eq!(err.kind, ModelCallKind::InvalidJson);
    }
}
