pub mod error;
pub mod gemini;
pub mod guard;
pub mod json;
pub mod prompt;

use crate::llm::error::ModelCallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1Beta,
    V1,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1Beta => "v1beta",
            ApiVersion::V1 => "v1",
        }
    }

    /// Only the beta surface accepts a forced JSON response type.
    pub fn supports_json_mime_type(&self) -> bool {
        matches!(self, ApiVersion::V1Beta)
    }
}

/// A model name paired with the endpoint shape used to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariant {
    pub model: String,
    pub api_version: ApiVersion,
}

impl ModelVariant {
    pub fn new(model: impl Into<String>, api_version: ApiVersion) -> Self {
        Self {
            model: model.into(),
            api_version,
        }
    }

    /// Attempt order: primary on beta, fallback on beta, primary on v1.
    pub fn rotation(primary: &str, fallback: &str) -> Vec<Self> {
        vec![
            Self::new(primary, ApiVersion::V1Beta),
            Self::new(fallback, ApiVersion::V1Beta),
            Self::new(primary, ApiVersion::V1),
        ]
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the raw model text for `prompt`.
    async fn generate(&self, variant: &ModelVariant, prompt: &str) -> Result<String, ModelCallError>;
}
