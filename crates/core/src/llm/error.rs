use crate::domain::recommendation::AiFallbackReason;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCallKind {
    Transport,
    HttpStatus(u16),
    EmptyResponse,
    InvalidJson,
    InvalidContract,
}

/// Full diagnostic for one failed model call. Only the reduced
/// [`AiFallbackReason`] ever leaves the process.
#[derive(Debug, Clone)]
pub struct ModelCallError {
    pub kind: ModelCallKind,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl ModelCallError {
    pub fn new(kind: ModelCallKind, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    pub fn fallback_reason(&self) -> AiFallbackReason {
        match self.kind {
            ModelCallKind::Transport => AiFallbackReason::RequestError,
            ModelCallKind::HttpStatus(429) => AiFallbackReason::Unavailable,
            ModelCallKind::HttpStatus(status) if (400..500).contains(&status) => {
                AiFallbackReason::RequestError
            }
            ModelCallKind::HttpStatus(_)
            | ModelCallKind::EmptyResponse
            | ModelCallKind::InvalidJson
            | ModelCallKind::InvalidContract => AiFallbackReason::Unavailable,
        }
    }

    /// Rate limiting is systemic; trying another variant will not help.
    pub fn aborts_retries(&self) -> bool {
        self.kind == ModelCallKind::HttpStatus(429)
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model call error (kind={:?}, stage={}): {}",
            self.kind, self.stage, self.detail
        )
    }
}

impl std::error::Error for ModelCallError {}
