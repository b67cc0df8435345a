pub mod gemini;
pub mod prompt;

use crate::error::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free text plus the ordered, de-duplicated source URLs the model grounded it on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<String>,
}

/// One search-grounded generation call. Errors come back already classified.
#[async_trait::async_trait]
pub trait GroundedModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, prompt: &str) -> Result<GroundedAnswer, StageError>;
}
