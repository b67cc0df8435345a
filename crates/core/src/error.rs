use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification shared by research, storage and delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigMissing,
    QuotaExhausted,
    TransientApi,
    Auth,
    MalformedResponse,
    Delivery,
    Storage,
    RunInProgress,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::QuotaExhausted => "quota_exhausted",
            ErrorKind::TransientApi => "transient_api",
            ErrorKind::Auth => "auth",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Delivery => "delivery",
            ErrorKind::Storage => "storage",
            ErrorKind::RunInProgress => "run_in_progress",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: ErrorKind,
    pub stage: &'static str,
    pub detail: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            detail: detail.into(),
        }
    }

    pub fn config_missing(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigMissing, "config", detail)
    }

    /// Wraps an `anyhow` chain, keeping the full context in the detail.
    pub fn from_anyhow(kind: ErrorKind, stage: &'static str, err: &anyhow::Error) -> Self {
        Self::new(kind, stage, format!("{err:#}"))
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (stage={}): {}", self.kind, self.stage, self.detail)
    }
}

impl std::error::Error for StageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_stage() {
        let err = StageError::new(ErrorKind::Auth, "gemini", "status=401");
        assert_eq!(err.to_string(), "auth (stage=gemini): status=401");
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let v = serde_json::to_value(ErrorKind::TransientApi).unwrap();
        assert_eq!(v, serde_json::json!("transient_api"));
    }
}
