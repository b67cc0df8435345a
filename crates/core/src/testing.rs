//! Scripted collaborators for unit tests.

use crate::clock::Clock;
use crate::config::{ConfigSnapshot, ConfigSource, Schedule};
use crate::domain::watchlist::WatchlistItem;
use crate::error::{ErrorKind, StageError};
use crate::llm::{GroundedAnswer, GroundedModel, Provider};
use crate::notify::{GmailCredentials, Mailer, OutgoingEmail};
use crate::pipeline::ClientFactory;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock whose `sleep` advances virtual time instantly.
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Local time in KST (+09:00).
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = kst
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap();
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + chrono::Duration::from_std(by).unwrap();
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Model that replays queued responses, then answers every further prompt successfully.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<GroundedAnswer, StageError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: &str, sources: &[&str]) {
        self.script.lock().unwrap().push_back(Ok(GroundedAnswer {
            text: text.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }));
    }

    pub fn push_err(&self, kind: ErrorKind, detail: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(StageError::new(kind, "scripted", detail)));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GroundedModel for ScriptedModel {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, prompt: &str) -> Result<GroundedAnswer, StageError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(GroundedAnswer {
                text: "- 기본 응답".to_string(),
                sources: vec!["https://example.com/default".to_string()],
            })
        })
    }
}

/// Mailer that records every message and replays queued failures.
#[derive(Default)]
pub struct RecordingMailer {
    script: Mutex<VecDeque<Result<(), StageError>>>,
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: Mutex<usize>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_err(&self, kind: ErrorKind, detail: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(StageError::new(kind, "scripted", detail)));
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(
        &self,
        email: &OutgoingEmail,
        _credentials: &GmailCredentials,
    ) -> Result<(), StageError> {
        *self.attempts.lock().unwrap() += 1;
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))?;
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct StaticConfig(pub Result<ConfigSnapshot, StageError>);

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<ConfigSnapshot, StageError> {
        self.0.clone()
    }
}

pub fn snapshot(watchlist: Vec<WatchlistItem>) -> ConfigSnapshot {
    ConfigSnapshot {
        api_key: "test-key".to_string(),
        credentials: GmailCredentials::new("digest@gmail.com", "abcd efgh ijkl mnop"),
        recipient: "digest@gmail.com".to_string(),
        watchlist,
        schedule: Schedule::default(),
        market_briefs: false,
    }
}

pub struct FakeClients {
    pub model: Arc<ScriptedModel>,
    pub mailer: Arc<RecordingMailer>,
}

impl FakeClients {
    pub fn new() -> Self {
        Self {
            model: Arc::new(ScriptedModel::new()),
            mailer: Arc::new(RecordingMailer::new()),
        }
    }
}

impl ClientFactory for FakeClients {
    fn research_model(&self, _api_key: &str) -> anyhow::Result<Arc<dyn GroundedModel>> {
        Ok(self.model.clone())
    }

    fn mailer(&self) -> anyhow::Result<Arc<dyn Mailer>> {
        Ok(self.mailer.clone())
    }
}
