use crate::clock::Clock;
use crate::config::{ConfigSnapshot, ConfigSource};
use crate::domain::report::{BriefKind, DeliveryStatus, Report, RunId};
use crate::error::{ErrorKind, StageError};
use crate::llm::gemini::{GeminiClient, GeminiOptions};
use crate::llm::GroundedModel;
use crate::notify::smtp::{SmtpMailer, SmtpOptions};
use crate::notify::{Mailer, NotificationDispatcher};
use crate::report::ReportAssembler;
use crate::research::{Quota, RateLimiter, ResearchClient, RetryPolicy};
use crate::storage::deliveries::DeliveryLog;
use crate::storage::lock::RunLock;
use crate::storage::reports::ReportStore;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LoadingConfig,
    CheckingExistingReport,
    Assembling,
    Storing,
    Dispatching,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, LoadingConfig)
                | (LoadingConfig, CheckingExistingReport)
                | (CheckingExistingReport, Assembling)
                | (CheckingExistingReport, Dispatching)
                | (Assembling, Storing)
                | (Storing, Dispatching)
                | (Dispatching, Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Builds the network clients once credentials are known.
pub trait ClientFactory: Send + Sync {
    fn research_model(&self, api_key: &str) -> anyhow::Result<Arc<dyn GroundedModel>>;

    fn mailer(&self) -> anyhow::Result<Arc<dyn Mailer>>;
}

#[derive(Debug, Clone, Default)]
pub struct LiveClients {
    pub gemini: GeminiOptions,
    pub smtp: SmtpOptions,
}

impl ClientFactory for LiveClients {
    fn research_model(&self, api_key: &str) -> anyhow::Result<Arc<dyn GroundedModel>> {
        Ok(Arc::new(GeminiClient::new(api_key, self.gemini.clone())?))
    }

    fn mailer(&self) -> anyhow::Result<Arc<dyn Mailer>> {
        Ok(Arc::new(SmtpMailer::new(self.smtp.clone())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub state: RunState,
    /// Every state entered, in order.
    pub path: Vec<RunState>,
    pub items: usize,
    pub succeeded: usize,
    pub delivery: Option<DeliveryStatus>,
    pub reused_report: bool,
    pub error: Option<StageError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    fn log(&self) {
        let delivery = self
            .delivery
            .map(|d| d.to_string())
            .unwrap_or_else(|| "not_attempted".to_string());
        match &self.error {
            None => tracing::info!(
                run_id = %self.run_id,
                state = %self.state,
                items = self.items,
                succeeded = self.succeeded,
                delivery = %delivery,
                reused_report = self.reused_report,
                "run finished"
            ),
            Some(err) => tracing::error!(
                run_id = %self.run_id,
                state = %self.state,
                items = self.items,
                succeeded = self.succeeded,
                delivery = %delivery,
                reused_report = self.reused_report,
                error_kind = %err.kind,
                error = %err,
                "run failed"
            ),
        }
    }
}

struct Progress {
    outcome: RunOutcome,
}

impl Progress {
    fn new(run_id: RunId) -> Self {
        Self {
            outcome: RunOutcome {
                run_id,
                state: RunState::Idle,
                path: vec![RunState::Idle],
                items: 0,
                succeeded: 0,
                delivery: None,
                reused_report: false,
                error: None,
            },
        }
    }

    fn enter(&mut self, next: RunState) {
        let from = self.outcome.state;
        debug_assert!(from.can_advance_to(next), "illegal transition {from} -> {next}");
        tracing::debug!(run_id = %self.outcome.run_id, %from, to = %next, "run state");
        self.outcome.state = next;
        self.outcome.path.push(next);
    }

    fn record_report(&mut self, report: &Report) {
        self.outcome.items = report.results().len();
        self.outcome.succeeded = report.succeeded_count();
    }

    fn fail(mut self, err: StageError) -> RunOutcome {
        self.enter(RunState::Failed);
        self.outcome.error = Some(err);
        self.outcome
    }

    fn done(mut self) -> RunOutcome {
        self.enter(RunState::Done);
        self.outcome
    }
}

/// Daily entry point: config → existing-report check → research → store → email.
pub struct PipelineOrchestrator {
    config: Arc<dyn ConfigSource>,
    clients: Arc<dyn ClientFactory>,
    store: ReportStore,
    deliveries: DeliveryLog,
    clock: Arc<dyn Clock>,
    quota: Quota,
    research_policy: RetryPolicy,
    delivery_policy: RetryPolicy,
}

impl PipelineOrchestrator {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        clients: Arc<dyn ClientFactory>,
        store: ReportStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let deliveries = DeliveryLog::in_dir(store.dir());
        Self {
            config,
            clients,
            store,
            deliveries,
            clock,
            quota: Quota::default(),
            research_policy: RetryPolicy::research(),
            delivery_policy: RetryPolicy::delivery(),
        }
    }

    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.quota = quota;
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn deliveries(&self) -> &DeliveryLog {
        &self.deliveries
    }

    /// Runs one research cycle for `run_date`. Logs exactly one outcome line.
    pub async fn run(&self, run_date: chrono::NaiveDate) -> RunOutcome {
        let run_id = RunId::for_date(run_date);
        let outcome = self.drive(run_id).await;
        outcome.log();
        outcome
    }

    async fn drive(&self, run_id: RunId) -> RunOutcome {
        let mut progress = Progress::new(run_id);

        progress.enter(RunState::LoadingConfig);
        let config = match self.config.load() {
            Ok(c) => c,
            Err(err) => return progress.fail(err),
        };

        let _lock = match RunLock::try_acquire(self.store.dir(), run_id) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                return progress.fail(StageError::new(
                    ErrorKind::RunInProgress,
                    "lock",
                    format!("another run for {run_id} is in progress"),
                ))
            }
            Err(err) => return progress.fail(StageError::from_anyhow(ErrorKind::Storage, "lock", &err)),
        };

        progress.enter(RunState::CheckingExistingReport);
        let report = if self.store.exists(run_id) {
            match self.store.load(run_id) {
                Ok(report) => {
                    tracing::info!(%run_id, "report already stored; skipping research");
                    progress.outcome.reused_report = true;
                    progress.record_report(&report);
                    progress.enter(RunState::Dispatching);
                    report
                }
                Err(err) => {
                    return progress.fail(StageError::from_anyhow(ErrorKind::Storage, "load", &err))
                }
            }
        } else {
            progress.enter(RunState::Assembling);
            let report = match self.assemble(run_id, &config).await {
                Ok(r) => r,
                Err(err) => return progress.fail(err),
            };
            progress.record_report(&report);
            if report.has_auth_failure() {
                // Not stored: a fixed key must be able to research today again.
                return progress.fail(StageError::new(
                    ErrorKind::Auth,
                    "research",
                    "research API rejected the credentials",
                ));
            }

            progress.enter(RunState::Storing);
            if let Err(err) = self.store.save(&report) {
                return progress.fail(StageError::from_anyhow(ErrorKind::Storage, "save", &err));
            }
            progress.enter(RunState::Dispatching);
            report
        };

        let mailer = match self.clients.mailer() {
            Ok(m) => m,
            Err(err) => {
                return progress.fail(StageError::from_anyhow(ErrorKind::Delivery, "smtp", &err))
            }
        };
        let dispatcher = NotificationDispatcher::new(mailer, self.clock.clone())
            .with_policy(self.delivery_policy.clone());
        let record = dispatcher
            .send(&report, &config.recipient, &config.credentials)
            .await;
        if let Err(err) = self.deliveries.append(&record) {
            tracing::warn!(%run_id, error = %err, "failed to append delivery log");
        }
        progress.outcome.delivery = Some(record.status);

        match record.status {
            DeliveryStatus::Sent => progress.done(),
            DeliveryStatus::Failed => progress.fail(StageError::new(
                record.error_kind.unwrap_or(ErrorKind::Delivery),
                "dispatch",
                format!(
                    "{} (report kept at {})",
                    record.error.unwrap_or_default(),
                    self.store.markdown_path(run_id).display()
                ),
            )),
        }
    }

    async fn assemble(&self, run_id: RunId, config: &ConfigSnapshot) -> Result<Report, StageError> {
        let model = self
            .clients
            .research_model(&config.api_key)
            .map_err(|err| StageError::from_anyhow(ErrorKind::ConfigMissing, "research", &err))?;

        let limiter = Arc::new(RateLimiter::new(self.quota, self.clock.clone()));
        let client = ResearchClient::new(model, limiter, self.clock.clone())
            .with_policy(self.research_policy.clone());
        let briefs = if config.market_briefs {
            BriefKind::ALL.to_vec()
        } else {
            Vec::new()
        };

        let generated_at = self.clock.now().with_timezone(&Utc);
        Ok(ReportAssembler::new(client)
            .with_briefs(briefs)
            .assemble(&config.watchlist, run_id.date(), generated_at)
            .await)
    }
}
