use crate::domain::report::{Brief, BriefKind, Report, ResearchResult, RunId};
use crate::domain::watchlist::WatchlistItem;
use crate::error::ErrorKind;
use crate::research::ResearchClient;
use chrono::{DateTime, NaiveDate, Utc};

/// Fans research out over the watchlist, one item at a time.
pub struct ReportAssembler {
    client: ResearchClient,
    briefs: Vec<BriefKind>,
}

impl ReportAssembler {
    pub fn new(client: ResearchClient) -> Self {
        Self {
            client,
            briefs: Vec::new(),
        }
    }

    pub fn with_briefs(mut self, briefs: Vec<BriefKind>) -> Self {
        self.briefs = briefs;
        self
    }

    /// Always yields exactly one result per watchlist item, in watchlist order.
    ///
    /// Once the daily quota or the credentials fail, the remaining items are recorded as
    /// skipped with the same kind instead of being queried.
    pub async fn assemble(
        &self,
        watchlist: &[WatchlistItem],
        run_date: NaiveDate,
        generated_at: DateTime<Utc>,
    ) -> Report {
        let run_id = RunId::for_date(run_date);
        let total = watchlist.len();
        let mut results: Vec<ResearchResult> = Vec::with_capacity(total);
        let mut halted: Option<ErrorKind> = None;

        for (idx, item) in watchlist.iter().enumerate() {
            if let Some(kind) = halted {
                results.push(ResearchResult::failure(
                    item.clone(),
                    kind,
                    format!("skipped after earlier {kind} failure in this run"),
                ));
                continue;
            }

            let result = self.client.query(item, run_date).await;
            if let Some(kind @ (ErrorKind::QuotaExhausted | ErrorKind::Auth)) = result.error_kind {
                tracing::error!(%run_id, label = %item.label, %kind, "halting research for this run");
                halted = Some(kind);
            }

            tracing::info!(
                %run_id,
                processed = idx + 1,
                total,
                label = %item.label,
                ok = result.succeeded,
                "research progress"
            );
            results.push(result);
        }

        let mut briefs = Vec::with_capacity(self.briefs.len());
        for &kind in &self.briefs {
            if halted.is_some() {
                briefs.push(Brief::unavailable(kind));
                continue;
            }
            match self.client.brief(kind, watchlist, run_date).await {
                Ok(text) => briefs.push(Brief::ok(kind, text)),
                Err(err) => {
                    tracing::warn!(%run_id, brief = ?kind, error = %err, "brief unavailable");
                    if matches!(err.kind, ErrorKind::QuotaExhausted | ErrorKind::Auth) {
                        halted = Some(err.kind);
                    }
                    briefs.push(Brief::unavailable(kind));
                }
            }
        }

        Report::new(run_id, generated_at, results, briefs)
    }
}
