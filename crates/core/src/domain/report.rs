use crate::domain::watchlist::WatchlistItem;
use crate::error::ErrorKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Idempotency key of one daily research cycle: the invocation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(NaiveDate);

impl RunId {
    pub fn for_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// File stem shared by every artifact of this run, e.g. `report_20261019`.
    pub fn file_stem(&self) -> String {
        format!("report_{}", self.0.format("%Y%m%d"))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchQuery {
    pub item: WatchlistItem,
    pub prompt_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub item: WatchlistItem,
    pub summary_text: String,
    pub sources: Vec<String>,
    pub succeeded: bool,
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl ResearchResult {
    pub fn success(item: WatchlistItem, summary_text: String, sources: Vec<String>) -> Self {
        Self {
            item,
            summary_text,
            sources,
            succeeded: true,
            error_kind: None,
            error_detail: None,
        }
    }

    /// A failed result never carries summary text or sources.
    pub fn failure(item: WatchlistItem, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            item,
            summary_text: String::new(),
            sources: Vec::new(),
            succeeded: false,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
        }
    }
}

/// Portfolio-level sections requested after the per-item research.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefKind {
    MarketNews,
    PortfolioOverview,
    PortfolioRisk,
    Timeframe,
}

impl BriefKind {
    pub const ALL: [BriefKind; 4] = [
        BriefKind::MarketNews,
        BriefKind::PortfolioOverview,
        BriefKind::PortfolioRisk,
        BriefKind::Timeframe,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            BriefKind::MarketNews => "📰 시장 방향 & 심리",
            BriefKind::PortfolioOverview => "📌 오늘의 포트폴리오 요약",
            BriefKind::PortfolioRisk => "⚠️ 오늘의 포트폴리오 리스크",
            BriefKind::Timeframe => "⏱ 타임프레임 관점",
        }
    }

    pub fn fallback_text(&self) -> &'static str {
        match self {
            BriefKind::MarketNews => "- 뉴스 요약을 불러오지 못했습니다.",
            BriefKind::PortfolioOverview => "- 포트폴리오 요약을 불러오지 못했습니다.",
            BriefKind::PortfolioRisk => "- 리스크 정보를 불러오지 못했습니다.",
            BriefKind::Timeframe => "- 분석을 불러오지 못했습니다.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brief {
    pub kind: BriefKind,
    pub text: String,
    pub succeeded: bool,
}

impl Brief {
    pub fn ok(kind: BriefKind, text: String) -> Self {
        Self {
            kind,
            text,
            succeeded: true,
        }
    }

    pub fn unavailable(kind: BriefKind) -> Self {
        Self {
            kind,
            text: kind.fallback_text().to_string(),
            succeeded: false,
        }
    }
}

/// A rendered daily report. Immutable once built: fields are only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    run_id: RunId,
    generated_at: DateTime<Utc>,
    results: Vec<ResearchResult>,
    #[serde(default)]
    briefs: Vec<Brief>,
    rendered_markdown: String,
}

impl Report {
    pub fn new(
        run_id: RunId,
        generated_at: DateTime<Utc>,
        results: Vec<ResearchResult>,
        briefs: Vec<Brief>,
    ) -> Self {
        let rendered_markdown =
            crate::report::render::render_markdown(run_id, generated_at, &results, &briefs);
        Self {
            run_id,
            generated_at,
            results,
            briefs,
            rendered_markdown,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn results(&self) -> &[ResearchResult] {
        &self.results
    }

    pub fn briefs(&self) -> &[Brief] {
        &self.briefs
    }

    pub fn rendered_markdown(&self) -> &str {
        &self.rendered_markdown
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    /// True when research was rejected for bad credentials; such a report must not be kept.
    pub fn has_auth_failure(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.error_kind == Some(ErrorKind::Auth))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Sent => f.write_str("sent"),
            DeliveryStatus::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub run_id: RunId,
    pub delivered_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub recipient: String,
    pub attempts: u32,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub error: Option<String>,
}
