use crate::domain::report::{Report, RunId};
use crate::storage::write_atomic;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// One Markdown file plus one JSON snapshot per run id under the reports directory.
///
/// The JSON snapshot is written last and is the existence marker.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create reports dir {} failed", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn markdown_path(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{}.md", run_id.file_stem()))
    }

    fn snapshot_path(&self, run_id: RunId) -> PathBuf {
        self.dir.join(format!("{}.json", run_id.file_stem()))
    }

    /// Overwrites any report stored under the same run id; other runs are untouched.
    pub fn save(&self, report: &Report) -> anyhow::Result<()> {
        let run_id = report.run_id();
        write_atomic(
            &self.markdown_path(run_id),
            report.rendered_markdown().as_bytes(),
        )?;

        let json = serde_json::to_vec_pretty(report).context("serialize report failed")?;
        write_atomic(&self.snapshot_path(run_id), &json)?;

        tracing::info!(%run_id, path = %self.markdown_path(run_id).display(), "report saved");
        Ok(())
    }

    pub fn exists(&self, run_id: RunId) -> bool {
        self.snapshot_path(run_id).is_file()
    }

    pub fn load(&self, run_id: RunId) -> anyhow::Result<Report> {
        let path = self.snapshot_path(run_id);
        let bytes =
            std::fs::read(&path).with_context(|| format!("read {} failed", path.display()))?;
        let report = serde_json::from_slice::<Report>(&bytes)
            .with_context(|| format!("{} is not a valid report snapshot", path.display()))?;
        anyhow::ensure!(
            report.run_id() == run_id,
            "report snapshot run id mismatch: expected {run_id}, got {}",
            report.run_id()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ResearchResult;
    use crate::domain::watchlist::WatchlistItem;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn report(day: u32, summary: &str) -> Report {
        Report::new(
            RunId::for_date(NaiveDate::from_ymd_opt(2026, 10, day).unwrap()),
            Utc.with_ymd_and_hms(2026, 10, day, 0, 0, 0).unwrap(),
            vec![ResearchResult::success(
                WatchlistItem::symbol("005930"),
                summary.to_string(),
                vec![],
            )],
            vec![],
        )
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::open(dir.path().join("reports")).unwrap();
        let r = report(19, "첫 번째");

        assert!(!store.exists(r.run_id()));
        store.save(&r).unwrap();
        assert!(store.exists(r.run_id()));
        assert_eq!(store.load(r.run_id()).unwrap(), r);

        let md = std::fs::read_to_string(store.markdown_path(r.run_id())).unwrap();
        assert_eq!(md, r.rendered_markdown());
        assert!(store
            .markdown_path(r.run_id())
            .ends_with("report_20261019.md"));
    }

    #[test]
    fn second_save_overwrites_same_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::open(dir.path()).unwrap();
        let first = report(19, "첫 번째");
        let second = report(19, "두 번째");

        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load(first.run_id()).unwrap();
        assert_eq!(loaded.results()[0].summary_text, "두 번째");
        let json_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
            .count();
        assert_eq!(json_files, 1);
    }

    #[test]
    fn other_run_ids_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::open(dir.path()).unwrap();
        let yesterday = report(18, "어제");
        let today = report(19, "오늘");

        store.save(&yesterday).unwrap();
        store.save(&today).unwrap();
        store.save(&today).unwrap();

        assert_eq!(store.load(yesterday.run_id()).unwrap(), yesterday);
    }

    #[test]
    fn load_missing_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::open(dir.path()).unwrap();
        assert!(store
            .load(RunId::for_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()))
            .is_err());
    }
}
