use crate::domain::report::{DeliveryRecord, RunId};
use anyhow::Context;
use std::io::{BufRead, Write};
use std::path::PathBuf;

const FILE_NAME: &str = "deliveries.jsonl";

/// Append-only JSON-lines log of dispatch outcomes.
#[derive(Debug, Clone)]
pub struct DeliveryLog {
    path: PathBuf,
}

impl DeliveryLog {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(FILE_NAME),
        }
    }

    pub fn append(&self, record: &DeliveryRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record).context("serialize delivery record failed")?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {} failed", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append to {} failed", self.path.display()))?;
        Ok(())
    }

    /// Records for one run, oldest first. Unparseable lines are skipped.
    pub fn history(&self, run_id: RunId) -> anyhow::Result<Vec<DeliveryRecord>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("open {} failed", self.path.display()))
            }
        };

        let mut out = Vec::new();
        for (idx, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read {} failed", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DeliveryRecord>(&line) {
                Ok(record) if record.run_id == run_id => out.push(record),
                Ok(_) => {}
                Err(err) => tracing::warn!(line = idx + 1, error = %err, "skipping bad delivery log line"),
            }
        }
        Ok(out)
    }
}
