use crate::domain::report::{Brief, BriefKind, ResearchResult, RunId};
use crate::domain::watchlist::ItemKind;
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub const DISCLAIMER: &str = "⚠️ 본 리포트는 AI가 생성한 정보 제공용 자료이며 투자 권유가 아닙니다.";

/// Renders the report body. Briefs that frame the day come first, the timeframe outlook last.
pub fn render_markdown(
    run_id: RunId,
    generated_at: DateTime<Utc>,
    results: &[ResearchResult],
    briefs: &[Brief],
) -> String {
    let mut out = String::new();
    let succeeded = results.iter().filter(|r| r.succeeded).count();
    let failed = results.len() - succeeded;

    let _ = writeln!(out, "# 📈 주식 리서치 리포트 {run_id}");
    let _ = writeln!(
        out,
        "> 생성 {} UTC · {}개 종목/산업 · 성공 {succeeded} · 실패 {failed}",
        generated_at.format("%Y-%m-%d %H:%M"),
        results.len(),
    );
    out.push('\n');

    for brief in briefs.iter().filter(|b| b.kind != BriefKind::Timeframe) {
        push_brief(&mut out, brief);
    }

    for kind in [ItemKind::Symbol, ItemKind::Industry] {
        let group: Vec<&ResearchResult> = results.iter().filter(|r| r.item.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        let icon = match kind {
            ItemKind::Symbol => "📌",
            ItemKind::Industry => "🏭",
        };
        let _ = writeln!(out, "---\n\n## {icon} {} 리서치\n", kind.label_ko());
        for result in group {
            push_result(&mut out, result);
        }
    }

    for brief in briefs.iter().filter(|b| b.kind == BriefKind::Timeframe) {
        push_brief(&mut out, brief);
    }

    let _ = writeln!(out, "---\n\n{DISCLAIMER}");
    out
}

fn push_brief(out: &mut String, brief: &Brief) {
    let _ = writeln!(out, "## {}\n", brief.kind.title());
    let _ = writeln!(out, "{}\n", brief.text.trim());
}

/// Keeps an error body inside its blockquote line and out of the HTML.
fn one_line(detail: &str) -> String {
    detail
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('<', "&lt;")
}

fn push_result(out: &mut String, result: &ResearchResult) {
    if !result.succeeded {
        let kind = result
            .error_kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let detail = one_line(result.error_detail.as_deref().unwrap_or(""));
        let _ = writeln!(out, "### ❌ {} (리서치 실패)\n", result.item.label);
        let _ = writeln!(out, "> 실패 사유: `{kind}` {detail}\n");
        return;
    }

    let _ = writeln!(out, "### {}\n", result.item.label);
    // Item sections come back as `##` headings; nest them under the item.
    for line in result.summary_text.trim().lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            let _ = writeln!(out, "#### {rest}");
        } else {
            let _ = writeln!(out, "{line}");
        }
    }
    out.push('\n');

    if !result.sources.is_empty() {
        out.push_str("출처:\n\n");
        for (idx, url) in result.sources.iter().enumerate() {
            let _ = writeln!(out, "{}. <{url}>", idx + 1);
        }
        out.push('\n');
    }
}
