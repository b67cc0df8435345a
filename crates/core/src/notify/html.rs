use crate::domain::report::Report;
use pulldown_cmark::{html, Event, Options, Parser};

/// Mail subject carrying the run date and item count.
pub fn subject(report: &Report) -> String {
    format!(
        "📈 [{}] 리서치 ({}건)",
        report.run_id(),
        report.results().len()
    )
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // Report text comes from the model; raw HTML is shown, never interpreted.
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, events);
    out
}

/// Full HTML document for mail clients, with inline styles only.
pub fn render_email_html(report: &Report) -> String {
    let body = markdown_to_html(report.rendered_markdown());
    let failed = report.results().len() - report.succeeded_count();
    let status_badge = if failed == 0 {
        String::new()
    } else {
        format!(
            r#"<span style="background:#fce8e6;color:#c5221f;font-size:12px;padding:2px 8px;border-radius:10px;margin-left:8px">실패 {failed}건</span>"#
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
</head>
<body style="font-family:'Malgun Gothic','Apple SD Gothic Neo',sans-serif;background:#f0f4f8;margin:0;padding:20px;color:#222">
<div style="max-width:680px;margin:0 auto">
  <div style="background:#0b3d91;color:#fff;padding:24px 28px;border-radius:12px;margin-bottom:12px">
    <h1 style="margin:0;font-size:22px">📈 주식 리서치 에이전트</h1>
    <p style="margin:6px 0 0;font-size:14px">{date} · {count}개 종목/산업{status_badge}</p>
  </div>
  <div style="background:#fff;border-radius:10px;padding:20px;line-height:1.7;font-size:14px">
{body}
  </div>
</div>
</body>
</html>"#,
        date = report.run_id(),
        count = report.results().len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{ResearchResult, RunId};
    use crate::domain::watchlist::WatchlistItem;
    use crate::error::ErrorKind;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn report() -> Report {
        Report::new(
            RunId::for_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()),
            Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap(),
            vec![
                ResearchResult::success(WatchlistItem::symbol("005930"), "- **HBM** 수요".into(), vec![]),
                ResearchResult::failure(WatchlistItem::industry("semiconductors"), ErrorKind::TransientApi, "503"),
            ],
            vec![],
        )
    }

    #[test]
    fn subject_has_date_and_count() {
        assert_eq!(subject(&report()), "📈 [2026-10-19] 리서치 (2건)");
    }

    #[test]
    fn converts_markdown_constructs() {
        let html = markdown_to_html("## 제목\n\n- **굵게** 항목\n");
        assert!(html.contains("<h2>제목</h2>"));
        assert!(html.contains("<li><strong>굵게</strong> 항목</li>"));
    }

    #[test]
    fn raw_html_in_model_text_is_escaped() {
        let html = markdown_to_html("요약 <img src=x onerror=alert(1)> 끝\n\n<script>alert(1)</script>\n");
        assert!(!html.contains("<img"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn email_shows_failure_badge_and_body() {
        let html = render_email_html(&report());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("실패 1건"));
        assert!(html.contains("<strong>HBM</strong>"));
        assert!(html.contains("semiconductors (리서치 실패)"));
    }
}
