use crate::domain::report::BriefKind;
use crate::domain::watchlist::{ItemKind, WatchlistItem};
use chrono::NaiveDate;

fn korean_date(date: NaiveDate) -> String {
    date.format("%Y년 %m월 %d일").to_string()
}

fn joined_labels(items: &[WatchlistItem]) -> String {
    if items.is_empty() {
        return "없음".to_string();
    }
    items
        .iter()
        .map(|i| i.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-item research prompt. Asks for fixed Markdown sections so reports line up across items.
pub fn research_prompt(item: &WatchlistItem, as_of: NaiveDate) -> String {
    let today = korean_date(as_of);
    let target = item.label.trim();
    let sections = match item.kind {
        ItemKind::Symbol => [
            "금지: 뉴스 나열, 가격·목표가·거래량 숫자 직접 기재, 중복 문장",
            "",
            "## 📌 한줄 요약",
            "(오늘의 핵심 이슈와 주가에 주는 의미, 1줄, 15단어 이내)",
            "",
            "## 🧠 오늘의 해석",
            "(사건 → 실적 영향 → 주가 해석, 최대 2줄)",
            "",
            "## 📍 가격 위치",
            "(신고가 근접 / 급등 후 조정 / 박스권 / 저점 반등 중 서술, 숫자 금지, 1줄)",
            "",
            "## 📊 투자 매력도: n/10",
            "(점수 근거, 최대 2줄)",
            "",
            "## ⚠️ 리스크",
            "(핵심 리스크 1줄, 12단어 이내)",
        ]
        .join("\n"),
        ItemKind::Industry => [
            "금지: 개별 기업 실적·가격·세부 통계 나열, 중복 문장",
            "",
            "## 📌 한줄 요약",
            "(산업 상승/둔화 사이클 판단, 1줄, 15단어 이내)",
            "",
            "## 💰 자금 흐름",
            "(수급 유입 여부 또는 투자자 관심도, 1줄)",
            "",
            "## 🧭 산업 사이클 위치",
            "(초기 / 중기 / 피크 / 하락 중 하나 + 1줄 근거)",
            "",
            "## ⭐ 핵심 수혜 포인트",
            "(구조적 성장 요인 또는 투자 테마, 1줄)",
            "",
            "## 📊 투자 매력도: n/10",
            "(점수 근거, 최대 2줄)",
            "",
            "## ⚠️ 리스크",
            "(핵심 리스크 1줄, 12단어 이내)",
        ]
        .join("\n"),
    };

    format!(
        "오늘은 {today}입니다. Google 검색으로 '{target}' {}의 최신 정보를 조사하여 \
아래 항목만 한국어로 간결하게 작성하세요. 안내 문구나 서론 없이 항목만 출력하세요.\n\n{sections}",
        item.kind.label_ko()
    )
}

/// Portfolio-level prompt for one brief section.
pub fn brief_prompt(kind: BriefKind, items: &[WatchlistItem], as_of: NaiveDate) -> String {
    let today = korean_date(as_of);
    let targets = joined_labels(items);
    let count = items.len();

    match kind {
        BriefKind::MarketNews => {
            let yesterday = as_of.pred_opt().map(korean_date).unwrap_or_else(|| today.clone());
            format!(
                "어제({yesterday})부터 오늘({today})까지 글로벌·한국 주식시장을 Google 검색으로 확인하여 \
서로 다른 핵심 요인 정확히 3개를 작성하세요.\n\
규칙:\n\
- bullet(- )만 출력, 서론 금지\n\
- 형태: '- 요인 → 시장 영향' (1줄, 12단어 이내)\n\
- 마크다운 강조 금지"
            )
        }
        BriefKind::PortfolioOverview => format!(
            "오늘은 {today}입니다. Google 검색으로 최신 시장 정보를 확인하여 \
아래 {count}개 종목/산업 각각에 대해 정확히 {count}줄을 작성하세요.\n\
종목/산업 목록: {targets}\n\
형식: '- 자산명 → 핵심 해석 / 액션: (관망·매수·비중조절·리스크관리 중 1개)'\n\
규칙: 자산명 뒤 10단어 이내, bullet만 출력, 마크다운 강조 금지"
        ),
        BriefKind::PortfolioRisk => format!(
            "오늘은 {today}입니다. Google 검색으로 최신 정보를 확인하여 \
아래 포트폴리오 전체에 공통으로 영향을 주는 리스크를 작성하세요.\n\
포트폴리오: {targets}\n\
규칙: 개별 종목 리스크 제외, bullet(- ) 1~2개, 각 12단어 이내, 서론 금지"
        ),
        BriefKind::Timeframe => format!(
            "오늘은 {today}입니다. Google 검색으로 최신 정보를 확인하여 \
아래 종목/산업 각각의 타임프레임 관점을 한국어로 작성하세요.\n\
종목/산업: {targets}\n\
각 자산마다 아래 형식으로만 작성하세요.\n\
### 자산명\n\
- 단기(7일): 이벤트·수급 중심 1줄\n\
- 중기(1~3개월): 모멘텀·실적 사이클 1줄\n\
- 장기(1년): 구조적 성장 스토리 1줄"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn symbol_prompt_is_dated_and_uses_symbol_sections() {
        let p = research_prompt(&WatchlistItem::symbol("005930"), date());
        assert!(p.contains("2026년 10월 19일"));
        assert!(p.contains("'005930' 종목"));
        assert!(p.contains("## 📍 가격 위치"));
        assert!(!p.contains("## 💰 자금 흐름"));
    }

    #[test]
    fn industry_prompt_uses_industry_sections() {
        let p = research_prompt(&WatchlistItem::industry("semiconductors"), date());
        assert!(p.contains("'semiconductors' 산업"));
        assert!(p.contains("## 🧭 산업 사이클 위치"));
    }

    #[test]
    fn overview_prompt_lists_every_target() {
        let items = vec![
            WatchlistItem::symbol("005930"),
            WatchlistItem::industry("semiconductors"),
        ];
        let p = brief_prompt(BriefKind::PortfolioOverview, &items, date());
        assert!(p.contains("005930, semiconductors"));
        assert!(p.contains("정확히 2줄"));
    }

    #[test]
    fn news_prompt_spans_yesterday_and_today() {
        let p = brief_prompt(BriefKind::MarketNews, &[], date());
        assert!(p.contains("2026년 10월 18일"));
        assert!(p.contains("2026년 10월 19일"));
    }
}
