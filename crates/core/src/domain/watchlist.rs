use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Symbol,
    Industry,
}

impl ItemKind {
    /// Korean section label used in prompts and rendered reports.
    pub fn label_ko(&self) -> &'static str {
        match self {
            ItemKind::Symbol => "종목",
            ItemKind::Industry => "산업",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub kind: ItemKind,
    pub label: String,
}

impl WatchlistItem {
    pub fn symbol(label: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Symbol,
            label: label.into(),
        }
    }

    pub fn industry(label: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Industry,
            label: label.into(),
        }
    }
}

/// On-disk shape of `watchlist.json`, as written by the configuration UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchlistFile {
    #[serde(default)]
    pub stocks: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
}

impl WatchlistFile {
    /// Symbols first, then industries, each in file order. Blank and repeated labels are dropped.
    pub fn into_items(self) -> Vec<WatchlistItem> {
        let mut out: Vec<WatchlistItem> = Vec::with_capacity(self.stocks.len() + self.industries.len());
        let labelled = self
            .stocks
            .into_iter()
            .map(WatchlistItem::symbol)
            .chain(self.industries.into_iter().map(WatchlistItem::industry));

        for mut item in labelled {
            item.label = item.label.trim().to_string();
            if item.label.is_empty() || out.contains(&item) {
                continue;
            }
            out.push(item);
        }
        out
    }
}
