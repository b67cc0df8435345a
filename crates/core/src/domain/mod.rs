pub mod report;
pub mod watchlist;
