pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod research;
pub mod storage;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;
