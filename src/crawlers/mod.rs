pub mod crawler;
pub mod state;
pub mod stats;

pub use crawler::Crawler;
pub use state::{CrawlState, StopHandle};
pub use stats::{CrawlStats, FinishReason};

#[cfg(test)]
mod tests;
