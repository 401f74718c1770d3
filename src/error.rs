use crate::request::Label;
use thiserror::Error;

/// Errors raised while building a crawl request
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{0}', only http and https can be crawled")]
    UnsupportedScheme(String),

    #[error("unknown request label '{0}'")]
    UnknownLabel(String),
}

/// Errors raised while building or querying the handler registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a handler is already registered for label {0}")]
    DuplicateHandler(Label),

    #[error("no handler registered for label {0}")]
    NoHandler(Label),

    #[error("no default handler registered")]
    MissingDefault,
}

/// Errors reported by a page implementation
#[derive(Debug, Error)]
pub enum PageError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no browser session available: {0}")]
    Session(String),

    #[error("webdriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("unexpected script result: {0}")]
    Script(String),
}

/// Errors raised by the extraction helpers
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("selector '{selector}' matched {count} elements, expected at most one")]
    Ambiguous { selector: String, count: usize },
}

/// Errors raised by an output sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record sink is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that fail the processing of a single request
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while loading the crawler input
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Fatal errors that stop a crawl before or while it runs
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("crawler can only be run once")]
    AlreadyStarted,
}
