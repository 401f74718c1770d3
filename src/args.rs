use clap::Parser;
use shoe_crawler::CrawlerInput;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shoe-crawler")]
#[command(about = "Crawls a shoe shop's listings and exports every product it finds")]
#[command(version)]
pub struct Args {
    /// URLs to start from (defaults to the input file's seed URLs)
    pub seed_urls: Vec<String>,

    /// JSON input file with camelCase keys
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Maximum number of requests to process (0 = unbounded)
    #[arg(short, long)]
    pub max_items: Option<usize>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Export path; `.json` writes JSON, anything else CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// URL of the WebDriver server
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Crawl a saved site (directory with manifest.json) instead of a live browser
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Args {
    /// Overlay the command-line flags onto `input`
    pub fn apply(&self, input: &mut CrawlerInput) {
        if !self.seed_urls.is_empty() {
            input.seed_urls = self.seed_urls.clone();
        }
        if let Some(max_items) = self.max_items {
            input.max_items = max_items;
        }
        if let Some(concurrency) = self.concurrency {
            input.max_concurrency = concurrency;
        }
        if let Some(output) = &self.output {
            input.output_path = output.clone();
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            input.webdriver_url = webdriver_url.clone();
        }
        if self.headful {
            input.headless = false;
        }
    }
}
