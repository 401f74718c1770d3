use clap::Parser;
use shoe_crawler::browser::snapshot::{SnapshotBrowser, SnapshotSite};
use shoe_crawler::browser::webdriver::WebDriverBrowser;
use shoe_crawler::{Browser, CrawlerInput, Dataset, ShoeCrawl};
use std::sync::Arc;

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut input = match &args.input {
        Some(path) => match CrawlerInput::from_file(path) {
            Ok(input) => input,
            Err(e) => {
                ::log::error!("Failed to read input {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => CrawlerInput::default(),
    };
    if input.override_webdriver_url(std::env::var("WEBDRIVER_URL").ok()) {
        ::log::debug!("Using WebDriver URL from environment: {}", input.webdriver_url);
    }
    args.apply(&mut input);

    let shoe_crawl = ShoeCrawl::new().with_input(input);

    let result = match &args.snapshot_dir {
        Some(dir) => match SnapshotSite::from_dir(dir) {
            Ok(site) => {
                ::log::info!("Crawling {} saved pages from {}", site.len(), dir.display());
                run(&shoe_crawl, SnapshotBrowser::new(site)).await
            }
            Err(e) => {
                ::log::error!("Failed to load snapshot {}: {}", dir.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let input = shoe_crawl.input();
            println!("Note: Web crawling requires a WebDriver server (e.g., ChromeDriver).");
            println!(
                "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
            );
            let browser = WebDriverBrowser::new(&input.webdriver_url, input.headless);
            run(&shoe_crawl, browser).await
        }
    };

    if let Err(e) = result {
        ::log::error!("Crawl failed: {}", e);
        std::process::exit(1);
    }
}

/// Crawl with `browser`, stopping gracefully on Ctrl-C, then export the dataset
async fn run<B: Browser>(
    shoe_crawl: &ShoeCrawl,
    browser: B,
) -> Result<(), Box<dyn std::error::Error>> {
    let seeds = shoe_crawl.seeds()?;
    ::log::info!("Starting crawl from {} seed URLs", seeds.len());

    let dataset = Arc::new(Dataset::new());
    let crawler = shoe_crawl.build(browser, dataset.clone())?;

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Ctrl-C received, finishing in-flight requests (press again to abort)");
            stop.shutdown();
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.abort();
            }
        }
    });

    let stats = crawler.run(seeds).await?;
    ::log::info!(
        "Dispatched {} requests ({} cancelled), finished because: {}",
        stats.requests_dispatched,
        stats.requests_cancelled,
        stats.finish_reason
    );

    let output_path = &shoe_crawl.input().output_path;
    let written = dataset.export(output_path).await?;
    ::log::info!("Exported {} records to {}", written, output_path.display());
    Ok(())
}
