use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

mod ui;

use vidrust::{Dispatcher, HttpFetcher, Settings, VideoSummary};
use ui::{select_from_list, spinner};

#[derive(Parser)]
#[command(name = "vidrust", version, about = "Video listing and stream extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the upstream request timeout, in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured sources
    Sources,

    /// List one page of videos
    List {
        /// Source identifier (unknown ids fall back to the default source)
        #[arg(short, long)]
        source: Option<String>,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a video page into its stream URL
    Resolve {
        /// Canonical URL of the video page
        url: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read one JSON request from stdin and write the JSON response to stdout
    Handle,

    /// Browse a source interactively and resolve the selected video
    Browse {
        #[arg(short, long)]
        source: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "vidrust=debug" } else { "vidrust=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        settings.timeout_secs = secs;
        settings.validate()?;
    }
    let settings = Arc::new(settings);

    let fetcher = HttpFetcher::new(settings.timeout()).context("Failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(Arc::new(fetcher), settings.clone())?;

    match cli.command {
        Commands::Sources => {
            for source in dispatcher.sources() {
                let marker = if source.id == settings.default_source { " (default)" } else { "" };
                println!("{:<10} {}{}", source.id, source.name, marker);
            }
        }
        Commands::List { source, page, json } => {
            let source = source.unwrap_or_else(|| settings.default_source.clone());
            let listing = if json {
                dispatcher.catalog().list_page(&source, page).await?
            } else {
                let bar = spinner(&format!("Fetching page {page} of {source}..."));
                let listing = dispatcher.catalog().list_page(&source, page).await;
                bar.finish_and_clear();
                listing?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if listing.videos.is_empty() {
                println!("No videos found on page {} of {}", listing.page, listing.source);
            } else {
                for video in &listing.videos {
                    println!("{}", describe(video));
                    println!("    {}", video.page_url);
                }
            }
        }
        Commands::Resolve { url, json } => {
            let stream = if json {
                dispatcher.resolver().resolve_stream(&url).await?
            } else {
                let bar = spinner("Resolving stream...");
                let stream = dispatcher.resolver().resolve_stream(&url).await;
                bar.finish_and_clear();
                stream?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&stream)?);
            } else {
                println!("Title:     {}", stream.title);
                if !stream.duration.is_empty() {
                    println!("Duration:  {}", stream.duration);
                }
                if !stream.thumbnail_url.is_empty() {
                    println!("Thumbnail: {}", stream.thumbnail_url);
                }
                println!("Stream:    {}", stream.stream_url);
            }
        }
        Commands::Handle => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read request from stdin")?;
            println!("{}", dispatcher.handle_json(&body).await);
        }
        Commands::Browse { source } => {
            let source = source.unwrap_or_else(|| settings.default_source.clone());
            browse(&dispatcher, &source).await?;
        }
    }

    Ok(())
}

fn describe(video: &VideoSummary) -> String {
    let mut line = video.title.clone();
    if !video.duration.is_empty() {
        line.push_str(&format!(" [{}]", video.duration));
    }
    if video.is_high_definition {
        line.push_str(" HD");
    }
    line
}

async fn browse(dispatcher: &Dispatcher, source: &str) -> Result<()> {
    let mut page = 1u32;

    loop {
        let bar = spinner(&format!("Fetching page {page}..."));
        let listing = dispatcher.catalog().list_page(source, page).await;
        bar.finish_and_clear();
        let listing = listing?;

        let mut items: Vec<String> = listing.videos.iter().map(describe).collect();
        let videos = items.len();
        items.push("Next page".to_string());
        if page > 1 {
            items.push("Previous page".to_string());
        }
        items.push("Quit".to_string());

        let choice = select_from_list(&items, &format!("{} - page {}", listing.source, page))?;
        match items[choice].as_str() {
            _ if choice < videos => {
                let video = &listing.videos[choice];
                let bar = spinner("Resolving stream...");
                let stream = dispatcher.resolver().resolve_stream(&video.page_url).await;
                bar.finish_and_clear();

                let stream = stream.map_err(|e| anyhow!("Could not resolve '{}': {e}", video.title))?;
                println!("{}", stream.title);
                println!("{}", stream.stream_url);
                return Ok(());
            }
            "Next page" => page += 1,
            "Previous page" => page -= 1,
            _ => return Ok(()),
        }
    }
}
