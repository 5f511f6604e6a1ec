use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use log::info;
use tunegrab::{
    EntityKind, Outcome, PipelineBuilder, Result, RetryPolicy,
    clients::{Downloader, DownloaderConfig, SpotifyClient, spotdl},
    organizer, pipeline,
    resolver::Resolver,
};

#[derive(Parser)]
#[command(name = "tunegrab")]
#[command(version, about = "Resolve a Spotify query, download it with spotdl and file it by tags", long_about = None)]
pub struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, download and organize in one go
    Fetch {
        query: String,
        #[arg(long, value_enum)]
        kind: Option<EntityKind>,
        /// Library root; downloads are organized below it
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Seconds to wait before retrying failed downloads
        #[arg(long, default_value_t = 30)]
        retry_delay: u64,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// Print the canonical URL a query resolves to
    Resolve {
        query: String,
        #[arg(long, value_enum)]
        kind: Option<EntityKind>,
    },
    /// Download a canonical URL without organizing it
    Download {
        url: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// Move audio files into the library by their tags
    Organize {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ToolArgs {
    /// Download tool executable
    #[arg(long, default_value = "spotdl")]
    tool: PathBuf,
    /// Extra argument placed before the URL; repeat for several
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    tool_args: Vec<String>,
    /// ffmpeg binary handed to the download tool
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
    /// Output filename template, relative to the download directory
    #[arg(long, default_value = spotdl::DEFAULT_OUTPUT_TEMPLATE)]
    output_template: String,
    /// Seconds before a running download is killed
    #[arg(long, default_value_t = spotdl::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
}

impl From<ToolArgs> for Downloader {
    fn from(args: ToolArgs) -> Self {
        Downloader::new(DownloaderConfig {
            program: args.tool,
            leading_args: args.tool_args.into_iter().map(Into::into).collect(),
            ffmpeg: args.ffmpeg,
            output_template: args.output_template,
            timeout: Duration::from_secs(args.timeout),
        })
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fetch {
            query,
            kind,
            out_dir,
            retry_delay,
            json,
            tool,
        } => {
            let pipeline = PipelineBuilder::new()
                .downloader(tool.into())
                .root(out_dir.unwrap_or_else(pipeline::default_root))
                .retry(RetryPolicy {
                    delay: Duration::from_secs(retry_delay),
                    ..RetryPolicy::default()
                })
                .build();
            let outcome = pipeline.run(&query, kind).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Resolve { query, kind } => {
            match Resolver::new(SpotifyClient::default()).resolve(&query, kind).await? {
                Some(url) => println!("{url}"),
                None => println!("Nothing resolved for {query:?}"),
            }
        }
        Commands::Download { url, out_dir, tool } => {
            let out_dir = out_dir.unwrap_or_else(pipeline::default_root);
            let files = Downloader::from(tool).download(&url, &out_dir).await?;
            info!("{} new file(s) in {}", files.len(), out_dir.display());
            for file in files {
                println!("{}", file.display());
            }
        }
        Commands::Organize { paths, root } => {
            let root = root.unwrap_or_else(pipeline::default_root);
            for path in organizer::organize(&paths, &root).await? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::NotFound => println!("Nothing resolved"),
        _ if outcome.paths().is_empty() => println!("No files were downloaded"),
        _ => {
            for path in outcome.paths() {
                println!("{}", path.display());
            }
        }
    }
}
