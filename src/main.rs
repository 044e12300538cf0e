use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt_transcripts::cli::{Cli, Commands, OutputFormat};
use yt_transcripts::config::Config;
use yt_transcripts::error::BatchError;
use yt_transcripts::extractors::youtube::YtDlpDownloader;
use yt_transcripts::extractors::VideoReference;
use yt_transcripts::input::InputLoader;
use yt_transcripts::output::{timestamped_root, OutputWriter};
use yt_transcripts::pipeline::BatchPipeline;
use yt_transcripts::transcript::TranscriptApiClient;
use yt_transcripts::utils;

/// Options of the `download` command after CLI parsing
struct DownloadArgs {
    input: PathBuf,
    api_key: Option<String>,
    output_dir: Option<PathBuf>,
    format: Option<OutputFormat>,
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
    timestamped: bool,
    with_video: bool,
    proxies: Option<PathBuf>,
    url_column: Option<String>,
    group_column: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        verbose,
        quiet,
        json_logs,
        config: config_path,
    } = Cli::parse();

    init_tracing(verbose, quiet, json_logs);

    let config = Config::load(config_path.as_deref())?;

    match command {
        Commands::Download {
            input,
            api_key,
            output_dir,
            format,
            max_attempts,
            delay_ms,
            timestamped,
            with_video,
            proxies,
            url_column,
            group_column,
        } => {
            let args = DownloadArgs {
                input,
                api_key,
                output_dir,
                format,
                max_attempts,
                delay_ms,
                timestamped,
                with_video,
                proxies,
                url_column,
                group_column,
            };
            download(config, args, quiet).await?;
        }
        Commands::Resolve { input } => {
            resolve(&config, &input)?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = config.save(config_path.as_deref())?;
                println!("Configuration written to: {}", path.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, quiet: bool, json_logs: bool) {
    let default_filter = if verbose {
        "yt_transcripts=debug"
    } else if quiet {
        "yt_transcripts=warn"
    } else {
        "yt_transcripts=info"
    };

    let json_layer = json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn download(mut config: Config, args: DownloadArgs, quiet: bool) -> Result<()> {
    // Missing key is fatal before any network call
    let api_key = args
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| BatchError::Auth {
            message: "no API key provided (set TRANSCRIPT_API_KEY or pass --api-key)".to_string(),
        })?;

    if let Some(dir) = args.output_dir {
        config.output.directory = dir;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.batch.request_delay_ms = delay_ms;
    }
    if let Some(column) = args.url_column {
        config.batch.url_column = column;
    }
    if let Some(column) = args.group_column {
        config.batch.group_column = Some(column);
    }
    config.output.timestamped |= args.timestamped;
    config.batch.download_video |= args.with_video;
    config.validate()?;

    let missing_deps = utils::check_dependencies(config.batch.download_video).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - video downloads will be reported as failures)");
    }

    let entries = InputLoader::new(config.csv_columns())
        .open(&args.input)
        .with_context(|| format!("Cannot read input list {}", args.input.display()))?;

    let proxies = config.load_proxies(args.proxies.as_deref())?;
    let client = TranscriptApiClient::new(api_key, &config.api, &proxies)?;
    if !proxies.is_empty() {
        tracing::info!("Rotating requests across {} proxies", client.route_count());
    }

    let root = if config.output.timestamped {
        timestamped_root(&config.output.directory, chrono::Local::now())
    } else {
        config.output.directory.clone()
    };
    let writer = OutputWriter::create(&root, config.output.format, &config.output.aggregate_file)?;

    println!("📂 Reading links from: {}", args.input.display());
    println!("📁 Output folder: {}", root.display());

    let mut pipeline = BatchPipeline::new(Box::new(client), writer, config.retry_policy())
        .with_request_delay(config.request_delay())
        .with_progress(!quiet);

    if config.batch.download_video {
        pipeline = pipeline.with_video_downloader(Box::new(YtDlpDownloader::new()));
    }

    let summary = pipeline.run(entries).await;
    summary.print(&root);

    if let Some(abort) = &summary.aborted {
        anyhow::bail!("Run aborted: {}", abort.message);
    }

    Ok(())
}

fn resolve(config: &Config, input: &Path) -> Result<()> {
    let entries = InputLoader::new(config.csv_columns())
        .open(input)
        .with_context(|| format!("Cannot read input list {}", input.display()))?;

    let mut resolved = 0;
    let mut skipped = 0;

    for entry in entries {
        let entry = entry?;
        match VideoReference::from_entry(&entry) {
            Ok(video) => {
                resolved += 1;
                println!("line {}: {} -> {}", entry.line, entry.raw, video.video_id);
            }
            Err(error) => {
                skipped += 1;
                println!("line {}: {} -> skipped ({})", entry.line, entry.raw, error.kind());
            }
        }
    }

    println!("{} resolved, {} skipped", resolved, skipped);
    Ok(())
}
