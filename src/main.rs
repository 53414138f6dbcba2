use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use image_optimizer::batch::{log_summary, run_batch};
use image_optimizer::codec::NativeCodec;
use image_optimizer::config::{BatchConfig, ServerConfig};
use image_optimizer::models::{OutputFormat, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY};
use image_optimizer::optimizer::Optimizer;
use image_optimizer::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-optimizer")]
#[command(about = "Optimize JPEG, PNG and WebP images for the web")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Overrides HOST.
        #[arg(long)]
        host: Option<String>,
        /// Overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Optimize every image in a directory.
    Batch(BatchArgs),
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long, default_value = "input")]
    input: PathBuf,

    #[arg(long, default_value = "output")]
    output: PathBuf,

    #[arg(long, default_value = "backup")]
    backup: PathBuf,

    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH, value_parser = clap::value_parser!(u32).range(1..))]
    max_width: u32,

    /// Output format: jpeg, png or webp.
    #[arg(long, default_value = "jpeg", value_parser = parse_format_arg)]
    format: OutputFormat,

    /// Disable progressive/interlaced output.
    #[arg(long)]
    no_progressive: bool,

    /// Do not copy originals into the backup directory.
    #[arg(long)]
    no_backup: bool,
}

impl From<BatchArgs> for BatchConfig {
    fn from(args: BatchArgs) -> Self {
        Self {
            input_dir: args.input,
            output_dir: args.output,
            backup_dir: args.backup,
            quality: args.quality,
            max_width: args.max_width,
            format: args.format,
            progressive: !args.no_progressive,
            preserve_original: !args.no_backup,
        }
    }
}

fn parse_format_arg(input: &str) -> std::result::Result<OutputFormat, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid format '{}'. Expected one of: jpeg, png, webp", input))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_optimizer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let optimizer = Optimizer::new(NativeCodec::new());

    match args.command {
        Command::Serve { host, port } => {
            let mut config = match ServerConfig::from_env() {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            if let Err(e) = server::serve(&config, Arc::new(optimizer)).await {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Batch(batch_args) => {
            let config = BatchConfig::from(batch_args);
            info!(
                "Optimizing images in {} (quality {}, max width {}, format {})",
                config.input_dir.display(),
                config.quality,
                config.max_width,
                config.format
            );

            match run_batch(&optimizer, &config).await {
                Ok(summary) => {
                    log_summary(&summary);
                    Ok(())
                }
                Err(e) => {
                    error!("Batch run failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
