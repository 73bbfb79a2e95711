//! nanoctl: NanoDLP adapter CLI
//!
//! Operator interface for a single NanoDLP device, going through the same
//! caches and retry policy a UI would.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nanodlp_adapter::{AdapterConfig, NanoDlpAdapter, StatusMap, ThumbnailSize};

/// NanoDLP adapter CLI
#[derive(Parser)]
#[command(name = "nanoctl")]
#[command(version = nanodlp_adapter::PKG_VERSION)]
#[command(about = "Query and control a NanoDLP printer")]
struct Args {
    /// Device base URL (overrides the config file)
    #[arg(short, long, env = "NANODLP_URL")]
    url: Option<String>,

    /// Config file (default: ~/.nanodlp-adapter/config.toml, then /etc)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized status once
    Status,

    /// Poll status until interrupted
    Watch {
        /// Poll interval in milliseconds (default: from config)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// List plates under a directory
    Plates {
        /// Directory to list (default: root)
        #[arg(default_value = "")]
        directory: String,
        /// Bypass the plate list cache
        #[arg(long)]
        refresh: bool,
    },

    /// Save a plate thumbnail as PNG
    Thumbnail {
        /// Plate file path
        path: String,
        /// "Large" (800x480) or "Small" (400x400)
        #[arg(short, long, default_value = "Large")]
        size: String,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Save a rendered layer as PNG
    Layer {
        /// Plate ID
        plate: i64,
        /// Layer number
        layer: u32,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Start printing a plate by file path
    Start {
        /// Plate file path
        path: String,
    },

    /// Stop the running job
    Stop,

    /// Pause the running job
    Pause,

    /// Resume a paused job
    Resume,

    /// Emergency stop
    Estop,

    /// Move the build plate to an absolute height
    MoveTo {
        /// Target height in millimetres
        mm: f64,
    },

    /// Show device notifications
    Notifications,
}

/// Resolve config: explicit file, then the standard locations, then
/// built-in defaults. `--url` wins over any file.
fn load_config(args: &Args) -> Result<AdapterConfig, Box<dyn std::error::Error>> {
    let config = match (&args.config, &args.url) {
        (Some(path), _) => AdapterConfig::load(Some(path.as_path()))?,
        (None, Some(_)) => AdapterConfig::load(None).unwrap_or_default(),
        (None, None) => AdapterConfig::load(None)?,
    };
    Ok(match &args.url {
        Some(url) => AdapterConfig {
            base_url: url.clone(),
            ..config
        },
        None => config,
    })
}

fn print_status(status: &StatusMap) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(status)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let poll_interval = config.status.poll_interval_duration();
    let adapter = NanoDlpAdapter::from_config(config)?;

    match args.command {
        Command::Status => {
            print_status(&adapter.get_status().await?)?;
        }

        Command::Watch { interval_ms } => {
            let interval = interval_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(poll_interval);
            // Next poll starts only after the previous one finished.
            loop {
                match adapter.get_status().await {
                    Ok(status) => {
                        let layer = &status["print_data"]["layer_id"];
                        let total = &status["print_data"]["total_layers"];
                        let file = &status["print_data"]["file_data"]["name"];
                        println!(
                            "{} layer {layer}/{total} z={} file={file}",
                            status["status"], status["z"]
                        );
                    }
                    Err(e) => tracing::warn!(error = %e, "status poll failed"),
                }
                tokio::time::sleep(interval).await;
            }
        }

        Command::Plates { directory, refresh } => {
            if refresh {
                adapter.plates(true).await;
            }
            let listing = adapter.list_items(&directory).await;
            for dir in &listing.directories {
                println!("{dir}/");
            }
            for plate in &listing.files {
                println!(
                    "{}\t{}\t{} layers",
                    plate
                        .plate_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".into()),
                    plate.path,
                    plate
                        .layer_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "?".into()),
                );
            }
            if listing.files.is_empty() && listing.directories.is_empty() {
                println!("no plates");
            }
        }

        Command::Thumbnail { path, size, out } => {
            let png = adapter
                .get_file_thumbnail(&path, ThumbnailSize::from_name(&size))
                .await;
            std::fs::write(&out, &png)?;
            println!("wrote {} bytes to {}", png.len(), out.display());
        }

        Command::Layer { plate, layer, out } => {
            let png = adapter.get_plate_layer_image(plate, layer).await;
            std::fs::write(&out, &png)?;
            println!("wrote {} bytes to {}", png.len(), out.display());
        }

        Command::Start { path } => {
            let plate = adapter.start_print(&path).await?;
            println!(
                "started {} (plate {})",
                plate.name,
                plate.plate_id.unwrap_or_default()
            );
        }

        Command::Stop => {
            adapter.stop_print().await?;
            println!("stop requested");
        }

        Command::Pause => {
            adapter.pause_print().await?;
            println!("paused");
        }

        Command::Resume => {
            adapter.resume_print().await?;
            println!("resumed");
        }

        Command::Estop => {
            adapter.emergency_stop().await?;
            println!("emergency stop sent");
        }

        Command::MoveTo { mm } => {
            adapter.move_to_height(mm).await?;
            println!("moved to {mm} mm");
        }

        Command::Notifications => {
            let notifications = adapter.notifications().await;
            if notifications.is_empty() {
                println!("no notifications");
            }
            for notification in notifications {
                println!("{notification}");
            }
        }
    }

    Ok(())
}
