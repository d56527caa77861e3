use anyhow::{bail, Context, Result};
use bf_copy::logging::init_logging;
use bf_copy::state::config::AppConfig;
use bf_copy::transfer::{list_sessions, plan_and_copy, CopyRequest};
use bf_copy::PreviewService;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bf-copy", version, about = "Copy camera sessions into dated folders")]
struct Cli {
    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List capture sessions under <CAMERA_ROOT>/DCIM
    Sessions { camera_root: PathBuf },

    /// Copy a session folder, skipping files already at the destination
    Copy {
        source: PathBuf,

        /// Name appended to the date in the destination folder
        #[arg(short, long)]
        label: String,

        #[arg(long, env = "BF_COPY_PHOTO_DEST")]
        photo_dest: Option<PathBuf>,

        #[arg(long, env = "BF_COPY_VIDEO_DEST")]
        video_dest: Option<PathBuf>,

        #[arg(long)]
        subfolder: Option<String>,
    },

    /// Thumbnails for the first JPEGs in a folder
    Thumbnails {
        folder: PathBuf,
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Bounded full-size preview of one image
    Preview { file: PathBuf },

    /// Thumbnail cache housekeeping
    Cache {
        #[command(subcommand)]
        action: CacheAction,
        #[arg(long, global = true)]
        cache_dir: Option<PathBuf>,
    },

    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Stats,
    Clear,
    Maintenance,
    Orphans,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        photo_dest: Option<PathBuf>,
        #[arg(long)]
        video_dest: Option<PathBuf>,
        #[arg(long)]
        subfolder: Option<String>,
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        #[arg(long)]
        thumbnail_limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load()
        .context("Failed to load configuration")?
        .unwrap_or_default();

    match cli.command {
        Commands::Sessions { camera_root } => {
            let sessions = list_sessions(&camera_root);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("No capture sessions found under {}", camera_root.display());
            } else {
                for session in sessions {
                    let date = session
                        .date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<16} {:>10}  {:>5} files  {:>9}",
                        session.name, date, session.files, session.size
                    );
                }
            }
        }

        Commands::Copy {
            source,
            label,
            photo_dest,
            video_dest,
            subfolder,
        } => {
            let photo_root = photo_dest
                .or_else(|| config.photo_destination.clone())
                .context("No photo destination: pass --photo-dest or run `config set`")?;
            let video_root = video_dest
                .or_else(|| config.video_destination.clone())
                .context("No video destination: pass --video-dest or run `config set`")?;
            let subfolder = subfolder.unwrap_or_else(|| config.subfolder.clone());
            let request =
                CopyRequest::new(source, photo_root, video_root, label).with_subfolder(subfolder);

            let bar = ProgressBar::new(0);
            bar.set_style(progress_style());
            let result = plan_and_copy(request, |p| {
                bar.set_length(p.total as u64);
                bar.set_position(p.current as u64);
                bar.set_message(p.file_name.clone());
            })
            .await;
            bar.finish_and_clear();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if !result.success {
                bail!(
                    "Copy failed: {}",
                    result.message.as_deref().unwrap_or("unknown error")
                );
            } else if result.is_up_to_date() {
                println!("Already up to date: {} files skipped", result.skipped());
            } else {
                println!(
                    "Copied {} photos, {} videos; skipped {}; {} failed",
                    result.copied_photos,
                    result.copied_videos,
                    result.skipped(),
                    result.errors.len()
                );
                for failure in &result.errors {
                    println!("  {}: {}", failure.file_name, failure.error);
                }
            }
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Thumbnails { folder, cache_dir } => {
            let service = preview_service(&config, cache_dir);
            let thumbnails = service.get_thumbnails(&folder).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&thumbnails)?);
            } else {
                for thumb in thumbnails {
                    println!("{}  ({} bytes encoded)", thumb.file_name, thumb.preview.len());
                }
            }
        }

        Commands::Preview { file } => {
            let service = preview_service(&config, None);
            let preview = service
                .get_full_size_preview(&file)
                .await
                .with_context(|| format!("Failed to preview {}", file.display()))?;
            println!("{}", preview);
        }

        Commands::Cache { action, cache_dir } => {
            let service = preview_service(&config, cache_dir);
            match action {
                CacheAction::Stats => {
                    let stats = service.cache_stats().await?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&stats)?);
                    } else {
                        println!(
                            "{} entries, {} in {}",
                            stats.total_entries,
                            bf_copy::transfer::format_file_size(stats.total_size),
                            stats.cache_dir.display()
                        );
                    }
                }
                CacheAction::Clear => {
                    service.clear_cache().await?;
                    println!("Thumbnail cache cleared");
                }
                CacheAction::Maintenance => {
                    let report = service.cache_maintenance().await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                CacheAction::Orphans => {
                    let report = service.remove_orphans().await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                for problem in config.validate() {
                    println!("warning: {}", problem);
                }
                let check = config.check_paths();
                if config.photo_destination.is_some() && !check.photo_destination_exists {
                    println!("warning: photo destination does not exist yet");
                }
                if config.video_destination.is_some() && !check.video_destination_exists {
                    println!("warning: video destination does not exist yet");
                }
            }
            ConfigAction::Set {
                photo_dest,
                video_dest,
                subfolder,
                cache_dir,
                thumbnail_limit,
            } => {
                let mut updated = config;
                if photo_dest.is_some() {
                    updated.photo_destination = photo_dest;
                }
                if video_dest.is_some() {
                    updated.video_destination = video_dest;
                }
                if let Some(subfolder) = subfolder {
                    updated.subfolder = subfolder;
                }
                if cache_dir.is_some() {
                    updated.cache_dir = cache_dir;
                }
                if let Some(limit) = thumbnail_limit {
                    updated.thumbnail_limit = limit;
                }
                let path = updated.save().context("Failed to save configuration")?;
                println!("Saved {}", path.display());
            }
        },
    }

    Ok(())
}

fn preview_service(config: &AppConfig, cache_dir: Option<PathBuf>) -> PreviewService {
    PreviewService::new(cache_dir.or_else(|| config.cache_dir.clone()))
        .with_thumbnail_limit(config.thumbnail_limit)
}

fn progress_style() -> ProgressStyle {
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        Ok(style) => style.progress_chars("##-"),
        Err(_) => ProgressStyle::default_bar(),
    }
}
