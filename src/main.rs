mod config;
mod core;
mod decoder;
mod error;
mod logging;
mod renderer;
mod ui;
mod viewer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::core::extractor::{spawn_extraction, ExtractionEvent, ExtractionJob, ExtractionOutcome};
use crate::core::sampler::SamplingMethod;
use crate::renderer::DisplayMode;

#[derive(Parser)]
#[command(author, version, about = "Webcam recorder with automatic image extraction", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/camreel/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[arg(long, global = true, default_value = "camreel.log")]
    log_file: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live preview; toggle recording with [r]. Default when no command is given.
    Record {
        #[arg(short, long)]
        device: Option<i32>,
        #[arg(short = 'n', long)]
        count: Option<usize>,
        #[arg(long, value_enum)]
        method: Option<SamplingMethod>,
        #[arg(short, long, value_enum, default_value_t = DisplayMode::Rgb)]
        mode: DisplayMode,
    },
    /// Extract stills from an existing video
    Extract {
        /// Video to sample; picked from the recordings folder when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(short = 'n', long)]
        count: Option<usize>,
        #[arg(long, value_enum)]
        method: Option<SamplingMethod>,
        /// Stride for the interval method
        #[arg(long)]
        interval: Option<usize>,
        #[arg(short, long)]
        quality: Option<i32>,
    },
    /// Browse a batch of images
    View {
        files: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = DisplayMode::Rgb)]
        mode: DisplayMode,
    },
    /// Write the default config to a file
    Config {
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_file, cli.verbose)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Record {
        device: None,
        count: None,
        method: None,
        mode: DisplayMode::Rgb,
    });

    match command {
        Commands::Record { device, count, method, mode } => {
            if let Some(device) = device {
                config.camera.device_index = device;
            }
            apply_extraction_overrides(&mut config, count, method, None, None);
            config.validate()?;
            print_banner(&config);
            ui::recorder_app::run(config, mode)?;
        }
        Commands::Extract { input, output_dir, count, method, interval, quality } => {
            apply_extraction_overrides(&mut config, count, method, interval, quality);
            config.validate()?;
            run_extract(&config, input, output_dir)?;
        }
        Commands::View { files, mode } => {
            ui::viewer_app::run(config.viewer.clone(), files, mode)?;
        }
        Commands::Config { path } => {
            let path = path
                .or_else(AppConfig::default_path)
                .context("No config directory on this platform, pass a path")?;
            AppConfig::default().save(&path)?;
            println!("✓ Wrote default config to {}", path.display());
        }
    }

    Ok(())
}

fn apply_extraction_overrides(
    config: &mut AppConfig,
    count: Option<usize>,
    method: Option<SamplingMethod>,
    interval: Option<usize>,
    quality: Option<i32>,
) {
    let extraction = &mut config.extraction;
    if let Some(count) = count {
        extraction.image_count = count;
    }
    if let Some(method) = method {
        extraction.method = method;
    }
    if let Some(interval) = interval {
        extraction.frame_interval = interval;
    }
    if let Some(quality) = quality {
        extraction.jpeg_quality = quality;
    }
}

fn print_banner(config: &AppConfig) {
    println!("{}", "=".repeat(70));
    println!("Webcam Recorder with Automatic Image Extraction");
    println!("{}", "=".repeat(70));
    println!("  • Camera: index {} at {}×{} @ {} FPS", config.camera.device_index, config.camera.width, config.camera.height, config.camera.fps);
    println!("  • Images to Extract: {} per video ({})", config.extraction.image_count, config.extraction.method);
    println!("  • Image Quality: {}%", config.extraction.jpeg_quality);
    println!("  • Videos: {}/", config.recording.output_dir.display());
    println!("  • Images: {}/video_TIMESTAMP/", config.extraction.images_dir.display());
    println!("{}", "=".repeat(70));
}

fn run_extract(config: &AppConfig, input: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<()> {
    let input = match input {
        Some(path) => path,
        None => match ui::menu::pick_video(&config.recording.output_dir)? {
            Some(path) => path,
            None => return Ok(()),
        },
    };

    let mut job = ExtractionJob::for_video(&input, &config.extraction);
    if let Some(dir) = output_dir {
        job.output_dir = dir;
    }

    println!("Extracting {} images from {}...", job.count, input.display());
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = spawn_extraction(job, tx)?;

    for event in rx {
        match event {
            ExtractionEvent::Started { total_frames, planned, .. } => {
                println!("  Total frames: {} | sampling {}", total_frames, planned);
            }
            ExtractionEvent::Progress { done, planned, file } => {
                println!("  ✓ [{}/{}] {}", done, planned, file.display());
            }
            ExtractionEvent::Skipped { frame } => println!("  ✗ Failed to read frame {}", frame),
            ExtractionEvent::Finished(_) => {}
        }
    }

    match handle.join() {
        Ok(ExtractionOutcome::Complete(report)) => {
            println!(
                "✓ Image extraction complete: {}/{} saved to {}",
                report.extracted,
                report.attempted,
                report.output_dir.display()
            );
            Ok(())
        }
        Ok(ExtractionOutcome::FailedToOpen(reason)) | Ok(ExtractionOutcome::Aborted(reason)) => {
            anyhow::bail!("Image extraction failed: {}", reason)
        }
        Err(_) => anyhow::bail!("Extraction thread panicked"),
    }
}
