use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::{Builder, Target};
use image::Rgb;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use vidcompare::{
    BatchReport, BatchRunner, Comparator, ComparisonConfig, ExtractOptions, FrameRateNormalizer,
    KeyColorMask, NormalizationOutcome, ProgressCallback, ProgressFactory, ProgressInfo, ResizeShape,
    VideoExtractor, VideoSource,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidcompare compare --config config.toml --progress\n  vidcompare compare --config config.toml --json --report report.json\n  vidcompare extract input.mp4 --out frames --resize 800x800 --workers 8\n  vidcompare normalize reference.mp4 generated/\n  vidcompare metadata input.mp4 --json\n  vidcompare completions zsh > _vidcompare";

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Debug, Parser)]
#[command(
    name = "vidcompare",
    version,
    about = "Compare generated videos against a reference, frame by frame",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Log at debug level.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show progress bars while extracting.
    #[arg(long, global = true)]
    progress: bool,

    /// Log level (off, error, warn, info, debug, trace). Also applied to FFmpeg.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write the log to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Worker thread count for extraction and metric computation.
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare every generated video in a folder against a reference.
    #[command(
        about = "Compare a folder of videos against a reference",
        after_help = "Examples:\n  vidcompare compare --config config.toml\n  vidcompare compare --original ref.mp4 --generated out/ --resize none --json\n  vidcompare compare --config config.toml --mask-key 00b140 --mask-tolerance 30"
    )]
    Compare {
        /// TOML settings file. Optional when --original and --generated are given.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Reference video (overrides the settings file).
        #[arg(long)]
        original: Option<PathBuf>,
        /// Folder of generated videos (overrides the settings file).
        #[arg(long)]
        generated: Option<PathBuf>,
        /// Resize target as HEIGHTxWIDTH, or `none`.
        #[arg(long)]
        resize: Option<String>,
        /// Queue capacity between the reader and the workers.
        #[arg(long)]
        capacity: Option<usize>,
        /// Skip frame-rate normalization.
        #[arg(long)]
        no_normalize: bool,
        /// Black out this backdrop colour (RRGGBB) in both videos before measuring.
        #[arg(long)]
        mask_key: Option<String>,
        /// Per-channel tolerance for --mask-key.
        #[arg(long, default_value_t = 0)]
        mask_tolerance: u8,
        /// `ffmpeg` binary used for normalization.
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
        /// Print the batch report as JSON.
        #[arg(long)]
        json: bool,
        /// Write the batch report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the extraction pipeline and save every frame as an image.
    #[command(
        about = "Extract video frames",
        after_help = "Examples:\n  vidcompare extract input.mp4 --out frames\n  vidcompare extract input.mp4 --out frames --resize 480x640 --ext jpg --progress"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,
        /// Output directory for extracted frame images.
        #[arg(long)]
        out: PathBuf,
        /// Resize target as HEIGHTxWIDTH, or `none`.
        #[arg(long)]
        resize: Option<String>,
        /// Worker thread count (defaults to --threads, then 4).
        #[arg(long)]
        workers: Option<usize>,
        /// Queue capacity between the reader and the workers.
        #[arg(long)]
        capacity: Option<usize>,
        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
    },

    /// Rewrite generated videos to the frame rate of a reference video.
    #[command(about = "Normalize frame rates with ffmpeg")]
    Normalize {
        /// Reference video.
        reference: PathBuf,
        /// Folder of generated `.mp4` videos, rewritten in place.
        folder: PathBuf,
        /// `ffmpeg` binary to use.
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
        /// Print the outcomes as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print metadata for a video file.
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  vidcompare metadata input.mp4\n  vidcompare metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse `HEIGHTxWIDTH` (or `none`).
fn parse_resize(value: &str) -> Result<Option<ResizeShape>, String> {
    let trimmed = value.trim().to_ascii_lowercase();
    if trimmed == "none" || trimmed.is_empty() {
        return Ok(None);
    }
    let (height, width) = trimmed
        .split_once('x')
        .ok_or(format!("invalid --resize (expected HEIGHTxWIDTH): {value}"))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid --resize height: {value}"))?;
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid --resize width: {value}"))?;
    if height == 0 || width == 0 {
        return Err(format!("--resize dimensions must be non-zero: {value}"));
    }
    Ok(Some(ResizeShape::new(height, width)))
}

/// Parse a backdrop colour as `RRGGBB`, with or without a leading `#`.
fn parse_key_color(value: &str) -> Result<Rgb<u8>, String> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("invalid --mask-key (expected RRGGBB): {value}"));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|_| format!("invalid --mask-key (expected RRGGBB): {value}"))
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.to_ascii_lowercase().as_str() {
        "warning" => Some(LevelFilter::Warn),
        "quiet" => Some(LevelFilter::Off),
        other => other.parse().ok(),
    }
}

fn log_level(global: &GlobalOptions) -> Result<LevelFilter, Box<dyn std::error::Error>> {
    match &global.log_level {
        Some(level) => {
            Ok(parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?)
        }
        None if global.verbose => Ok(LevelFilter::Debug),
        None => Ok(LevelFilter::Info),
    }
}

/// Install the logger, writing to `log_file` when given.
fn init_logging(
    global: &GlobalOptions,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = log_level(global)?;
    let ffmpeg_level = if global.verbose || global.log_level.is_some() {
        level
    } else {
        LevelFilter::Error
    };
    vidcompare::set_ffmpeg_log_level(ffmpeg_level);

    let mut builder = Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            buf.timestamp_millis(),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::options().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

fn apply_threads(global: &GlobalOptions) {
    if let Some(threads) = global.threads {
        if threads > 0 {
            unsafe {
                std::env::set_var("RAYON_NUM_THREADS", threads.to_string());
            }
        }
    }
}

/// Renders one extraction as an `indicatif` bar.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(name: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {msg} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]",
        ) {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(format!("Extracting Frames from {name}"));
        Self { bar }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.current));
        }
        self.bar.set_position(info.current);
        if info.total.is_some_and(|total| info.current >= total) {
            self.bar.finish();
        }
    }
}

fn progress_factory() -> ProgressFactory {
    Arc::new(|name: &str| Arc::new(TerminalProgress::new(name)) as Arc<dyn ProgressCallback>)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.4}"))
}

fn print_batch_summary(report: &BatchReport) {
    for outcome in &report.normalization {
        match outcome {
            NormalizationOutcome::Converted {
                path,
                from_fps,
                to_fps,
            } => println!(
                "{} {} ({from_fps:.3} -> {to_fps:.3} fps)",
                "normalized".cyan().bold(),
                path.display()
            ),
            NormalizationOutcome::Failed { path, reason } => eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("could not normalize {}: {reason}", path.display()).yellow()
            ),
            NormalizationOutcome::Unchanged { .. } => {}
        }
    }

    println!(
        "Reference: {} ({} frames)",
        report.reference.display(),
        report.reference_frames
    );
    for entry in &report.videos {
        match (&entry.report, &entry.error) {
            (Some(video), _) => println!(
                "{} {}: {} frames, MSE {}, PSNR {}, SSIM {}, landmarks {}",
                "ok".green().bold(),
                file_name(&entry.path),
                video.frames_compared,
                format_metric(video.average_mse),
                format_metric(video.average_psnr),
                format_metric(video.average_ssim),
                format_metric(video.average_landmark_difference),
            ),
            (None, Some(error)) => println!(
                "{} {}: {}",
                "failed".red().bold(),
                file_name(&entry.path),
                error.red()
            ),
            (None, None) => {}
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_threads(&cli.global);

    match cli.command {
        Commands::Compare {
            config,
            original,
            generated,
            resize,
            capacity,
            no_normalize,
            mask_key,
            mask_tolerance,
            ffmpeg,
            json,
            report,
        } => {
            let mut settings = match (config, &original, &generated) {
                (Some(path), _, _) => ComparisonConfig::load(path)?,
                (None, Some(original), Some(generated)) => {
                    ComparisonConfig::new(original.clone(), generated.clone())
                }
                (None, _, _) => ComparisonConfig::load(DEFAULT_CONFIG)?,
            };
            if let Some(original) = original {
                settings.original_video_path = original;
            }
            if let Some(generated) = generated {
                settings.generated_videos_folder = generated;
            }
            if let Some(resize) = resize {
                settings.resize_shape = parse_resize(&resize)?
                    .map(|shape| vec![shape.height, shape.width])
                    .unwrap_or_default();
            }
            if let Some(threads) = cli.global.threads {
                settings.num_workers = threads;
            }
            if let Some(capacity) = capacity {
                settings.queue_capacity = capacity;
            }
            if no_normalize {
                settings.normalize_frame_rate = false;
            }
            if let Some(ffmpeg) = ffmpeg {
                settings.ffmpeg_path = ffmpeg;
            }

            let log_file = cli
                .global
                .log_file
                .clone()
                .unwrap_or_else(|| settings.log_file.clone());
            init_logging(&cli.global, Some(&log_file))?;

            let mut runner = BatchRunner::new();
            if let Some(key) = mask_key {
                let mask =
                    KeyColorMask::new(parse_key_color(&key)?).with_tolerance(mask_tolerance);
                runner = runner.with_comparator(Comparator::new().with_mask(Arc::new(mask)));
            }
            if cli.global.progress {
                runner = runner.with_progress_factory(progress_factory());
            }
            let batch = runner.run(&settings)?;

            if let Some(path) = &report {
                fs::write(path, batch.to_json_pretty()?)?;
                println!("{} {}", "saved".green().bold(), path.display());
            }
            if json {
                println!("{}", batch.to_json_pretty()?);
            } else {
                print_batch_summary(&batch);
            }

            if batch.failure_count() > 0 {
                let failed = batch.failure_count();
                return Err(format!("{failed} video(s) could not be compared").into());
            }
        }
        Commands::Extract {
            input,
            out,
            resize,
            workers,
            capacity,
            ext,
        } => {
            init_logging(&cli.global, cli.global.log_file.as_deref())?;

            let mut options = ExtractOptions::new();
            if let Some(resize) = resize {
                options = options.with_resize_shape(parse_resize(&resize)?);
            }
            if let Some(workers) = workers.or(cli.global.threads) {
                options = options.with_workers(workers);
            }
            if let Some(capacity) = capacity {
                options = options.with_queue_capacity(capacity);
            }
            if cli.global.progress {
                let bar = TerminalProgress::new(&file_name(&input));
                options = options.with_progress(Arc::new(bar));
            }

            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();
            fs::create_dir_all(&out)?;

            let frames = VideoExtractor::open(&input)?.extract(&options)?;
            for (index, frame) in frames.iter().enumerate() {
                let output_path = out.join(format!("frame_{index:06}.{ext_clean}"));
                frame.save(&output_path)?;
                if cli.global.verbose {
                    eprintln!("saved frame {index} -> {}", output_path.display());
                }
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {} frame(s) to {}", frames.len(), out.display()).green()
            );
        }
        Commands::Normalize {
            reference,
            folder,
            ffmpeg,
            json,
        } => {
            init_logging(&cli.global, cli.global.log_file.as_deref())?;

            let normalizer = FrameRateNormalizer::new().ffmpeg_path(ffmpeg);
            if !normalizer.is_available() {
                return Err("ffmpeg is not installed or not found in PATH".into());
            }
            let outcomes = normalizer.normalize_folder(&reference, &folder)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                for outcome in &outcomes {
                    match outcome {
                        NormalizationOutcome::Unchanged { path } => {
                            println!("{} {}", "unchanged".dimmed(), path.display());
                        }
                        NormalizationOutcome::Converted {
                            path,
                            from_fps,
                            to_fps,
                        } => println!(
                            "{} {} ({from_fps:.3} -> {to_fps:.3} fps)",
                            "converted".green().bold(),
                            path.display()
                        ),
                        NormalizationOutcome::Failed { path, reason } => println!(
                            "{} {}: {}",
                            "failed".red().bold(),
                            path.display(),
                            reason.red()
                        ),
                    }
                }
            }
        }
        Commands::Metadata { input, json } => {
            init_logging(&cli.global, cli.global.log_file.as_deref())?;

            let metadata = VideoSource::probe(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    metadata.width, metadata.height, metadata.frames_per_second, metadata.codec,
                );
                println!("Frames: {}", metadata.frame_count);
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidcompare", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
