use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use mvcapture::{
    CaptureOptions, CaptureSession, CapturedFrame, ErrorPolicy, FfmpegLogLevel,
    MOTION_VECTOR_COLUMNS, MotionVector, PixelFormat, RtspTransport, StreamInfo,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  mvcapture info input.mp4 --json\n  mvcapture extract input.mp4 --out dump --images --progress\n  mvcapture extract rtsp://camera.local/stream1 --out dump --max-frames 300 --mv-format json\n  mvcapture completions zsh > _mvcapture";

#[derive(Debug, Parser)]
#[command(
    name = "mvcapture",
    version,
    about = "Extract motion vectors and frames from H.264 and MPEG-4 video",
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
    /// Print a line per processed frame.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Allow writing into an existing output directory.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Pixel format of saved frames (bgr8, rgb8, rgba8, gray8).
    #[arg(long)]
    pixel_format: Option<String>,

    /// Stop at the first damaged packet instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Use UDP instead of TCP for RTSP inputs.
    #[arg(long)]
    rtsp_udp: bool,

    /// Network socket timeout in seconds (0 disables it).
    #[arg(long)]
    timeout: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum MotionVectorFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stream information.
    #[command(
        about = "Print stream information",
        visible_alias = "probe",
        after_help = "Examples:\n  mvcapture info input.mp4\n  mvcapture info input.mp4 --json"
    )]
    Info {
        /// Input video path or URL.
        input: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode a video and dump per-frame motion vectors.
    #[command(
        about = "Dump motion vectors, frame types and timestamps",
        after_help = "Output layout:\n  <out>/motion_vectors/mvs_<n>.csv|json  one file per frame\n  <out>/frames/frame_<n>.png            with --images\n  <out>/frame_types.txt                 one picture type letter per frame\n  <out>/timestamps.txt                  frame number, pts, seconds, capture time\n\nExamples:\n  mvcapture extract input.mp4 --out dump\n  mvcapture extract input.mp4 --out dump --images --max-frames 100"
    )]
    Extract {
        /// Input video path or URL.
        input: String,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        /// Also save every frame as PNG.
        #[arg(long)]
        images: bool,
        /// Motion vector file format.
        #[arg(long, value_enum, default_value_t = MotionVectorFormat::Csv)]
        mv_format: MotionVectorFormat,
        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "bgr8" | "bgr" | "bgr24" => Some(PixelFormat::Bgr8),
        "rgb8" | "rgb" | "rgb24" => Some(PixelFormat::Rgb8),
        "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn capture_options(global: &GlobalOptions) -> Result<CaptureOptions, Box<dyn std::error::Error>> {
    let mut options = CaptureOptions::new();

    if let Some(pixel) = &global.pixel_format {
        let format =
            parse_pixel_format(pixel).ok_or(format!("unsupported --pixel-format: {pixel}"))?;
        options = options.with_pixel_format(format);
    }
    if global.strict {
        options = options.with_error_policy(ErrorPolicy::Strict);
    }
    if global.rtsp_udp {
        options = options.with_rtsp_transport(RtspTransport::Udp);
    }
    match global.timeout {
        Some(seconds) if seconds == 0.0 => options = options.without_socket_timeout(),
        Some(seconds) => {
            let timeout = Duration::try_from_secs_f64(seconds)
                .map_err(|_| format!("invalid --timeout: {seconds}"))?;
            options = options.with_socket_timeout(timeout);
        }
        None => {}
    }

    Ok(options)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        mvcapture::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn prepare_output_directory(out: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if out.exists() {
        if !overwrite {
            return Err(format!(
                "output directory already exists: {} (use --overwrite)",
                out.display()
            )
            .into());
        }
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("writing into existing directory {}", out.display()).yellow()
        );
    }
    fs::create_dir_all(out.join("motion_vectors"))?;
    Ok(())
}

fn motion_vectors_csv(vectors: &[MotionVector]) -> String {
    let mut text = MOTION_VECTOR_COLUMNS.join(",");
    text.push('\n');
    for vector in vectors {
        let row: Vec<String> = vector.to_row().iter().map(i32::to_string).collect();
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

fn motion_vectors_json(vectors: &[MotionVector]) -> serde_json::Value {
    let rows: Vec<_> = vectors
        .iter()
        .map(|vector| {
            let row = vector.to_row();
            let fields: serde_json::Map<String, serde_json::Value> = MOTION_VECTOR_COLUMNS
                .iter()
                .zip(row)
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            serde_json::Value::Object(fields)
        })
        .collect();
    json!(rows)
}

fn timestamp_line(captured: &CapturedFrame) -> String {
    let capture_seconds = captured
        .captured_at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0);
    match captured.pts {
        Some(pts) => {
            let base = captured.time_base;
            let seconds = if base.denominator() != 0 {
                pts as f64 * f64::from(base.numerator()) / f64::from(base.denominator())
            } else {
                0.0
            };
            format!(
                "{} {pts} {seconds:.6} {capture_seconds:.6}",
                captured.frame_number
            )
        }
        None => format!("{} - - {capture_seconds:.6}", captured.frame_number),
    }
}

fn print_info(info: &StreamInfo, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        let payload = json!({
            "format": info.format,
            "codec": info.codec,
            "width": info.width,
            "height": info.height,
            "fps": info.frames_per_second,
            "frame_count": info.frame_count,
            "duration_seconds": info.duration.as_secs_f64(),
            "time_base": [info.time_base.numerator(), info.time_base.denominator()],
            "stream_index": info.stream_index,
            "network": info.is_network,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Format: {}", info.format);
        println!("Duration: {:?}", info.duration);
        println!(
            "Video: {}x{} @ {:.2} fps [{}], stream #{}",
            info.width, info.height, info.frames_per_second, info.codec, info.stream_index
        );
        println!("Frames: ~{}", info.frame_count);
        println!("Time base: {}", info.time_base);
        if info.is_network {
            println!("Network stream");
        }
    }
    Ok(())
}

fn extract(
    global: &GlobalOptions,
    input: &str,
    out: &Path,
    images: bool,
    mv_format: MotionVectorFormat,
    max_frames: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    prepare_output_directory(out, global.overwrite)?;
    if images {
        fs::create_dir_all(out.join("frames"))?;
    }

    let mut session = CaptureSession::open_with_options(input, capture_options(global)?)?;
    let expected = match max_frames {
        Some(limit) => limit,
        None => session.info().frame_count,
    };

    let progress_bar = if global.progress {
        let bar = if expected > 0 {
            ProgressBar::new(expected)
        } else {
            ProgressBar::new_spinner()
        };
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Some(bar)
    } else {
        None
    };

    let mut frame_types = BufWriter::new(File::create(out.join("frame_types.txt"))?);
    let mut timestamps = BufWriter::new(File::create(out.join("timestamps.txt"))?);
    let mut vector_total = 0_u64;

    while max_frames.is_none_or(|limit| session.frames_delivered() < limit) {
        let Some(captured) = session.read()? else {
            break;
        };
        let number = captured.frame_number;

        let vector_path = match mv_format {
            MotionVectorFormat::Csv => {
                let path = out.join("motion_vectors").join(format!("mvs_{number:06}.csv"));
                fs::write(&path, motion_vectors_csv(&captured.motion_vectors))?;
                path
            }
            MotionVectorFormat::Json => {
                let path = out.join("motion_vectors").join(format!("mvs_{number:06}.json"));
                let payload = motion_vectors_json(&captured.motion_vectors);
                fs::write(&path, serde_json::to_string(&payload)?)?;
                path
            }
        };

        if images {
            let image_path = out.join("frames").join(format!("frame_{number:06}.png"));
            captured.frame.to_image()?.save(&image_path)?;
        }

        writeln!(frame_types, "{}", captured.frame_type.as_char())?;
        writeln!(timestamps, "{}", timestamp_line(&captured))?;
        vector_total += captured.motion_vectors.len() as u64;

        if let Some(bar) = &progress_bar {
            bar.inc(1);
        }
        if global.verbose {
            eprintln!(
                "frame {number} [{}] {} vectors -> {}",
                captured.frame_type,
                captured.motion_vectors.len(),
                vector_path.display()
            );
        }
    }

    frame_types.flush()?;
    timestamps.flush()?;
    if let Some(bar) = progress_bar {
        bar.finish_with_message("done");
    }

    let delivered = session.frames_delivered();
    let stats = session.close();
    if stats.transient_errors > 0 {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("skipped {} damaged packet(s)", stats.transient_errors).yellow()
        );
    }
    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Extracted {vector_total} motion vector(s) from {delivered} frame(s) to {}",
            out.display()
        )
        .green()
    );
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Info { input, json } => {
            let session = CaptureSession::open_with_options(&input, capture_options(&cli.global)?)?;
            print_info(session.info(), json)?;
        }
        Commands::Extract {
            input,
            out,
            images,
            mv_format,
            max_frames,
        } => {
            extract(&cli.global, &input, &out, images, mv_format, max_frames)?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "mvcapture", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
