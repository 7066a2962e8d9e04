use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use slideweave_core::muxing::infrastructure::output_location::{
    default_output_dir, default_output_path,
};
use slideweave_core::pipeline::infrastructure::background_encode::{
    spawn_file_encode, EncodeEvent,
};
use slideweave_core::shared::encode_settings::{EncodeSettings, Resolution, Timing};

/// Turn an ordered list of images into an H.264 MP4 slideshow.
#[derive(Parser)]
#[command(name = "slideweave")]
struct Cli {
    /// Input images, in display order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output file. Defaults to output_<millis>.mp4 in the platform video directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON settings file; explicit flags override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output width in pixels (even).
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Output height in pixels (even).
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Use 640x480 instead of the 720x720 default.
    #[arg(long, conflicts_with_all = ["width", "height"])]
    vga: bool,

    /// Total video length in milliseconds, split evenly across images.
    #[arg(long, conflicts_with = "fps")]
    duration_ms: Option<u64>,

    /// Fixed frame rate; each image is shown for one frame. A bare `--fps` uses 30,
    /// otherwise pass `--fps=<N>`.
    #[arg(long, num_args = 0..=1, require_equals = true)]
    fps: Option<Option<u32>>,

    /// Target bit rate in bits per second.
    #[arg(long)]
    bit_rate: Option<u64>,

    /// Seconds between keyframes.
    #[arg(long)]
    keyframe_interval: Option<u32>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = build_settings(&cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&default_output_dir()));

    log::debug!(
        "Encoding {} images at {}x{}",
        cli.images.len(),
        settings.resolution.width,
        settings.resolution.height
    );
    let handle = spawn_file_encode(settings, cli.images, output.clone());
    for event in handle.events.iter() {
        match event {
            EncodeEvent::Progress(fraction) => {
                eprint!("\rEncoding {:.0}%", fraction * 100.0);
                let _ = std::io::stderr().flush();
            }
            EncodeEvent::Completed => {
                eprintln!();
                println!("{}", output.display());
                return Ok(());
            }
            EncodeEvent::Failed {
                kind,
                stage,
                message,
            } => {
                eprintln!();
                return Err(format!("{kind} error during {stage}: {message}").into());
            }
            EncodeEvent::Cancelled => {
                eprintln!();
                return Err("Encode cancelled".into());
            }
        }
    }
    Err("Encoder thread exited without reporting a result".into())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(missing) = cli.images.iter().find(|p| !p.exists()) {
        return Err(format!("Input image not found: {}", missing.display()).into());
    }
    if let Some(path) = &cli.settings {
        if !path.exists() {
            return Err(format!("Settings file not found: {}", path.display()).into());
        }
    }
    if cli.duration_ms == Some(0) {
        return Err("Duration must be positive".into());
    }
    if cli.fps == Some(Some(0)) {
        return Err("Frame rate must be positive".into());
    }
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<EncodeSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => EncodeSettings::load(path)?,
        None => EncodeSettings::default(),
    };

    if cli.vga {
        settings.resolution = Resolution::VGA;
    }
    if let (Some(width), Some(height)) = (cli.width, cli.height) {
        settings.resolution = Resolution::new(width, height);
    }
    if let Some(ms) = cli.duration_ms {
        settings.timing = Timing::TotalDurationUs(ms.saturating_mul(1_000));
    }
    match cli.fps {
        Some(Some(fps)) => settings.timing = Timing::FrameRate(fps),
        Some(None) => settings.timing = Timing::default_frame_rate(),
        None => {}
    }
    if let Some(bit_rate) = cli.bit_rate {
        settings.bit_rate = bit_rate;
    }
    if let Some(secs) = cli.keyframe_interval {
        settings.keyframe_interval_secs = secs;
    }

    settings.validate()?;
    Ok(settings)
}
