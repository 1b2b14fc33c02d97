//! # SnapReceipt CLI
//!
//! Command-line interface for the photo receipt kiosk.
//!
//! ## Usage
//!
//! ```bash
//! # Run the kiosk: Enter takes a photo, `a` aborts, `q` quits
//! snapreceipt run --snapshot /run/camera/latest.jpg --device /dev/usb/lp0
//!
//! # Convert one image to printer bytes, with a PNG preview
//! snapreceipt convert photo.jpg --output photo.bin --preview photo.png
//!
//! # Render previews for 10 random images starting with "IMG_"
//! snapreceipt batch ~/Pictures --prefix IMG_ --num 10 --seed 7 --out previews/
//!
//! # Ask the printer how it is doing
//! snapreceipt status --device /dev/usb/lp0
//!
//! # Decode a captured print stream back into an image
//! snapreceipt inspect photo.bin --png decoded.png
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

use snapreceipt::{
    Controller, KioskError, PrintTransport, PrinterConfig, Settings,
    error::ConfigError,
    frame::{FaceLocator, FaceRegion, FixedFace, NoFaces, SidecarFaces, SnapshotFileCamera},
    pipeline,
    protocol::{PrintJob, decode},
    render::dither::DitheringAlgorithm,
    runtime::{self, KeyboardInput},
    transport::{DevicePort, PrinterPort, StreamPort},
};

/// SnapReceipt - Photo receipt kiosk for ESC/POS thermal printers
#[derive(Parser, Debug)]
#[command(name = "snapreceipt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that builds a receipt.
#[derive(Args, Debug)]
struct SettingsArgs {
    /// TOML settings file (defaults are used when omitted)
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Printer preset overriding the settings file (tm-t88v, 58mm, 80mm)
    #[arg(long)]
    printer: Option<String>,

    /// Dithering algorithm overriding the settings file (bayer, fs, atkinson, threshold)
    #[arg(long)]
    dither: Option<String>,
}

#[derive(Args, Debug)]
struct FaceArgs {
    /// Where face boxes come from
    #[arg(long, value_enum, default_value_t = FaceMode::Sidecar)]
    faces: FaceMode,

    /// Fixed face box as x,y,w,h (implies --faces fixed)
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_face)]
    face: Option<FaceRegion>,

    /// Ignore sidecar faces below this confidence
    #[arg(long, default_value_t = 0.5)]
    min_confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FaceMode {
    /// No face detection; gain stays neutral
    None,
    /// Read `<image>.faces.json` written by an external detector
    Sidecar,
    /// Use the box given with --face
    Fixed,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the kiosk
    Run {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        faces: FaceArgs,

        /// Snapshot file kept fresh by the camera preview process
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        /// Ignore snapshots older than this many milliseconds
        #[arg(long, value_name = "MS")]
        max_age: Option<u64>,

        /// Printer device path, or `-` to write jobs to stdout
        #[arg(long, default_value = "/dev/usb/lp0")]
        device: String,
    },

    /// Convert an image file to printer bytes
    Convert {
        /// Input image
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        faces: FaceArgs,

        /// Write the print stream to this file
        #[arg(long, short, value_name = "FILE", conflicts_with = "device")]
        output: Option<PathBuf>,

        /// Send the print stream to this printer device
        #[arg(long)]
        device: Option<String>,

        /// Also save the composed receipt as PNG
        #[arg(long, value_name = "FILE")]
        preview: Option<PathBuf>,
    },

    /// Render previews for a random sample of images in a directory
    Batch {
        /// Directory containing images
        dir: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        faces: FaceArgs,

        /// Only consider files whose name starts with this prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// Number of images to sample
        #[arg(long, short, default_value_t = 10)]
        num: usize,

        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for PNG previews
        #[arg(long, default_value = "previews")]
        out: PathBuf,

        /// Also print every sampled receipt on this device, one after another
        #[arg(long)]
        device: Option<String>,
    },

    /// Query printer status
    Status {
        /// Printer device path
        #[arg(long, default_value = "/dev/usb/lp0")]
        device: String,
    },

    /// Decode a captured print stream
    Inspect {
        /// File holding raw printer bytes
        input: PathBuf,

        /// Save the decoded raster as PNG
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), KioskError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            settings,
            faces,
            snapshot,
            max_age,
            device,
        } => {
            let settings = load_settings(&settings)?;
            let mut camera = SnapshotFileCamera::new(&snapshot);
            if let Some(ms) = max_age {
                camera = camera.max_age(Duration::from_millis(ms));
            }
            let transport = PrintTransport::new(open_port(&device), &settings.transport);
            let locator = face_locator(&faces);

            info!(snapshot = %snapshot.display(), printer = %transport.describe(), "starting kiosk");
            eprintln!("Press Enter to take a photo, `a` + Enter to abort, `q` + Enter to quit.");

            let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            let controller = Controller::new(settings, Box::new(camera), locator, transport, Instant::now());
            let controller = rt.block_on(async move {
                let (tx, rx) = mpsc::channel(16);
                let _input = KeyboardInput::spawn(tx);
                runtime::run(controller, rx, runtime::POLL_INTERVAL).await
            });

            if let Some(outcome) = controller.last_outcome() {
                info!(%outcome, "last session");
            }
        }

        Commands::Convert {
            input,
            settings,
            faces,
            output,
            device,
            preview,
        } => {
            let settings = load_settings(&settings)?;
            let locator = face_locator(&faces);
            let processed = pipeline::process_file(&input, locator.as_ref(), &settings)?;
            eprintln!(
                "{}: gain {:.2}, {}x{} dots ({:.0} mm wide on {}), {} bytes",
                input.display(),
                processed.gain,
                processed.canvas.width(),
                processed.canvas.height(),
                settings.printer.width_mm(),
                settings.printer.name,
                processed.job.len()
            );

            if let Some(path) = preview {
                processed.canvas.save_png(&path)?;
                eprintln!("Saved preview to {}", path.display());
            }

            match (output, device) {
                (Some(path), _) => {
                    std::fs::write(&path, processed.job.as_bytes())?;
                    eprintln!("Wrote {}", path.display());
                }
                (None, Some(device)) => {
                    print_job(&device, &processed.job, &settings)?;
                    eprintln!("Printed successfully!");
                }
                (None, None) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(processed.job.as_bytes())?;
                    stdout.flush()?;
                }
            }
        }

        Commands::Batch {
            dir,
            settings,
            faces,
            prefix,
            num,
            seed,
            out,
            device,
        } => {
            let settings = load_settings(&settings)?;
            let locator = face_locator(&faces);
            let sample = sample_images(&dir, &prefix, num, seed)?;
            if sample.is_empty() {
                eprintln!("No images matching '{}' in {}", prefix, dir.display());
                return Ok(());
            }
            std::fs::create_dir_all(&out)?;

            eprintln!("Rendering {} images...", sample.len());
            let results: Vec<(PathBuf, Result<PrintJob, KioskError>)> = sample
                .par_iter()
                .map(|path| {
                    let result = pipeline::process_file(path, locator.as_ref(), &settings).and_then(|p| {
                        p.canvas.save_png(out.join(preview_name(path)))?;
                        Ok(p.job)
                    });
                    (path.clone(), result)
                })
                .collect();

            let mut jobs = Vec::new();
            for (path, result) in results {
                match result {
                    Ok(job) => {
                        println!("  ok    {}", path.display());
                        jobs.push(job);
                    }
                    Err(e) => println!("  fail  {} ({}: {})", path.display(), e.kind(), e),
                }
            }
            eprintln!("Previews in {}", out.display());

            if let Some(device) = device {
                let mut transport = PrintTransport::new(open_port(&device), &settings.transport);
                for job in &jobs {
                    // Stop at the first failure so nothing piles up behind a jammed printer.
                    transport.send(job)?;
                }
                eprintln!("Printed {} receipts", jobs.len());
            }
        }

        Commands::Status { device } => {
            let settings = Settings::default();
            let mut transport = PrintTransport::new(open_port(&device), &settings.transport);
            let status = transport.status()?;
            println!("{}: {}", transport.describe(), status);
            if let Some(fault) = status.fault() {
                println!("  {} ({})", fault, fault.kind());
            }
        }

        Commands::Inspect { input, png } => {
            let bytes = std::fs::read(&input)?;
            let job = decode::decode(&bytes)?;

            println!("{}: {} bytes", input.display(), bytes.len());
            println!("  initialized: {}", job.initialized);
            println!("  bands:       {}", job.bands);
            match &job.canvas {
                Some(canvas) => println!(
                    "  raster:      {}x{} dots, {} black",
                    canvas.width(),
                    canvas.height(),
                    canvas.count_black()
                ),
                None => println!("  raster:      none"),
            }
            println!("  feed lines:  {}", job.feed_lines);
            match job.cut {
                Some(mode) => println!("  cut:         {:?}", mode),
                None => println!("  cut:         none"),
            }

            if let Some(path) = png {
                let canvas = job.canvas.as_ref().ok_or_else(|| {
                    KioskError::Image(format!("{} contains no raster image", input.display()))
                })?;
                canvas.save_png(&path)?;
                println!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}

fn load_settings(args: &SettingsArgs) -> Result<Settings, KioskError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(name) = &args.printer {
        settings.printer = PrinterConfig::preset(name).ok_or_else(|| ConfigError::Invalid {
            field: "printer",
            reason: format!("unknown preset '{}' (expected tm-t88v, 58mm or 80mm)", name),
        })?;
        settings.validate()?;
    }

    if let Some(name) = &args.dither {
        settings.layout.dithering = DitheringAlgorithm::parse(name).ok_or_else(|| ConfigError::Invalid {
            field: "dither",
            reason: format!("unknown algorithm '{}'", name),
        })?;
    }

    Ok(settings)
}

fn open_port(device: &str) -> Box<dyn PrinterPort> {
    if device == "-" {
        Box::new(StreamPort::stdout())
    } else {
        Box::new(DevicePort::new(device))
    }
}

fn face_locator(args: &FaceArgs) -> Box<dyn FaceLocator> {
    match (args.face, args.faces) {
        (Some(face), _) => Box::new(FixedFace(face)),
        (None, FaceMode::Fixed) => {
            warn!("--faces fixed without --face; exposure correction disabled");
            Box::new(NoFaces)
        }
        (None, FaceMode::None) => Box::new(NoFaces),
        (None, FaceMode::Sidecar) => Box::new(SidecarFaces::new(args.min_confidence)),
    }
}

fn parse_face(s: &str) -> Result<FaceRegion, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid face box '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(FaceRegion::new(*x, *y, *w, *h)),
        _ => Err(format!("face box needs four numbers, got '{}'", s)),
    }
}

fn print_job(device: &str, job: &PrintJob, settings: &Settings) -> Result<(), KioskError> {
    let mut transport = PrintTransport::new(open_port(device), &settings.transport);
    let report = transport.send(job)?;
    info!(bytes = report.bytes, attempts = report.attempts, "job sent");
    Ok(())
}

/// Pick up to `num` images from `dir` whose file name starts with `prefix`.
fn sample_images(dir: &Path, prefix: &str, num: usize, seed: Option<u64>) -> Result<Vec<PathBuf>, KioskError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    files.sort();

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    files.shuffle(&mut rng);
    files.truncate(num);
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "bmp" | "gif" | "tiff" | "webp"))
}

fn preview_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    format!("{}.receipt.png", stem)
}
