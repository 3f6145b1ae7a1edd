// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk — chained image operations from the command line.
//
// Entry point. Initialises logging, parses a subcommand, runs the matching
// operation chain on the input image, and writes or prints the result.

mod recipe;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use bildwerk::{BlurMethod, Image, ResizeTarget};

#[derive(Parser)]
#[command(name = "bildwerk")]
#[command(author, version, about = "Chained image operations from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for trace detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dimensions and channel count of an image
    Info(InfoArgs),
    /// Decode an image and re-encode it at the output path
    Convert(InOutArgs),
    /// Resize to a target width, height, or uniform scale
    Resize(ResizeArgs),
    /// Crop a rectangular window
    Crop(CropArgs),
    /// Collapse to a single luminance channel
    Gray(InOutArgs),
    /// Smooth with a square kernel
    Blur(BlurArgs),
    /// Threshold into a black-and-white image
    Binarize(BinarizeArgs),
    /// Detect edges with the Canny filter
    Edges(EdgesArgs),
    /// Detect the dominant circle and print its centre and radius
    Circle(CircleArgs),
    /// Apply a JSON recipe of chained operations
    Run(RunArgs),
    /// Open a preview window
    #[cfg(feature = "display")]
    View(ViewArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input image
    input: PathBuf,
}

#[derive(Args)]
struct InOutArgs {
    /// Input image
    input: PathBuf,

    /// Output image (.jpg, .jpeg, or .png)
    output: PathBuf,
}

#[derive(Args)]
struct ResizeArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Target width in pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Uniform scale factor (e.g. 0.5, 2.0)
    #[arg(short, long)]
    scale: Option<f64>,
}

#[derive(Args)]
struct CropArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Left edge of the window (inclusive)
    #[arg(long)]
    left: u32,

    /// Top edge of the window (inclusive)
    #[arg(long)]
    top: u32,

    /// Right edge of the window (exclusive)
    #[arg(long)]
    right: u32,

    /// Bottom edge of the window (exclusive)
    #[arg(long)]
    bottom: u32,
}

#[derive(Args)]
struct BlurArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Odd kernel size in pixels
    #[arg(short, long, default_value_t = 5)]
    size: u32,

    /// Filter: gaussian, average, median, bilateral
    #[arg(short, long, default_value = "gaussian")]
    method: String,
}

#[derive(Args)]
struct BinarizeArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Fixed threshold; Otsu's method picks one when omitted
    #[arg(short, long)]
    threshold: Option<u8>,
}

#[derive(Args)]
struct EdgesArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Weak-gradient threshold
    #[arg(long, default_value_t = 50.0)]
    low: f32,

    /// Strong-gradient threshold
    #[arg(long, default_value_t = 100.0)]
    high: f32,
}

#[derive(Args)]
struct CircleArgs {
    /// Input image
    input: PathBuf,

    /// Smallest radius to consider (0 = library default)
    #[arg(long, default_value_t = 0)]
    min_radius: u32,

    /// Largest radius to consider (0 = half the short image side)
    #[arg(long, default_value_t = 0)]
    max_radius: u32,

    /// Downscale factor applied before voting
    #[arg(short, long, default_value_t = 1)]
    downscale: u32,
}

#[derive(Args)]
struct RunArgs {
    /// Recipe file holding a JSON array of steps
    recipe: PathBuf,

    /// Input image
    input: PathBuf,

    /// Output image
    output: PathBuf,
}

#[cfg(feature = "display")]
#[derive(Args)]
struct ViewArgs {
    /// Input image
    input: PathBuf,

    /// Window title (defaults to the file name)
    #[arg(short, long)]
    title: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    match cli.command {
        Commands::Info(args) => info(args),
        Commands::Convert(args) => convert(args),
        Commands::Resize(args) => resize(args),
        Commands::Crop(args) => crop(args),
        Commands::Gray(args) => gray(args),
        Commands::Blur(args) => blur(args),
        Commands::Binarize(args) => binarize(args),
        Commands::Edges(args) => edges(args),
        Commands::Circle(args) => circle(args),
        Commands::Run(args) => run(args),
        #[cfg(feature = "display")]
        Commands::View(args) => view(args),
    }
}

// -- Subcommands --------------------------------------------------------------

fn info(args: InfoArgs) -> Result<()> {
    let img = open(&args.input)?;
    let (h, w, c) = img.shape();
    println!(
        "{}: {}x{} px, {} channel(s)",
        args.input.display(),
        w,
        h,
        c
    );
    Ok(())
}

fn convert(args: InOutArgs) -> Result<()> {
    let img = open(&args.input)?;
    save(&img, &args.output)
}

fn resize(args: ResizeArgs) -> Result<()> {
    let target = match (args.width, args.height, args.scale) {
        (Some(w), None, None) => ResizeTarget::Width(w),
        (None, Some(h), None) => ResizeTarget::Height(h),
        (None, None, Some(s)) => ResizeTarget::Scale(s),
        _ => bail!("exactly one of --width, --height, --scale is required"),
    };
    let mut img = open(&args.input)?;
    img.resize(target)?;
    save(&img, &args.output)
}

fn crop(args: CropArgs) -> Result<()> {
    let mut img = open(&args.input)?;
    img.crop((args.left, args.top), (args.right, args.bottom))?;
    save(&img, &args.output)
}

fn gray(args: InOutArgs) -> Result<()> {
    let mut img = open(&args.input)?;
    img.to_gray();
    save(&img, &args.output)
}

fn blur(args: BlurArgs) -> Result<()> {
    let method = match args.method.as_str() {
        "gaussian" => BlurMethod::Gaussian,
        "average" | "box" => BlurMethod::Average,
        "median" => BlurMethod::Median,
        "bilateral" => BlurMethod::Bilateral,
        other => bail!("unknown blur method: {}", other),
    };
    let mut img = open(&args.input)?;
    img.blur(args.size, method)?;
    save(&img, &args.output)
}

fn binarize(args: BinarizeArgs) -> Result<()> {
    let mut img = open(&args.input)?;
    img.to_gray();
    img.binarize(args.threshold)?;
    save(&img, &args.output)
}

fn edges(args: EdgesArgs) -> Result<()> {
    let mut img = open(&args.input)?;
    img.to_gray();
    img.edges(args.low, args.high)?;
    save(&img, &args.output)
}

fn circle(args: CircleArgs) -> Result<()> {
    let mut img = open(&args.input)?;
    img.to_gray();
    let ((cx, cy), radius) = img.detect_circle(args.min_radius, args.max_radius, args.downscale)?;
    println!("center: ({:.1}, {:.1})  radius: {:.1}", cx, cy, radius);
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.recipe)
        .with_context(|| format!("failed to read {}", args.recipe.display()))?;
    let steps: Vec<recipe::Step> = serde_json::from_str(&text)
        .with_context(|| format!("invalid recipe in {}", args.recipe.display()))?;
    tracing::info!(steps = steps.len(), "Recipe loaded");

    let mut img = open(&args.input)?;
    recipe::apply(&mut img, &steps)?;
    save(&img, &args.output)
}

#[cfg(feature = "display")]
fn view(args: ViewArgs) -> Result<()> {
    let img = open(&args.input)?;
    let title = args.title.unwrap_or_else(|| {
        args.input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("bildwerk")
            .to_string()
    });
    img.show(&title).context("preview window failed")?;
    Ok(())
}

// -- Helpers ------------------------------------------------------------------

fn open(path: &Path) -> Result<Image> {
    Image::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn save(img: &Image, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}
