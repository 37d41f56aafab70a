use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use vrtkit::{Clipper, Dataset, TranslateOptions, WarpOptions, WarpedDataset, DEFAULT_RESAMPLE};

#[derive(Parser, Debug)]
#[command(name = "vrtkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subset, rescale or reorder bands of a document.
    Translate(TranslateArgs),
    /// Reproject and clip a document (converting it to warped form).
    Warp(WarpArgs),
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input document path.
    infile: PathBuf,

    /// Output document path.
    outfile: PathBuf,

    /// Band to keep (repeatable, output order).
    #[arg(short = 'b', long = "band")]
    bands: Vec<usize>,

    /// Pixel-space window: xoff yoff xsize ysize.
    #[arg(long, num_args = 4, value_names = ["XOFF", "YOFF", "XSIZE", "YSIZE"])]
    srcwin: Option<Vec<i64>>,

    /// World-space window: xmin ymax xmax ymin.
    #[arg(long, num_args = 4, value_names = ["XMIN", "YMAX", "XMAX", "YMIN"])]
    projwin: Option<Vec<f64>>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<i64>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<i64>,

    /// Output x resolution.
    #[arg(long)]
    xres: Option<f64>,

    /// Output y resolution.
    #[arg(long)]
    yres: Option<f64>,

    /// Nodata value for every band.
    #[arg(long)]
    nodata: Option<f64>,

    /// Resampling algorithm.
    #[arg(long)]
    resample: Option<String>,

    /// Linear scaling: srcmin srcmax dstmin dstmax.
    #[arg(long, num_args = 4, value_names = ["SRCMIN", "SRCMAX", "DSTMIN", "DSTMAX"])]
    scale: Option<Vec<f64>>,
}

#[derive(Parser, Debug)]
struct WarpArgs {
    /// Input document path (plain documents are converted to warped form).
    infile: PathBuf,

    /// Output document path.
    outfile: PathBuf,

    /// Target EPSG code.
    #[arg(long)]
    dstsrs: Option<u32>,

    /// Cutline polygon as a .geojson file.
    #[arg(long)]
    clipper: Option<PathBuf>,

    /// Crop the output extent to the cutline.
    #[arg(long)]
    croptocutline: bool,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<i64>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<i64>,

    /// Output x resolution.
    #[arg(long)]
    xres: Option<f64>,

    /// Output y resolution.
    #[arg(long)]
    yres: Option<f64>,

    /// Append an alpha band.
    #[arg(long)]
    dstalpha: bool,

    /// Resampling algorithm.
    #[arg(long, default_value = DEFAULT_RESAMPLE)]
    resample: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Translate(args) => cmd_translate(args),
        Command::Warp(args) => cmd_warp(args),
    }
}

fn quad<T: Copy>(values: &Option<Vec<T>>) -> Option<[T; 4]> {
    values
        .as_ref()
        .map(|v| [v[0], v[1], v[2], v[3]])
}

fn cmd_translate(args: TranslateArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.infile)
        .with_context(|| format!("read document '{}'", args.infile.display()))?;
    let vrt = Dataset::from_text(&text)?;

    let opts = TranslateOptions {
        band_list: (!args.bands.is_empty()).then_some(args.bands),
        src_win: quad(&args.srcwin),
        proj_win: quad(&args.projwin),
        height: args.height,
        width: args.width,
        x_res: args.xres,
        y_res: args.yres,
        nodata: args.nodata,
        resample_alg: args.resample,
        scale_params: quad(&args.scale),
    };

    let out = vrtkit::translate(&vrt, &opts)?;
    fs::write(&args.outfile, out.to_text()?)
        .with_context(|| format!("write document '{}'", args.outfile.display()))?;
    eprintln!("wrote {}", args.outfile.display());
    Ok(())
}

fn cmd_warp(args: WarpArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.infile)
        .with_context(|| format!("read document '{}'", args.infile.display()))?;

    let opts = WarpOptions {
        dst_srs: args.dstsrs,
        clipper: args.clipper.map(Clipper::Path),
        crop_to_cutline: args.croptocutline,
        height: args.height,
        width: args.width,
        x_res: args.xres,
        y_res: args.yres,
        dst_alpha: args.dstalpha,
        resample: args.resample,
    };

    let registry = vrtkit::srs::EpsgRegistry::new();
    let out = match WarpedDataset::from_text(&text) {
        Ok(warped) => vrtkit::warp(&warped, &opts, &registry)?,
        Err(_) => vrtkit::warp_dataset(&Dataset::from_text(&text)?, &opts, &registry)?,
    };

    fs::write(&args.outfile, out.to_text()?)
        .with_context(|| format!("write document '{}'", args.outfile.display()))?;
    eprintln!("wrote {}", args.outfile.display());
    Ok(())
}
