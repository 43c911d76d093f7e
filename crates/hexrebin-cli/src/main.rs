//! hexrebin CLI: command-line interface for hexagon-to-grid rebinning.

use clap::{Args, Parser, Subcommand};
use hexrebin::{
    default_pixel_edge_mm, DirStore, EventSeries, GeometryIndexer, HexRebinner, OverlapCache,
    OverlapMap, RebinConfig, SensorGeometry, SliceWindow, DEFAULT_EXTENT_MM,
    DEFAULT_OVERLAP_EPSILON,
};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "hexrebin")]
#[command(about = "Rebin hexagonal-pixel sensor time series onto a square grid")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a geometry table.
    GeometryInfo {
        /// Geometry JSON (hexrebin.geometry.v1).
        #[arg(long)]
        geometry: PathBuf,
    },

    /// Write a parametric hexagonal pixel layout.
    GenGeometry(GenGeometryArgs),

    /// Build an overlap map and write it as JSON.
    BuildMap(BuildMapArgs),

    /// Print the summary of a stored overlap map.
    MapInfo {
        /// Overlap map JSON (hexrebin.overlap.v1).
        #[arg(long)]
        map: PathBuf,
    },

    /// Rebin one event into a (row, col, time) tensor.
    Rebin(RebinArgs),
}

#[derive(Debug, Clone, Args)]
struct GenGeometryArgs {
    /// Number of rings around the central pixel.
    #[arg(long)]
    rings: usize,

    /// Path to write the geometry (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Hexagon edge length (default: reference camera, 9.51/sqrt(3) mm).
    #[arg(long)]
    pixel_edge: Option<f64>,

    /// Bounding half-width of the tessellated square.
    #[arg(long, default_value_t = DEFAULT_EXTENT_MM)]
    extent: f64,

    /// Version string stored in the table (default: derived from the parameters).
    #[arg(long)]
    geometry_version: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct BuildMapArgs {
    #[arg(long)]
    geometry: PathBuf,

    /// Side length of one grid cell.
    #[arg(long)]
    cell_size: f64,

    /// Path to write the overlap map (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Overlap fractions at or below this are dropped.
    #[arg(long, default_value_t = DEFAULT_OVERLAP_EPSILON)]
    epsilon: f64,
}

#[derive(Debug, Clone, Args)]
struct RebinArgs {
    #[arg(long)]
    geometry: PathBuf,

    /// Event series JSON: {"readings": {"<pixel_id>": [..]}}.
    #[arg(long)]
    series: PathBuf,

    /// Path to write the tensor (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Rebin config JSON; command-line values override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    cell_size: Option<f64>,

    /// First slice of the window (inclusive).
    #[arg(long)]
    start: Option<usize>,

    /// End of the window (exclusive).
    #[arg(long)]
    end: Option<usize>,

    /// Directory to load/store overlap maps.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct TensorJson {
    shape: [usize; 3],
    window: SliceWindow,
    data: Vec<f32>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::GeometryInfo { geometry } => run_geometry_info(&geometry),
        Commands::GenGeometry(args) => run_gen_geometry(&args),
        Commands::BuildMap(args) => run_build_map(&args),
        Commands::MapInfo { map } => run_map_info(&map),
        Commands::Rebin(args) => run_rebin(&args),
    }
}

fn load_geometry(path: &Path) -> CliResult<SensorGeometry> {
    tracing::info!("Loading geometry: {}", path.display());
    SensorGeometry::from_json_file(path).map_err(|e| -> CliError {
        format!("Failed to load geometry {}: {}", path.display(), e).into()
    })
}

// ── geometry-info ──────────────────────────────────────────────────────

fn run_geometry_info(path: &Path) -> CliResult<()> {
    let geometry = load_geometry(path)?;

    println!("hexrebin sensor geometry");
    println!("  version:     {}", geometry.version());
    println!("  pixels:      {}", geometry.n_pixels());
    println!("  pixel edge:  {:.4}", geometry.pixel_edge());
    println!("  pixel area:  {:.4}", geometry.pixel_area());
    println!("  extent:      +/-{}", geometry.extent());
    if let Some((min, max)) = geometry.center_bounds() {
        println!(
            "  centers:     x [{:.2}, {:.2}], y [{:.2}, {:.2}]",
            min[0], max[0], min[1], max[1]
        );
    }

    Ok(())
}

// ── gen-geometry ───────────────────────────────────────────────────────

fn run_gen_geometry(args: &GenGeometryArgs) -> CliResult<()> {
    let pixel_edge = args.pixel_edge.unwrap_or_else(default_pixel_edge_mm);
    let version = args
        .geometry_version
        .clone()
        .unwrap_or_else(|| format!("hex-r{}-e{}-x{}", args.rings, pixel_edge, args.extent));

    let geometry = SensorGeometry::hexagonal(version, args.rings, pixel_edge, args.extent)?;
    std::fs::write(&args.out, geometry.to_json_string()?)?;
    tracing::info!(
        "Wrote {} pixels ({}) to {}",
        geometry.n_pixels(),
        geometry.version(),
        args.out.display()
    );

    Ok(())
}

// ── build-map ──────────────────────────────────────────────────────────

fn run_build_map(args: &BuildMapArgs) -> CliResult<()> {
    let geometry = load_geometry(&args.geometry)?;
    let map = GeometryIndexer::new(args.epsilon)?.build(&geometry, args.cell_size)?;

    std::fs::write(&args.out, map.to_json_string()?)?;
    tracing::info!("Overlap map written to {}", args.out.display());

    Ok(())
}

// ── map-info ───────────────────────────────────────────────────────────

fn run_map_info(path: &Path) -> CliResult<()> {
    let data = std::fs::read_to_string(path)?;
    let map = OverlapMap::from_json_str(&data).map_err(|e| -> CliError {
        format!("Failed to load overlap map {}: {}", path.display(), e).into()
    })?;

    println!("{}", serde_json::to_string_pretty(&map.summary())?);
    Ok(())
}

// ── rebin ──────────────────────────────────────────────────────────────

fn rebin_config(args: &RebinArgs) -> CliResult<RebinConfig> {
    let mut config = match &args.config {
        Some(path) => RebinConfig::from_json_file(path)?,
        None => RebinConfig::default(),
    };
    if let Some(cell_size) = args.cell_size {
        config.cell_size = cell_size;
    }
    if let Some(start) = args.start {
        config.window.start = start;
    }
    if let Some(end) = args.end {
        config.window.end = end;
    }
    config.validate()?;
    Ok(config)
}

fn run_rebin(args: &RebinArgs) -> CliResult<()> {
    let config = rebin_config(args)?;
    let geometry = load_geometry(&args.geometry)?;

    tracing::info!("Loading series: {}", args.series.display());
    let series: EventSeries = serde_json::from_str(&std::fs::read_to_string(&args.series)?)
        .map_err(|e| -> CliError {
            format!("Failed to parse series {}: {}", args.series.display(), e).into()
        })?;
    tracing::info!(
        "Series: {} pixels x {} slices",
        series.n_pixels(),
        series.n_slices()
    );

    let rebinner = match &args.cache_dir {
        Some(dir) => {
            let cache = OverlapCache::new(config.indexer()?, DirStore::new(dir)?);
            HexRebinner::from_cache(&cache, &geometry, &config)?
        }
        None => HexRebinner::new(&geometry, &config)?,
    };

    let tensor = rebinner.rebin(&series)?;
    tracing::info!(
        "Tensor shape {:?}, total {:.4}",
        tensor.shape(),
        tensor.total()
    );

    let out = TensorJson {
        shape: tensor.shape(),
        window: tensor.window(),
        data: tensor.to_flat_vec(),
    };
    std::fs::write(&args.out, serde_json::to_string(&out)?)?;
    tracing::info!("Tensor written to {}", args.out.display());

    Ok(())
}
