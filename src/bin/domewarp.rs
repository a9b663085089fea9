use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "domewarp", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reproject the input video for every node of a cluster (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Write coverage heatmaps and a JSON summary for a set of nodes.
    Analyze(AnalyzeArgs),
    /// Print projector calibration and decimation results for a node.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Cluster configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Only process this hostname.
    #[arg(long)]
    node: Option<String>,

    /// Override every node's raster backend.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Directory with `<host>.txt` descriptors and warp maps.
    #[arg(long)]
    calibration_dir: PathBuf,

    /// Hostnames to include.
    #[arg(long = "host", required = true)]
    hosts: Vec<String>,

    /// Output directory for the PNGs and coverage.json.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 3840)]
    width: u32,

    #[arg(long, default_value_t = 1920)]
    height: u32,

    /// UV buckets per axis.
    #[arg(long, default_value_t = 1000)]
    precision: u32,

    /// Aggregation for the surface-density heatmap.
    #[arg(long, value_enum, default_value_t = OverlapChoice::Max)]
    overlap: OverlapChoice,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[arg(long)]
    calibration_dir: PathBuf,

    #[arg(long)]
    host: String,

    /// Equirectangular input width used for decimation.
    #[arg(long, default_value_t = 3840)]
    input_width: u32,

    #[arg(long, default_value_t = 1920)]
    input_height: u32,

    /// Decimation tolerance in input pixels.
    #[arg(long, default_value_t = 0.5)]
    tolerance: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    Gpu,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OverlapChoice {
    Max,
    Average,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Analyze(args) => cmd_analyze(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = domewarp::ClusterConfig::load(&args.config)?;
    if let Some(node) = &args.node {
        config.nodes.retain(|n| &n.hostname == node);
        if config.nodes.is_empty() {
            anyhow::bail!("node '{node}' is not in '{}'", args.config.display());
        }
    }
    if let Some(choice) = args.backend {
        let kind = match choice {
            BackendChoice::Cpu => domewarp::BackendKind::Cpu,
            BackendChoice::Gpu => domewarp::BackendKind::Gpu,
        };
        for n in &mut config.nodes {
            n.settings.backend = Some(kind);
        }
    }

    let stats = domewarp::pipeline::run_cluster(&config, &domewarp::NodeRunner::new());
    let mut failed = 0;
    for s in &stats {
        match &s.error {
            None => eprintln!(
                "{}: {:?}, {} frames written, {} skipped",
                s.hostname, s.status, s.frames_written, s.frames_skipped
            ),
            Some(e) => {
                failed += 1;
                eprintln!(
                    "{}: {:?} after {} frames: {e}",
                    s.hostname, s.status, s.frames_written
                );
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} nodes failed", stats.len());
    }
    Ok(())
}

fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let loader = domewarp::CalibrationLoader::new(&args.calibration_dir);
    let mut analyzer = domewarp::CoverageAnalyzer::new(domewarp::CoverageConfig {
        precision: args.precision,
    })?;
    for host in &args.hosts {
        let projectors = loader
            .load_projectors(host)
            .with_context(|| format!("load calibration for '{host}'"))?;
        for p in &projectors {
            analyzer.add_projector(host, p.config.index, &p.warp)?;
        }
    }
    let report = analyzer.finish();
    let mode = match args.overlap {
        OverlapChoice::Max => domewarp::OverlapMode::Max,
        OverlapChoice::Average => domewarp::OverlapMode::Average,
    };
    let paths = domewarp::coverage::save_heatmaps(
        &report,
        &args.out,
        domewarp::Resolution::non_zero(args.width, args.height)?,
        mode,
    )?;

    let s = report.summary();
    eprintln!("unique equirect pixels: {}", s.unique_equirect_pixels);
    eprintln!("coverage:               {:.2}%", s.coverage_fraction * 100.0);
    eprintln!("redundancy ratio:       {:.3}", s.redundancy_ratio);
    for (k, n) in &s.overlap_histogram {
        eprintln!("  {k} projector(s): {n} pixels");
    }
    eprintln!("wrote {}", paths.summary.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let loader = domewarp::CalibrationLoader::new(&args.calibration_dir);
    let node = loader.load_node(&args.host)?;
    let input = domewarp::Resolution::non_zero(args.input_width, args.input_height)?;
    let analyzer = domewarp::DecimationAnalyzer::new(domewarp::DecimationConfig {
        enabled: true,
        tolerance_pixels: args.tolerance,
    });

    println!("{} ({} projectors)", node.hostname, node.projectors.len());
    for p in &node.projectors {
        println!(
            "  [{}] id {} {} {}",
            p.index, p.id, p.resolution, p.warp_map_filename
        );
        match loader.load_warp_map(p) {
            Ok(warp) => {
                let d = analyzer.analyze(&warp, input)?;
                println!(
                    "      valid {}/{} pixels, unique {} cells, scale {:.3}, decimated {}",
                    warp.valid_pixel_count(),
                    d.total_pixels,
                    d.unique_pixels,
                    d.scale_factor,
                    d.decimated
                );
            }
            Err(e) => println!("      unusable: {e}"),
        }
    }
    Ok(())
}
