use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "streamview", version)]
struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a view config.
    Validate(ValidateArgs),
    /// Run a view for a number of render ticks.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// View config JSON.
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// View config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Render ticks to run at the configured render fps.
    #[arg(long, default_value_t = 60)]
    ticks: u64,

    /// Write the final composited canvas as PNG.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the telemetry report as JSON.
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Zoom applied before the first tick.
    #[arg(long)]
    zoom: Option<f64>,

    /// Normalized horizontal zoom center.
    #[arg(long, requires = "zoom")]
    center_x: Option<f64>,

    /// Normalized vertical zoom center.
    #[arg(long, requires = "zoom")]
    center_y: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn read_config(path: &Path) -> anyhow::Result<streamview::ViewConfig> {
    let cfg = streamview::ViewConfig::from_path(path)
        .with_context(|| format!("read view config '{}'", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate view config '{}'", path.display()))?;
    Ok(cfg)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let cfg = read_config(&args.config)?;
    println!(
        "ok: {}x{} canvas, {} layer(s)",
        cfg.width,
        cfg.height,
        cfg.layers.len()
    );
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let cfg = read_config(&args.config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let mut view =
        streamview::StreamView::from_config(&cfg, base_dir).context("build stream view")?;

    if let Some(zoom) = args.zoom {
        let center = match (args.center_x, args.center_y) {
            (None, None) => None,
            (cx, cy) => Some((cx.unwrap_or(0.5), cy.unwrap_or(0.5))),
        };
        view.set_zoom(zoom, center);
    }

    view.start();
    let interval = view.render_interval();
    for _ in 0..args.ticks {
        view.tick();
        std::thread::sleep(interval);
    }
    view.stop();

    if let Some(out) = &args.out {
        create_parent(out)?;
        view.frame()
            .save_with_format(out, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }

    let report = view.telemetry_report();
    if let Some(metrics) = &args.metrics {
        create_parent(metrics)?;
        let json = report.to_json_pretty().context("serialize telemetry")?;
        std::fs::write(metrics, json)
            .with_context(|| format!("write metrics '{}'", metrics.display()))?;
        eprintln!("wrote {}", metrics.display());
    }
    for layer in &report.layers {
        println!(
            "{}: frames={} total={:.1}ms producer={:.1}ms transport~{:.1}ms consumer={:.1}ms",
            layer.layer_id,
            layer.frames,
            layer.avg_total_ms,
            layer.avg_producer_ms,
            layer.avg_transport_ms,
            layer.avg_consumer_ms
        );
    }

    view.shutdown().context("shut down stream view")?;
    Ok(())
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
