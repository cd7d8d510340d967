//! SpreadForge CLI
//!
//! Commands: compose, validate-layout, validate-image, qa, post-process, batch
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 ok, 2 validation failure or rejected spread, 1 anything else

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use spreadforge_core::print::write_png;
use spreadforge_core::{CompositorConfig, LayoutSpread, PrintSpec, SpreadCompositor, SpreadError};

#[derive(Parser)]
#[command(name = "spreadforge-cli")]
#[command(about = "SpreadForge CLI - two-page spread compositor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compositor configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose one spread to a PNG
    Compose {
        layout: PathBuf,
        output: PathBuf,

        /// Skip all print-artifact passes
        #[arg(long)]
        no_artifacts: bool,

        /// Output DPI (72-1200)
        #[arg(long)]
        dpi: Option<u32>,
    },

    /// Validate a layout file without composing
    ValidateLayout { layout: PathBuf },

    /// Validate a finished spread raster, or a single generated asset
    ValidateImage {
        image: PathBuf,

        /// Treat the file as a generated asset (format, alpha, size checks)
        #[arg(long)]
        asset: bool,
    },

    /// Scored quality report (accent share, contrast, period look) for a spread image
    Qa {
        image: PathBuf,

        /// Minimum contrast ratio
        #[arg(long)]
        min_contrast: Option<f64>,
    },

    /// Run the print-artifact passes on an existing image
    PostProcess {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        no_texture: bool,
        #[arg(long)]
        no_cmyk: bool,
        #[arg(long)]
        no_dot_gain: bool,
        #[arg(long)]
        no_vignette: bool,
    },

    /// Compose several spreads in parallel
    Batch {
        #[arg(required = true)]
        layouts: Vec<PathBuf>,

        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => match CompositorConfig::load(path) {
            Ok(c) => c,
            Err(e) => return failure(&e),
        },
        None => CompositorConfig::default(),
    };

    match cli.command {
        Commands::Compose { layout, output, no_artifacts, dpi } => {
            if no_artifacts {
                disable_artifacts(&mut config);
            }
            if let Some(dpi) = dpi {
                match PrintSpec::from_user(dpi) {
                    Ok(spec) => config.print = spec,
                    Err(e) => return failure(&SpreadError::Config(e.to_string())),
                }
            }
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            let layout = match LayoutSpread::load(&layout) {
                Ok(l) => l,
                Err(e) => return failure(&e),
            };
            match compositor.compose_to_file(&layout, &output) {
                Ok(composed) => {
                    emit(&json!({
                        "success": true,
                        "accepted": composed.accepted(),
                        "output": output,
                        "manifest": composed.manifest,
                        "layout_report": composed.layout_report,
                        "raster_report": composed.raster_report,
                    }));
                    if composed.accepted() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => failure(&e),
            }
        }

        Commands::ValidateLayout { layout } => {
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            match LayoutSpread::load(&layout) {
                Ok(layout) => {
                    let report = compositor.validate_layout(&layout);
                    emit(&json!({
                        "valid": !report.has_errors(),
                        "messages": report.messages(),
                        "report": report,
                    }));
                    exit_for(!report.has_errors())
                }
                Err(SpreadError::Layout(e)) => {
                    emit(&json!({ "valid": false, "error": e.to_string() }));
                    ExitCode::from(2)
                }
                Err(e) => failure(&e),
            }
        }

        Commands::ValidateImage { image, asset } => {
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            let report = if asset {
                compositor.validator().validate_asset_file(&image)
            } else {
                load_rgba(&image).map(|raster| compositor.validator().validate_raster(&raster, &label(&image)))
            };
            match report {
                Ok(report) => {
                    emit(&json!({
                        "valid": !report.has_errors(),
                        "messages": report.messages(),
                        "report": report,
                    }));
                    exit_for(!report.has_errors())
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Qa { image, min_contrast } => {
            if let Some(min) = min_contrast {
                config.validation.qa.min_contrast = min;
            }
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            match load_rgba(&image) {
                Ok(raster) => {
                    let report = compositor.validator().quality_report(&raster, &label(&image));
                    emit(&json!({ "passed": report.overall_passed, "score": report.score, "report": report }));
                    exit_for(report.overall_passed)
                }
                Err(e) => failure(&e),
            }
        }

        Commands::PostProcess { input, output, no_texture, no_cmyk, no_dot_gain, no_vignette } => {
            let artifacts = &mut config.artifacts;
            artifacts.texture.enabled &= !no_texture;
            artifacts.misregistration.enabled &= !no_cmyk;
            artifacts.dot_gain.enabled &= !no_dot_gain;
            artifacts.vignette.enabled &= !no_vignette;
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            let result = load_rgba(&input)
                .and_then(|raster| compositor.post_process(raster, &label(&input)))
                .and_then(|processed| write_png(&processed, &compositor.config().print, &output));
            match result {
                Ok(()) => {
                    emit(&json!({ "success": true, "output": output }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Batch { layouts, output_dir } => {
            let compositor = match SpreadCompositor::new(config) {
                Ok(c) => c,
                Err(e) => return failure(&e),
            };
            run_batch(&compositor, &layouts, &output_dir)
        }
    }
}

fn run_batch(compositor: &SpreadCompositor, paths: &[PathBuf], output_dir: &Path) -> ExitCode {
    let mut entries = vec![];
    let mut loaded = vec![];
    let mut any_failed = false;
    for path in paths {
        match LayoutSpread::load(path) {
            Ok(layout) => loaded.push((path, layout)),
            Err(e) => {
                any_failed = true;
                entries.push(json!({ "layout": path, "success": false, "error": e.to_string() }));
            }
        }
    }

    let layouts: Vec<LayoutSpread> = loaded.iter().map(|(_, l)| l.clone()).collect();
    let results = compositor.compose_batch(&layouts);
    let mut any_rejected = false;
    for ((path, layout), result) in loaded.iter().zip(results) {
        let output = output_dir.join(format!("{}.png", layout.spread_id));
        let written = result.and_then(|composed| {
            write_png(&composed.canvas, &compositor.config().print, &output)?;
            Ok(composed)
        });
        match written {
            Ok(composed) => {
                any_rejected |= !composed.accepted();
                entries.push(json!({
                    "layout": path,
                    "success": true,
                    "accepted": composed.accepted(),
                    "output": output,
                    "manifest": composed.manifest,
                }));
            }
            Err(e) => {
                any_failed = true;
                entries.push(json!({ "layout": path, "success": false, "error": e.to_string() }));
            }
        }
    }

    emit(&json!({ "spreads": entries }));
    if any_failed {
        ExitCode::FAILURE
    } else if any_rejected {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn disable_artifacts(config: &mut CompositorConfig) {
    let a = &mut config.artifacts;
    a.texture.enabled = false;
    a.binding.enabled = false;
    a.spine_shadow.enabled = false;
    a.misregistration.enabled = false;
    a.dot_gain.enabled = false;
    a.vignette.enabled = false;
}

fn load_rgba(path: &Path) -> Result<image::RgbaImage, SpreadError> {
    let name = label(path);
    let bytes = std::fs::read(path).map_err(|e| spreadforge_core::AssetLoadError::new(&name, path, e))?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| spreadforge_core::AssetLoadError::new(&name, path, format!("decode failed: {e}")))?;
    Ok(decoded.to_rgba8())
}

fn label(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

fn exit_for(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn emit(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn failure(error: &SpreadError) -> ExitCode {
    tracing::error!(error = %error, "command failed");
    emit(&json!({ "success": false, "error": error.to_string() }));
    ExitCode::FAILURE
}
