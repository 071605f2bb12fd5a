//! `objrec` – recognize segmented point-cloud clusters against a model
//! library.
//!
//! ```text
//! objrec --request scene.json [--config objrec.toml] [--models models.json]
//!        [--output result.json] [--markers markers.json]
//! objrec --schema request|response
//! objrec --init-config [--config objrec.toml]
//! ```
//!
//! The JSON result goes to stdout (or `--output`); logs and the one-line
//! summary go to stderr.

mod config;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use objrec_middleware::{BusVisualizer, EventBus, Topic};
use objrec_models::{CentroidEstimator, JsonModelFile, ModelRegistry, ModelSource};
use objrec_runtime::{BatchRecognizer, init_tracing};
use objrec_types::{BatchResult, EventPayload, MarkerBatch, RecognitionRequest};
use tracing::info;

use crate::config::Config;

/// Multi-model object recognition over segmented clusters.
#[derive(Debug, Parser)]
#[command(author, version, about = "Recognize point-cloud clusters against known object models")]
struct Args {
    /// TOML configuration file. Defaults are used if it does not exist.
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// JSON model library. Overrides `model_file` from the config.
    #[arg(long)]
    models: Option<PathBuf>,

    /// JSON RecognitionRequest to process.
    #[arg(long, required_unless_present_any = ["schema", "init_config"])]
    request: Option<PathBuf>,

    /// Write the JSON result here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write published detection markers to this JSON file.
    #[arg(long)]
    markers: Option<PathBuf>,

    /// Print a JSON schema and exit.
    #[arg(long, value_enum)]
    schema: Option<SchemaKind>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    Request,
    Response,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{}: {err}", "error".red().bold());
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _guard = init_tracing("objrec");

    if let Some(kind) = args.schema {
        let schema = match kind {
            SchemaKind::Request => objrec_types::request_schema(),
            SchemaKind::Response => objrec_types::response_schema(),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let cfg = load_config(&args.config)?;

    if args.init_config {
        config::save_to(&cfg, &args.config)?;
        eprintln!(
            "{} config written to {}",
            "✓".green().bold(),
            args.config.display().to_string().bold()
        );
        return Ok(());
    }

    let Some(request_path) = args.request.as_deref() else {
        return Err("--request is required".into());
    };
    let models_path = args
        .models
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.model_file));

    let run = run_from_files(&cfg, &models_path, request_path, args.markers.is_some());
    let (result, markers) = match run {
        Ok(out) => out,
        Err(e) => {
            eprintln!("{} {e}", "recognition failed:".red().bold());
            return Err(e);
        }
    };

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    if let Some(path) = &args.markers {
        fs::write(path, serde_json::to_string_pretty(&markers)?)?;
    }

    print_summary(&result);
    Ok(())
}

/// The config at `path`, or defaults (with environment overrides) when the
/// file is absent.
fn load_config(path: &Path) -> Result<Config, String> {
    match config::load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

/// Build the recognizer from `cfg` and the model library at `models_path`.
fn build_recognizer(
    cfg: &Config,
    models_path: &Path,
    bus: Option<&EventBus>,
) -> Result<BatchRecognizer, Box<dyn Error>> {
    let models = JsonModelFile::new(models_path).load()?;
    let params = cfg.estimator_params();
    let registry = ModelRegistry::from_library(models, |model| {
        Box::new(CentroidEstimator::new(Arc::clone(model), params.clone()))
    });
    info!(models = registry.len(), frame = %cfg.processing_frame, "recognizer ready");

    let recognizer = BatchRecognizer::new(
        cfg.recognizer_config(),
        Arc::new(registry),
        Arc::new(cfg.transform_buffer()),
    );
    Ok(match bus {
        Some(bus) => recognizer
            .with_visualizer(Arc::new(BusVisualizer::new(bus.clone())))
            .with_diagnostics(bus.clone()),
        None => recognizer,
    })
}

/// Run one request; returns the result and any markers published for it.
fn run_from_files(
    cfg: &Config,
    models_path: &Path,
    request_path: &Path,
    collect_markers: bool,
) -> Result<(BatchResult, Vec<MarkerBatch>), Box<dyn Error>> {
    let bus = (cfg.visualize || collect_markers).then(EventBus::default);
    let mut marker_rx = bus.as_ref().map(|b| b.subscribe_to(Topic::Markers));

    let recognizer = build_recognizer(cfg, models_path, bus.as_ref())?;
    let request: RecognitionRequest = load_json_file(request_path)?;
    let result = recognizer.recognize(&request)?;

    let markers = marker_rx
        .as_mut()
        .map(|rx| {
            rx.drain()
                .into_iter()
                .filter_map(|event| match event.payload {
                    EventPayload::Markers(batch) => Some(batch),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok((result, markers))
}

fn print_summary(result: &BatchResult) {
    let recognized = result.objects.len();
    let failed = result.failed_count();
    let dropped = result.graspable.len() - recognized;
    let status = if failed > 0 {
        "partial".yellow().bold()
    } else {
        "ok".green().bold()
    };
    eprintln!(
        "{status} {} recognized, {} unmatched, {} failed",
        recognized.to_string().bold(),
        dropped,
        failed
    );
    for object in &result.objects {
        eprintln!(
            "    • cluster {} → model {} ({:.2})",
            object.collision_name.bold(),
            object.model_id,
            object.hypothesis.votes
        );
    }
}
