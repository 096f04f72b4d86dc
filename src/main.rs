use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fer::checkpoint::{write_checkpoint, Format, TensorStats};
use fer::diagnose::{self, InputSource};
use fer::{config, loader, resolve, ArchitectureId, Network, Registry};
use fer_model::CLASSIFIER_KEY;
use log::{info, warn};
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "fer")]
#[command(
    version,
    about = "FER2013 expression classifier - checkpoint resolution and loading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List checkpoint parameters with shapes and value statistics
    Inspect {
        /// Checkpoint file (defaults to the configured checkpoint)
        ckpt: Option<PathBuf>,
        /// Number of parameters to list
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Detect which architecture produced a checkpoint
    Resolve {
        /// Checkpoint file (defaults to the configured checkpoint)
        ckpt: Option<PathBuf>,
    },
    /// Resolve a checkpoint and load its weights
    Verify {
        /// Checkpoint file (defaults to the configured checkpoint)
        ckpt: Option<PathBuf>,
    },
    /// Write an untrained checkpoint for an architecture
    Init {
        /// Architecture to instantiate (legacy128 or current512)
        #[arg(short, long, default_value = "current512")]
        arch: ArchitectureId,
        /// Output file (.fckpt for weights, .json for a shape manifest)
        #[arg(short, long)]
        out: PathBuf,
        /// Seed for weight initialisation
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Resolve every checkpoint in a directory
    Scan {
        /// Directory to scan
        dir: PathBuf,
    },
    /// Print the emotion label table
    Labels,
    /// Turn raw classifier logits into per-emotion probabilities
    Classify {
        /// One logit per configured emotion, comma separated
        #[arg(value_delimiter = ',', allow_negative_numbers = true, required = true)]
        logits: Vec<f32>,
    },
    /// Preprocess a face image or FER2013 pixel row and show the input tensor
    Input {
        /// Face crop image
        #[arg(long, conflicts_with = "pixels", required_unless_present = "pixels")]
        image: Option<PathBuf>,
        /// Text file holding one FER2013 `pixels` field
        #[arg(long)]
        pixels: Option<PathBuf>,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;
    let registry = Registry::builtin().context("building architecture registry")?;

    let pick = |ckpt: Option<PathBuf>| ckpt.unwrap_or_else(|| cfg.checkpoint.clone());

    match cli.command {
        Commands::Inspect { ckpt, limit } => inspect(&pick(ckpt), limit),
        Commands::Resolve { ckpt } => resolve_one(&registry, &pick(ckpt)),
        Commands::Verify { ckpt } => verify(&cfg, &registry, &pick(ckpt)),
        Commands::Init { arch, out, seed } => init(&cfg, &registry, arch, &out, seed),
        Commands::Scan { dir } => scan(&registry, &dir),
        Commands::Labels => labels(&cfg),
        Commands::Classify { logits } => classify(&cfg, &logits),
        Commands::Input { image, pixels } => match (image, pixels) {
            (Some(path), _) => input(InputSource::Image(&path)),
            (None, Some(path)) => input(InputSource::Pixels(&path)),
            (None, None) => anyhow::bail!("either --image or --pixels is required"),
        },
        Commands::Config => open_config(),
    }
}

fn inspect(path: &Path, limit: usize) -> Result<()> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("checkpoint not found: {}", path.display()))?
        .len();
    info!(
        "Checkpoint: {} ({:.1} MB)",
        path.display(),
        size as f64 / (1024.0 * 1024.0)
    );

    let params = loader::read_params(path)?;
    info!(
        "{} parameters, {} elements",
        params.len(),
        params.element_count()
    );

    for (name, tensor) in params.iter().take(limit) {
        match TensorStats::of(tensor) {
            Some(s) => info!(
                "  {}: {:?} {} min={:.4} max={:.4} mean={:.4} std={:.4}",
                name,
                tensor.shape(),
                tensor.descriptor.dtype,
                s.min,
                s.max,
                s.mean,
                s.std_dev
            ),
            None => info!(
                "  {}: {:?} {} (shape only)",
                name,
                tensor.shape(),
                tensor.descriptor.dtype
            ),
        }
    }
    if params.len() > limit {
        info!("  ... {} more", params.len() - limit);
    }

    match params.get(CLASSIFIER_KEY) {
        Some(t) => info!("Classifier shape: {:?}", t.shape()),
        None => warn!("No {} parameter in checkpoint", CLASSIFIER_KEY),
    }
    Ok(())
}

fn resolve_one(registry: &Registry, path: &Path) -> Result<()> {
    let params = loader::read_params(path)?;
    let res = resolve(&params, registry)?;
    loader::log_resolution(&res);
    println!("{}\t{}\t{}", path.display(), res.id(), res.confidence);
    Ok(())
}

fn verify(cfg: &config::Config, registry: &Registry, path: &Path) -> Result<()> {
    let model = loader::load_model(path, registry, cfg.num_classes())?;

    info!(
        "Architecture: {} ({}), {} tensors, {} weights",
        model.network.architecture(),
        model.confidence,
        model.network.parameter_count(),
        model.network.element_count()
    );

    if model.confidence != fer::Confidence::Matched {
        warn!("Architecture was not matched by fingerprint; results may be unreliable");
    }
    if model.report.is_complete() {
        info!("✓ Checkpoint loads cleanly");
    } else {
        warn!(
            "Checkpoint is missing {} of {} network parameters",
            model.report.missing.len(),
            model.network.parameter_count()
        );
    }
    Ok(())
}

fn init(
    cfg: &config::Config,
    registry: &Registry,
    arch: ArchitectureId,
    out: &Path,
    seed: u64,
) -> Result<()> {
    // fail on a bad extension before building the network
    Format::from_path(out)?;

    let desc = registry
        .get(arch)
        .with_context(|| format!("architecture {arch} is not registered"))?;
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let network = Network::untrained(desc, cfg.num_classes(), &mut rng);

    write_checkpoint(out, &network.to_parameter_set()?)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(
        "✓ Wrote untrained {} checkpoint ({}) to {}",
        arch,
        desc.summary,
        out.display()
    );
    Ok(())
}

fn scan(registry: &Registry, dir: &Path) -> Result<()> {
    let listing = loader::list_checkpoints(dir)?;
    let paths = &listing.paths;

    if paths.is_empty() && listing.unreadable == 0 {
        warn!("No checkpoints found in {}", dir.display());
        return Ok(());
    }

    let mut failures = listing.unreadable;
    for path in paths {
        let outcome = loader::read_params(path).and_then(|params| {
            let res = resolve(&params, registry)?;
            Ok((res.id(), res.confidence, res.observed_shape))
        });
        match outcome {
            Ok((id, confidence, shape)) => {
                println!("{}\t{}\t{}\t{:?}", path.display(), id, confidence, shape);
            }
            Err(e) => {
                failures += 1;
                warn!("{}: {:#}", path.display(), e);
            }
        }
    }
    info!(
        "Scanned {} entries, {} unreadable",
        paths.len() + listing.unreadable,
        failures
    );
    Ok(())
}

fn labels(cfg: &config::Config) -> Result<()> {
    for (i, e) in cfg.emotions.iter().enumerate() {
        println!(
            "{}\t{}\t{}\tbgr({}, {}, {})",
            i, e.name, e.display, e.color[0], e.color[1], e.color[2]
        );
    }
    Ok(())
}

fn classify(cfg: &config::Config, logits: &[f32]) -> Result<()> {
    let prediction = diagnose::classify_logits(&cfg.emotions, logits)?;
    for line in diagnose::prediction_lines(&cfg.emotions, &prediction) {
        println!("{line}");
    }
    if prediction.is_near_uniform() {
        warn!("Probabilities are nearly uniform; the model may be untrained");
    }
    Ok(())
}

fn input(source: InputSource<'_>) -> Result<()> {
    let tensor = diagnose::input_tensor(source)?;
    match diagnose::input_stats(&tensor) {
        Some(s) => info!(
            "Input {:?}: min={:.4} max={:.4} mean={:.4} std={:.4}",
            tensor.shape(),
            s.min,
            s.max,
            s.mean,
            s.std_dev
        ),
        None => warn!("Input tensor is empty"),
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let path = config::CONFIG_PATH.as_path();
    if config::ensure_config(path)? {
        info!("Wrote default config to {}", path.display());
    }

    let editor = env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());
    info!("Editing {} with {}", path.display(), editor);

    let status = std::process::Command::new(&editor)
        .arg(path)
        .status()
        .with_context(|| format!("launching editor {editor}"))?;
    if !status.success() {
        anyhow::bail!("{editor} exited with {status}");
    }

    // report syntax errors now instead of on the next command
    config::load_config(Some(path)).context("config is invalid after editing")?;
    Ok(())
}
