//! Single entry point every tool uses to turn a checkpoint file into a network.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fer_model::checkpoint::{read_checkpoint, Format};
use fer_model::{resolve, Confidence, LoadReport, Network, ParameterSet, Registry, Resolution};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A checkpoint loaded into the architecture it was resolved to.
#[derive(Debug)]
pub struct LoadedModel {
    pub network: Network,
    pub confidence: Confidence,
    pub observed_shape: Option<Vec<usize>>,
    pub report: LoadReport,
}

/// Checkpoint files found in one directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CheckpointListing {
    /// Files with a checkpoint extension, sorted.
    pub paths: Vec<PathBuf>,
    /// Directory entries that could not be read.
    pub unreadable: usize,
}

/// List the checkpoints directly under `dir`. Non-recursive.
pub fn list_checkpoints(dir: &Path) -> Result<CheckpointListing> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()));
    Ok(collect_checkpoints(dir, entries))
}

fn collect_checkpoints(
    dir: &Path,
    entries: impl IntoIterator<Item = io::Result<PathBuf>>,
) -> CheckpointListing {
    let mut listing = CheckpointListing::default();
    for entry in entries {
        match entry {
            Ok(path) if Format::from_path(&path).is_ok() => listing.paths.push(path),
            Ok(_) => {}
            Err(e) => {
                listing.unreadable += 1;
                warn!("{}: unreadable directory entry: {}", dir.display(), e);
            }
        }
    }
    listing.paths.sort();
    listing
}

pub fn read_params(path: &Path) -> Result<ParameterSet> {
    let params =
        read_checkpoint(path).with_context(|| format!("reading checkpoint {}", path.display()))?;
    if params.is_empty() {
        warn!("checkpoint {} holds no parameters", path.display());
    }
    Ok(params)
}

/// Log a resolution the way callers are expected to: warnings for guesses.
pub fn log_resolution(res: &Resolution<'_>) {
    let desc = res.descriptor;
    match res.confidence {
        Confidence::Matched => {
            info!(
                "Detected classifier shape {:?}: loading {} model ({})",
                res.observed_shape.as_deref().unwrap_or_default(),
                desc.id,
                desc.summary
            );
        }
        Confidence::Unknown => {
            warn!(
                "Unknown classifier shape {:?}, attempting to load as {} model",
                res.observed_shape.as_deref().unwrap_or_default(),
                desc.id
            );
        }
        Confidence::Defaulted => {
            warn!(
                "Cannot determine model version, using {} model",
                desc.id
            );
        }
    }
}

/// Read, resolve and load a checkpoint.
///
/// Resolution uncertainty is only logged; a weight shape mismatch is fatal
/// for this checkpoint.
pub fn load_model(path: &Path, registry: &Registry, num_classes: usize) -> Result<LoadedModel> {
    info!("Loading model from {}", path.display());
    let params = read_params(path)?;

    let resolution = resolve(&params, registry).context("resolving checkpoint architecture")?;
    log_resolution(&resolution);

    // weights are overwritten by the checkpoint; the seed only affects
    // parameters the checkpoint does not carry
    let mut rng = StdRng::seed_from_u64(0);
    let mut network = Network::untrained(resolution.descriptor, num_classes, &mut rng);
    let report = network
        .load_parameters(&params)
        .with_context(|| format!("loading weights from {}", path.display()))?;

    if !report.missing.is_empty() {
        warn!(
            "{} network parameters not found in checkpoint (first: {})",
            report.missing.len(),
            report.missing[0]
        );
    }
    info!(
        "Loaded {} parameters ({} shape-only, {} unused checkpoint entries)",
        report.loaded.len() + report.verified_only.len(),
        report.verified_only.len(),
        report.unused.len()
    );

    Ok(LoadedModel {
        network,
        confidence: resolution.confidence,
        observed_shape: resolution.observed_shape,
        report,
    })
}
