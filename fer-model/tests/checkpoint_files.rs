use anyhow::Result;
use fer_model::checkpoint::{read_checkpoint, write_checkpoint, CheckpointError};
use fer_model::{resolve, ArchitectureId, Confidence, LoadError, Network, Registry, CLASSIFIER_KEY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("fer-model-test-{}-{}", std::process::id(), name));
    p
}

fn untrained(registry: &Registry, id: ArchitectureId, seed: u64) -> Network {
    let desc = registry.get(id).expect("registered architecture");
    Network::untrained(desc, 7, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn saved_network_resolves_and_loads() -> Result<()> {
    env_logger::try_init().ok();
    let registry = Registry::builtin()?;

    for id in [ArchitectureId::Legacy128, ArchitectureId::Current512] {
        let source = untrained(&registry, id, 1);
        let path = temp_path(&format!("{id}.fckpt"));
        write_checkpoint(&path, &source.to_parameter_set()?)?;

        let params = read_checkpoint(&path)?;
        let res = resolve(&params, &registry)?;
        assert_eq!(res.id(), id);
        assert_eq!(res.confidence, Confidence::Matched);

        let mut target = Network::untrained(res.descriptor, 7, &mut StdRng::seed_from_u64(2));
        let report = target.load_parameters(&params)?;
        assert!(report.is_complete());
        assert!(report.verified_only.is_empty());
        assert_eq!(target.parameter(CLASSIFIER_KEY), source.parameter(CLASSIFIER_KEY));

        std::fs::remove_file(&path).ok();
    }
    Ok(())
}

#[test]
fn manifest_checkpoint_verifies_shapes_only() -> Result<()> {
    let registry = Registry::builtin()?;
    let path = temp_path("legacy-manifest.json");
    write_checkpoint(
        &path,
        &untrained(&registry, ArchitectureId::Legacy128, 3).to_parameter_set()?,
    )?;

    let params = read_checkpoint(&path)?;
    let res = resolve(&params, &registry)?;
    assert_eq!(res.id(), ArchitectureId::Legacy128);

    let mut net = untrained(&registry, res.id(), 4);
    let report = net.load_parameters(&params)?;
    assert!(report.loaded.is_empty());
    assert_eq!(report.verified_only.len(), net.parameter_count());

    std::fs::remove_file(&path).ok();
    Ok(())
}

#[test]
fn wrong_architecture_fails_weight_loading() -> Result<()> {
    let registry = Registry::builtin()?;
    let legacy = untrained(&registry, ArchitectureId::Legacy128, 5).to_parameter_set()?;

    let mut current = untrained(&registry, ArchitectureId::Current512, 6);
    let err = current.load_parameters(&legacy).unwrap_err();
    assert!(matches!(err, LoadError::WeightShapeMismatch { .. }));
    Ok(())
}

#[test]
fn unknown_extension_rejected() {
    let err = read_checkpoint(&temp_path("best_model.ckpt")).unwrap_err();
    assert!(matches!(err, CheckpointError::UnsupportedExtension(_)));
}
