use ndarray::{ArrayD, IxDyn};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use thiserror::Error;

use crate::architecture::{ArchitectureDescriptor, ArchitectureId, Init};
use crate::tensor::{ParameterSet, Tensor, TensorError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("shape mismatch for {name}: network expects {expected:?}, checkpoint has {found:?}")]
    WeightShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("cannot export tensor {0}")]
    Export(String, #[source] TensorError),
}

/// Outcome of copying checkpoint weights into a network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters overwritten with checkpoint data.
    pub loaded: Vec<String>,
    /// Shape-only checkpoint entries that matched but carried no data.
    pub verified_only: Vec<String>,
    /// Network parameters absent from the checkpoint, left at their initial value.
    pub missing: Vec<String>,
    /// Checkpoint entries the network does not own.
    pub unused: Vec<String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Parameter storage of one instantiated architecture.
#[derive(Debug, Clone)]
pub struct Network {
    architecture: ArchitectureId,
    params: Vec<(String, ArrayD<f32>)>,
}

impl Network {
    /// Build the topology with freshly initialised weights.
    pub fn untrained<R: Rng + ?Sized>(
        descriptor: &ArchitectureDescriptor,
        num_classes: usize,
        rng: &mut R,
    ) -> Self {
        let params = descriptor
            .topology(num_classes)
            .params
            .into_iter()
            .map(|spec| {
                let dim = IxDyn(&spec.shape);
                let array = match spec.init {
                    Init::Zeros => ArrayD::zeros(dim),
                    Init::Ones => ArrayD::ones(dim),
                    Init::HeUniform { fan_in } => {
                        let bound = (6.0 / fan_in.max(1) as f32).sqrt();
                        let dist = Uniform::new_inclusive(-bound, bound);
                        ArrayD::from_shape_simple_fn(dim, || dist.sample(&mut *rng))
                    }
                };
                (spec.name, array)
            })
            .collect();

        Self {
            architecture: descriptor.id,
            params,
        }
    }

    pub fn architecture(&self) -> ArchitectureId {
        self.architecture
    }

    pub fn parameter(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn element_count(&self) -> usize {
        self.params.iter().map(|(_, a)| a.len()).sum()
    }

    /// Copy matching checkpoint tensors into the network.
    ///
    /// All shapes are checked before anything is written, so a mismatch
    /// leaves the network untouched.
    pub fn load_parameters(&mut self, checkpoint: &ParameterSet) -> Result<LoadReport, LoadError> {
        for (name, array) in &self.params {
            if let Some(tensor) = checkpoint.get(name) {
                if tensor.shape() != array.shape() {
                    return Err(LoadError::WeightShapeMismatch {
                        name: name.clone(),
                        expected: array.shape().to_vec(),
                        found: tensor.shape().to_vec(),
                    });
                }
            }
        }

        let mut report = LoadReport::default();
        for (name, array) in &mut self.params {
            match checkpoint.get(name) {
                Some(Tensor { data: Some(data), .. }) => {
                    array
                        .iter_mut()
                        .zip(data.iter())
                        .for_each(|(dst, &src)| *dst = src);
                    report.loaded.push(name.clone());
                }
                Some(_) => report.verified_only.push(name.clone()),
                None => report.missing.push(name.clone()),
            }
        }

        report.unused = checkpoint
            .names()
            .filter(|n| self.parameter(n).is_none())
            .map(str::to_owned)
            .collect();

        log::debug!(
            "{}: loaded={} verified_only={} missing={} unused={}",
            self.architecture,
            report.loaded.len(),
            report.verified_only.len(),
            report.missing.len(),
            report.unused.len()
        );
        Ok(report)
    }

    /// Weights as a checkpoint parameter set, in topology order.
    pub fn to_parameter_set(&self) -> Result<ParameterSet, LoadError> {
        let mut set = ParameterSet::new();
        for (name, array) in &self.params {
            let tensor = Tensor::from_f32(array.shape().to_vec(), array.iter().copied().collect())
                .map_err(|e| LoadError::Export(name.clone(), e))?;
            set.insert(name.clone(), tensor)
                .map_err(|e| LoadError::Export(name.clone(), e))?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::CLASSIFIER_KEY;
    use crate::tensor::DType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn legacy() -> Network {
        let mut rng = StdRng::seed_from_u64(7);
        Network::untrained(&ArchitectureDescriptor::legacy128(), 7, &mut rng)
    }

    #[test]
    fn init_kinds_applied() {
        let net = legacy();
        assert!(net.parameter("bn1.gamma").unwrap().iter().all(|&v| v == 1.0));
        assert!(net.parameter("bn1.beta").unwrap().iter().all(|&v| v == 0.0));
        let bound = (6.0f32 / 128.0).sqrt();
        let head = net.parameter(CLASSIFIER_KEY).unwrap();
        assert_eq!(head.shape(), &[128, 128]);
        assert!(head.iter().all(|v| v.abs() <= bound));
        assert!(head.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn export_then_load_round_trips() {
        let net = legacy();
        let exported = net.to_parameter_set().unwrap();
        assert_eq!(exported.len(), net.parameter_count());

        let mut rng = StdRng::seed_from_u64(99);
        let mut other = Network::untrained(&ArchitectureDescriptor::legacy128(), 7, &mut rng);
        let report = other.load_parameters(&exported).unwrap();

        assert!(report.is_complete());
        assert!(report.unused.is_empty());
        assert_eq!(report.loaded.len(), net.parameter_count());
        assert_eq!(other.parameter(CLASSIFIER_KEY), net.parameter(CLASSIFIER_KEY));
    }

    #[test]
    fn mismatch_leaves_network_untouched() {
        let mut net = legacy();
        let before = net.parameter("conv1.weight").cloned();

        let mut ckpt = ParameterSet::new();
        ckpt.insert("conv1.weight", Tensor::from_f32(vec![64, 1, 3, 3], vec![0.5; 576]).unwrap())
            .unwrap();
        ckpt.insert("classifier.4.weight", Tensor::shape_only(vec![7, 256], DType::F32).unwrap())
            .unwrap();

        let err = net.load_parameters(&ckpt).unwrap_err();
        assert_eq!(
            err,
            LoadError::WeightShapeMismatch {
                name: "classifier.4.weight".into(),
                expected: vec![7, 128],
                found: vec![7, 256],
            }
        );
        assert_eq!(net.parameter("conv1.weight").cloned(), before);
    }

    #[test]
    fn partial_checkpoint_reports_missing_and_unused() {
        let mut net = legacy();
        let mut ckpt = ParameterSet::new();
        ckpt.insert(CLASSIFIER_KEY, Tensor::shape_only(vec![128, 128], DType::F32).unwrap())
            .unwrap();
        ckpt.insert("global_step", Tensor::shape_only(vec![1], DType::I32).unwrap())
            .unwrap();

        let report = net.load_parameters(&ckpt).unwrap();
        assert_eq!(report.verified_only, vec![CLASSIFIER_KEY.to_string()]);
        assert_eq!(report.unused, vec!["global_step".to_string()]);
        assert_eq!(report.missing.len(), net.parameter_count() - 1);
        assert!(!report.is_complete());
    }
}
