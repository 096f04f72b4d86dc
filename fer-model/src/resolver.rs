//! Checkpoint architecture detection.
//!
//! Checkpoints do not record which network produced them. The shape of the
//! first classifier layer differs between versions, so [`resolve`] reads that
//! one tensor and picks the registered architecture with the same fingerprint.
//! Missing or unrecognised shapes degrade to the registry default with a
//! confidence flag instead of failing; the caller decides how loudly to warn.

use std::fmt;

use thiserror::Error;

use crate::architecture::{ArchitectureDescriptor, ArchitectureId, Fingerprint, CLASSIFIER_KEY};
use crate::registry::Registry;
use crate::tensor::ParameterSet;

/// Registry misconfiguration. None of these depend on checkpoint contents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("architecture registry is empty")]
    EmptyRegistry,

    #[error("{rejected} has fingerprint {fingerprint}, already registered by {existing}")]
    DuplicateFingerprint {
        existing: ArchitectureId,
        rejected: ArchitectureId,
        fingerprint: Fingerprint,
    },

    #[error("{id} has fingerprint {fingerprint} with a zero dimension")]
    InvalidFingerprint {
        id: ArchitectureId,
        fingerprint: Fingerprint,
    },

    #[error("architecture {0} registered twice")]
    DuplicateArchitecture(ArchitectureId),

    #[error("default architecture {0} is not registered")]
    UnknownDefault(ArchitectureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// The classifier shape equals a registered fingerprint.
    Matched,
    /// The checkpoint has no classifier key.
    Defaulted,
    /// The classifier shape matches no registered fingerprint.
    Unknown,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Matched => "matched",
            Self::Defaulted => "defaulted",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'r> {
    pub descriptor: &'r ArchitectureDescriptor,
    pub confidence: Confidence,
    /// Shape of the classifier key, when the checkpoint has one.
    pub observed_shape: Option<Vec<usize>>,
}

impl Resolution<'_> {
    pub fn id(&self) -> ArchitectureId {
        self.descriptor.id
    }

    /// True when the selection is a best guess rather than a fingerprint match.
    pub fn is_warning(&self) -> bool {
        self.confidence != Confidence::Matched
    }
}

/// Select the architecture that produced `params`.
pub fn resolve<'r>(
    params: &ParameterSet,
    registry: &'r Registry,
) -> Result<Resolution<'r>, ResolutionError> {
    let default = registry
        .default_descriptor()
        .ok_or(ResolutionError::EmptyRegistry)?;

    let Some(tensor) = params.get(CLASSIFIER_KEY) else {
        return Ok(Resolution {
            descriptor: default,
            confidence: Confidence::Defaulted,
            observed_shape: None,
        });
    };

    let shape = tensor.shape();
    let (descriptor, confidence) = match registry
        .descriptors()
        .iter()
        .find(|d| d.fingerprint.matches(shape))
    {
        Some(d) => (d, Confidence::Matched),
        None => (default, Confidence::Unknown),
    };

    Ok(Resolution {
        descriptor,
        confidence,
        observed_shape: Some(shape.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DType, Tensor};

    fn checkpoint(entries: &[(&str, Vec<usize>)]) -> ParameterSet {
        let mut params = ParameterSet::new();
        for (name, shape) in entries {
            params
                .insert(*name, Tensor::shape_only(shape.clone(), DType::F32).unwrap())
                .unwrap();
        }
        params
    }

    #[test]
    fn legacy_shape_matches_legacy() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![128, 128])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.id(), ArchitectureId::Legacy128);
        assert_eq!(res.confidence, Confidence::Matched);
        assert!(!res.is_warning());
    }

    #[test]
    fn current_shape_matches_current() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[("conv1.weight", vec![64, 1, 3, 3]), (CLASSIFIER_KEY, vec![256, 512])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.id(), ArchitectureId::Current512);
        assert_eq!(res.confidence, Confidence::Matched);
        assert_eq!(res.observed_shape, Some(vec![256, 512]));
    }

    #[test]
    fn unknown_shape_defaults_with_diagnostic() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![64, 64])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.id(), ArchitectureId::Current512);
        assert_eq!(res.confidence, Confidence::Unknown);
        assert_eq!(res.observed_shape, Some(vec![64, 64]));
        assert!(res.is_warning());
    }

    #[test]
    fn transposed_shape_is_not_a_match() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![512, 256])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.confidence, Confidence::Unknown);
    }

    #[test]
    fn non_matrix_shape_is_unknown() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![128, 128, 1])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.confidence, Confidence::Unknown);
        assert_eq!(res.observed_shape, Some(vec![128, 128, 1]));
    }

    #[test]
    fn missing_key_defaults() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[("classifier.4.weight", vec![7, 128]), ("bn1.gamma", vec![64])]);
        let res = resolve(&params, &reg).unwrap();
        assert_eq!(res.id(), ArchitectureId::Current512);
        assert_eq!(res.confidence, Confidence::Defaulted);
        assert_eq!(res.observed_shape, None);
    }

    #[test]
    fn empty_checkpoint_defaults() {
        let reg = Registry::builtin().unwrap();
        let res = resolve(&ParameterSet::new(), &reg).unwrap();
        assert_eq!(res.confidence, Confidence::Defaulted);
    }

    #[test]
    fn empty_registry_is_an_error() {
        let reg = Registry::builder().build().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![128, 128])]);
        assert_eq!(resolve(&params, &reg), Err(ResolutionError::EmptyRegistry));
    }

    #[test]
    fn idempotent() {
        let reg = Registry::builtin().unwrap();
        let params = checkpoint(&[(CLASSIFIER_KEY, vec![64, 64])]);
        assert_eq!(resolve(&params, &reg), resolve(&params, &reg));
    }
}
