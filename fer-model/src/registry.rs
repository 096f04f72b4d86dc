use crate::architecture::{ArchitectureDescriptor, ArchitectureId};
use crate::resolver::ResolutionError;

/// Closed, ordered set of known architectures with one designated default.
///
/// Fingerprints are pairwise distinct, so a checkpoint shape selects at most
/// one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    descriptors: Vec<ArchitectureDescriptor>,
    default: Option<usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Every architecture this build knows about; `Current512` is the default.
    pub fn builtin() -> Result<Self, ResolutionError> {
        Self::builder()
            .register(ArchitectureDescriptor::legacy128())?
            .register(ArchitectureDescriptor::current512())?
            .with_default(ArchitectureId::Current512)
            .build()
    }

    pub fn descriptors(&self) -> &[ArchitectureDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, id: ArchitectureId) -> Option<&ArchitectureDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// The fallback used when a checkpoint cannot be matched.
    pub fn default_descriptor(&self) -> Option<&ArchitectureDescriptor> {
        self.default.map(|i| &self.descriptors[i])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ArchitectureDescriptor>,
    default: Option<ArchitectureId>,
}

impl RegistryBuilder {
    pub fn register(mut self, descriptor: ArchitectureDescriptor) -> Result<Self, ResolutionError> {
        if !descriptor.fingerprint.is_valid() {
            return Err(ResolutionError::InvalidFingerprint {
                id: descriptor.id,
                fingerprint: descriptor.fingerprint,
            });
        }
        if let Some(existing) = self
            .descriptors
            .iter()
            .find(|d| d.fingerprint == descriptor.fingerprint)
        {
            return Err(ResolutionError::DuplicateFingerprint {
                existing: existing.id,
                rejected: descriptor.id,
                fingerprint: descriptor.fingerprint,
            });
        }
        if self.descriptors.iter().any(|d| d.id == descriptor.id) {
            return Err(ResolutionError::DuplicateArchitecture(descriptor.id));
        }
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Designate the fallback. Without this the last registered descriptor is used.
    pub fn with_default(mut self, id: ArchitectureId) -> Self {
        self.default = Some(id);
        self
    }

    pub fn build(self) -> Result<Registry, ResolutionError> {
        let default = match self.default {
            Some(id) => Some(
                self.descriptors
                    .iter()
                    .position(|d| d.id == id)
                    .ok_or(ResolutionError::UnknownDefault(id))?,
            ),
            None => self.descriptors.len().checked_sub(1),
        };
        Ok(Registry {
            descriptors: self.descriptors,
            default,
        })
    }
}
