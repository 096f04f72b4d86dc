pub mod architecture;
pub mod checkpoint;
pub mod emotion;
pub mod network;
pub mod preprocess;
pub mod registry;
pub mod resolver;
pub mod tensor;

// Re-export commonly used types
pub use architecture::{ArchitectureDescriptor, ArchitectureId, Fingerprint, CLASSIFIER_KEY};
pub use emotion::{EmotionTable, Prediction};
pub use network::{LoadError, LoadReport, Network};
pub use registry::Registry;
pub use resolver::{resolve, Confidence, Resolution, ResolutionError};
pub use tensor::{DType, ParameterSet, Tensor, TensorDescriptor};
