pub mod config;
pub mod diagnose;
pub mod loader;

// Re-export model types for convenience
pub use fer_model::{
    checkpoint, emotion, preprocess, resolve, ArchitectureId, Confidence, EmotionTable, Network,
    ParameterSet, Registry, Resolution,
};
