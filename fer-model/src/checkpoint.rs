//! Checkpoint files.
//!
//! Two on-disk forms are understood:
//! - `.fckpt`: postcard-encoded header plus tensors, f32 payloads stored as
//!   raw bytes.
//! - `.json`: a shape-only manifest (`[{"name", "shape", "dtype"}]`), as
//!   dumped from a framework-native checkpoint by an external converter.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::{DType, ParameterSet, Tensor, TensorError};

pub const MAGIC: &str = "FERCKPT";
pub const VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint decode error: {0}")]
    Decode(String),

    #[error("checkpoint encode error: {0}")]
    Encode(String),

    #[error("not a checkpoint file (magic {0:?})")]
    BadMagic(String),

    #[error("unsupported checkpoint version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported checkpoint extension: {0}")]
    UnsupportedExtension(String),

    #[error("invalid tensor {name}: {source}")]
    Tensor {
        name: String,
        #[source]
        source: TensorError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Manifest,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, CheckpointError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "fckpt" => Ok(Self::Binary),
            "json" => Ok(Self::Manifest),
            _ => Err(CheckpointError::UnsupportedExtension(ext)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    magic: String,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct BinaryFile {
    header: Header,
    tensors: Vec<TensorRecord>,
}

#[derive(Serialize, Deserialize)]
struct TensorRecord {
    name: String,
    shape: Vec<usize>,
    dtype: DType,
    #[serde(with = "serde_bytes")]
    data: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct ManifestEntry {
    name: String,
    shape: Vec<usize>,
    #[serde(default = "default_dtype")]
    dtype: DType,
}

fn default_dtype() -> DType {
    DType::F32
}

pub fn read_checkpoint(path: &Path) -> Result<ParameterSet, CheckpointError> {
    let format = Format::from_path(path)?;
    let data = std::fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let params = match format {
        Format::Binary => decode_binary(&data)?,
        Format::Manifest => decode_manifest(&data)?,
    };
    log::debug!(
        "read checkpoint {}: format={:?} tensors={} elements={}",
        path.display(),
        format,
        params.len(),
        params.element_count()
    );
    Ok(params)
}

pub fn write_checkpoint(path: &Path, params: &ParameterSet) -> Result<(), CheckpointError> {
    let data = match Format::from_path(path)? {
        Format::Binary => encode_binary(params)?,
        Format::Manifest => encode_manifest(params)?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, data).map_err(|source| CheckpointError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn encode_binary(params: &ParameterSet) -> Result<Vec<u8>, CheckpointError> {
    let file = BinaryFile {
        header: Header {
            magic: MAGIC.to_string(),
            version: VERSION,
        },
        tensors: params
            .iter()
            .map(|(name, t)| TensorRecord {
                name: name.to_string(),
                shape: t.descriptor.shape.clone(),
                dtype: t.descriptor.dtype,
                data: t
                    .data
                    .as_ref()
                    .map(|d| bytemuck::cast_slice::<f32, u8>(d).to_vec()),
            })
            .collect(),
    };
    postcard::to_allocvec(&file).map_err(|e| CheckpointError::Encode(e.to_string()))
}

pub fn decode_binary(data: &[u8]) -> Result<ParameterSet, CheckpointError> {
    let file: BinaryFile =
        postcard::from_bytes(data).map_err(|e| CheckpointError::Decode(e.to_string()))?;
    if file.header.magic != MAGIC {
        return Err(CheckpointError::BadMagic(file.header.magic));
    }
    if file.header.version != VERSION {
        return Err(CheckpointError::UnsupportedVersion(file.header.version));
    }

    let mut params = ParameterSet::new();
    for record in file.tensors {
        let name = record.name;
        let tensor = match record.data {
            Some(bytes) => {
                if record.dtype != DType::F32 || bytes.len() % 4 != 0 {
                    return Err(CheckpointError::Decode(format!(
                        "tensor {name}: payload of {} bytes is not f32 data",
                        bytes.len()
                    )));
                }
                // the byte buffer carries no alignment guarantee
                let values: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(bytemuck::pod_read_unaligned::<f32>)
                    .collect();
                Tensor::from_f32(record.shape, values)
            }
            None => Tensor::shape_only(record.shape, record.dtype),
        }
        .map_err(|source| CheckpointError::Tensor {
            name: name.clone(),
            source,
        })?;
        params
            .insert(name.clone(), tensor)
            .map_err(|source| CheckpointError::Tensor { name, source })?;
    }
    Ok(params)
}

pub fn encode_manifest(params: &ParameterSet) -> Result<Vec<u8>, CheckpointError> {
    let entries: Vec<ManifestEntry> = params
        .iter()
        .map(|(name, t)| ManifestEntry {
            name: name.to_string(),
            shape: t.descriptor.shape.clone(),
            dtype: t.descriptor.dtype,
        })
        .collect();
    serde_json::to_vec_pretty(&entries).map_err(|e| CheckpointError::Encode(e.to_string()))
}

pub fn decode_manifest(data: &[u8]) -> Result<ParameterSet, CheckpointError> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_slice(data).map_err(|e| CheckpointError::Decode(e.to_string()))?;
    let mut params = ParameterSet::new();
    for entry in entries {
        let name = entry.name;
        let tensor = Tensor::shape_only(entry.shape, entry.dtype).map_err(|source| {
            CheckpointError::Tensor {
                name: name.clone(),
                source,
            }
        })?;
        params
            .insert(name.clone(), tensor)
            .map_err(|source| CheckpointError::Tensor { name, source })?;
    }
    Ok(params)
}

/// Summary statistics over a tensor's values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std_dev: f32,
}

impl TensorStats {
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64);
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }
        let mean = sum / n;
        let var = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Some(Self {
            min,
            max,
            mean: mean as f32,
            std_dev: var.sqrt() as f32,
        })
    }

    pub fn of(tensor: &Tensor) -> Option<Self> {
        tensor.data.as_deref().and_then(Self::from_values)
    }
}
