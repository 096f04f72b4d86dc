use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("tensor has a zero-sized dimension: {0:?}")]
    ZeroDim(Vec<usize>),

    #[error("tensor data holds {found} elements, shape {shape:?} needs {expected}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },

    #[error("duplicate parameter name: {0}")]
    DuplicateName(String),

    #[error("element count of shape {0:?} overflows usize")]
    Overflow(Vec<usize>),
}

/// Element type of a stored tensor. Only `F32` tensors carry data in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F16,
    I32,
    I64,
    U8,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorDescriptor {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub element_count: usize,
}

impl TensorDescriptor {
    pub fn new(shape: Vec<usize>, dtype: DType) -> Result<Self, TensorError> {
        if shape.iter().any(|&d| d == 0) {
            return Err(TensorError::ZeroDim(shape));
        }
        let Some(element_count) = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
        else {
            return Err(TensorError::Overflow(shape));
        };
        Ok(Self {
            shape,
            dtype,
            element_count,
        })
    }

    /// Shape as a `(rows, cols)` pair, if the tensor is two-dimensional.
    pub fn as_matrix(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Some((rows, cols)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub descriptor: TensorDescriptor,
    pub data: Option<Vec<f32>>,
}

impl Tensor {
    /// Tensor known only by its shape (e.g. read from a manifest).
    pub fn shape_only(shape: Vec<usize>, dtype: DType) -> Result<Self, TensorError> {
        Ok(Self {
            descriptor: TensorDescriptor::new(shape, dtype)?,
            data: None,
        })
    }

    pub fn from_f32(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, TensorError> {
        let descriptor = TensorDescriptor::new(shape, DType::F32)?;
        if data.len() != descriptor.element_count {
            return Err(TensorError::DataLength {
                shape: descriptor.shape,
                expected: descriptor.element_count,
                found: data.len(),
            });
        }
        Ok(Self {
            descriptor,
            data: Some(data),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.descriptor.shape
    }
}

/// Named tensors of one checkpoint, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, Tensor)>,
    index: HashMap<String, usize>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<(), TensorError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TensorError::DuplicateName(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, tensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Total number of scalar elements across all tensors.
    ///
    /// Widened to `u128`: every tensor fits `usize`, their sum need not.
    pub fn element_count(&self) -> u128 {
        self.entries
            .iter()
            .map(|(_, t)| t.descriptor.element_count as u128)
            .sum()
    }
}
