//! Known network topologies of the FER2013 classifier.
//!
//! Both versions share the residual/attention backbone: a 3x3 stem conv, then
//! four stages of two residual blocks, each block carrying channel (SE-style)
//! and spatial attention. They differ in the width of the last two stages and
//! in the classifier head, which is what makes `classifier.0.weight` a usable
//! fingerprint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Parameter whose shape identifies the architecture.
pub const CLASSIFIER_KEY: &str = "classifier.0.weight";

const STEM_CHANNELS: usize = 64;
const ATTENTION_REDUCTION: usize = 16;
const SPATIAL_KERNEL: usize = 7;
const BLOCKS_PER_STAGE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArchitectureId {
    Legacy128,
    Current512,
}

impl ArchitectureId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy128 => "legacy128",
            Self::Current512 => "current512",
        }
    }
}

impl fmt::Display for ArchitectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchitectureId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy128" | "legacy" => Ok(Self::Legacy128),
            "current512" | "current" => Ok(Self::Current512),
            other => Err(format!("unknown architecture: {other}")),
        }
    }
}

/// Shape of the first classifier dense layer: (output features, input features).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub usize, pub usize);

impl Fingerprint {
    /// A classifier tensor never has an empty dimension, so neither may this.
    pub fn is_valid(&self) -> bool {
        self.0 > 0 && self.1 > 0
    }

    pub fn matches(&self, shape: &[usize]) -> bool {
        shape == [self.0, self.1]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// How a parameter is filled in an untrained network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    /// He-uniform over the given fan-in.
    HeUniform { fan_in: usize },
    Zeros,
    Ones,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub init: Init,
}

/// Ordered parameter layout of one network instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub params: Vec<ParamSpec>,
}

impl Topology {
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn element_count(&self) -> usize {
        self.params
            .iter()
            .map(|p| p.shape.iter().product::<usize>())
            .sum()
    }

    fn push(&mut self, name: String, shape: Vec<usize>, init: Init) {
        self.params.push(ParamSpec { name, shape, init });
    }

    fn conv(&mut self, prefix: &str, out_ch: usize, in_ch: usize, kernel: usize) {
        self.push(
            format!("{prefix}.weight"),
            vec![out_ch, in_ch, kernel, kernel],
            Init::HeUniform {
                fan_in: in_ch * kernel * kernel,
            },
        );
    }

    fn dense(&mut self, prefix: &str, out_f: usize, in_f: usize) {
        self.push(
            format!("{prefix}.weight"),
            vec![out_f, in_f],
            Init::HeUniform { fan_in: in_f },
        );
        self.push(format!("{prefix}.bias"), vec![out_f], Init::Zeros);
    }

    fn batch_norm(&mut self, prefix: &str, channels: usize) {
        self.push(format!("{prefix}.gamma"), vec![channels], Init::Ones);
        self.push(format!("{prefix}.beta"), vec![channels], Init::Zeros);
        self.push(format!("{prefix}.moving_mean"), vec![channels], Init::Zeros);
        self.push(format!("{prefix}.moving_variance"), vec![channels], Init::Ones);
    }

    fn residual_block(&mut self, prefix: &str, in_ch: usize, out_ch: usize, stride: usize) {
        self.conv(&format!("{prefix}.conv1"), out_ch, in_ch, 3);
        self.batch_norm(&format!("{prefix}.bn1"), out_ch);
        self.conv(&format!("{prefix}.conv2"), out_ch, out_ch, 3);
        self.batch_norm(&format!("{prefix}.bn2"), out_ch);

        let reduced = out_ch / ATTENTION_REDUCTION;
        self.dense(&format!("{prefix}.channel_attention.fc.0"), reduced, out_ch);
        self.dense(&format!("{prefix}.channel_attention.fc.2"), out_ch, reduced);
        self.conv(
            &format!("{prefix}.spatial_attention.conv"),
            1,
            2,
            SPATIAL_KERNEL,
        );

        if stride != 1 || in_ch != out_ch {
            self.conv(&format!("{prefix}.downsample.0"), out_ch, in_ch, 1);
            self.batch_norm(&format!("{prefix}.downsample.1"), out_ch);
        }
    }

    fn backbone(&mut self, widths: [usize; 4]) {
        self.conv("conv1", STEM_CHANNELS, 1, 3);
        self.batch_norm("bn1", STEM_CHANNELS);

        let mut in_ch = STEM_CHANNELS;
        for (stage, &out_ch) in widths.iter().enumerate() {
            let stride = if stage == 0 { 1 } else { 2 };
            for block in 0..BLOCKS_PER_STAGE {
                let prefix = format!("layer{}.{}", stage + 1, block);
                if block == 0 {
                    self.residual_block(&prefix, in_ch, out_ch, stride);
                } else {
                    self.residual_block(&prefix, out_ch, out_ch, 1);
                }
            }
            in_ch = out_ch;
        }
    }
}

/// Stage widths 64/128/128/128, head `128 -> 128 -> C`.
pub fn legacy128(num_classes: usize) -> Topology {
    let mut t = Topology::default();
    t.backbone([64, 128, 128, 128]);
    // indices follow the sequential head: Dense, BN, ReLU, Dropout, Dense
    t.dense("classifier.0", 128, 128);
    t.batch_norm("classifier.1", 128);
    t.dense("classifier.4", num_classes, 128);
    t
}

/// Stage widths 64/128/256/512, head `512 -> 256 -> 128 -> C`.
pub fn current512(num_classes: usize) -> Topology {
    let mut t = Topology::default();
    t.backbone([64, 128, 256, 512]);
    t.dense("classifier.0", 256, 512);
    t.batch_norm("classifier.1", 256);
    t.dense("classifier.4", 128, 256);
    t.batch_norm("classifier.5", 128);
    t.dense("classifier.8", num_classes, 128);
    t
}

/// One registered architecture: its identity, fingerprint and factory.
#[derive(Clone)]
pub struct ArchitectureDescriptor {
    pub id: ArchitectureId,
    pub fingerprint: Fingerprint,
    pub summary: &'static str,
    pub factory: fn(usize) -> Topology,
}

impl ArchitectureDescriptor {
    pub fn legacy128() -> Self {
        Self {
            id: ArchitectureId::Legacy128,
            fingerprint: Fingerprint(128, 128),
            summary: "128 -> 128 -> C",
            factory: legacy128,
        }
    }

    pub fn current512() -> Self {
        Self {
            id: ArchitectureId::Current512,
            fingerprint: Fingerprint(256, 512),
            summary: "512 -> 256 -> 128 -> C",
            factory: current512,
        }
    }

    pub fn topology(&self, num_classes: usize) -> Topology {
        (self.factory)(num_classes)
    }
}

impl fmt::Debug for ArchitectureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchitectureDescriptor")
            .field("id", &self.id)
            .field("fingerprint", &self.fingerprint)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ArchitectureDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fingerprint == other.fingerprint
    }
}

impl Eq for ArchitectureDescriptor {}
