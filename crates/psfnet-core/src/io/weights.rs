//! Weight container: a flat map from layer identifier to numeric arrays.
//!
//! Layout (all little-endian):
//!
//! ```text
//! magic     8 bytes  "PSFNETW1"
//! count     u32
//! entries   count x { name_len u16, name utf-8, rank u8, dims u32 x rank, values f32 x prod(dims) }
//! ```
//!
//! Each convolution contributes `<layer>/kernel` and `<layer>/bias`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{Array1, Array4};
use tracing::info;

use crate::consts::WEIGHTS_MAGIC;
use crate::error::{KernelNetError, Result};
use crate::network::KernelNetwork;

#[derive(Clone, Debug, PartialEq)]
pub struct WeightTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Named weight arrays, ordered by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightStore {
    entries: BTreeMap<String, WeightTensor>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot all weights of `network`.
    pub fn from_network(network: &KernelNetwork) -> Self {
        let mut store = Self::new();
        for (name, w) in network.named_weights() {
            store.insert(
                format!("{name}/kernel"),
                WeightTensor {
                    shape: w.kernel.shape().to_vec(),
                    values: w.kernel.iter().copied().collect(),
                },
            );
            store.insert(
                format!("{name}/bias"),
                WeightTensor {
                    shape: w.bias.shape().to_vec(),
                    values: w.bias.to_vec(),
                },
            );
        }
        store
    }

    pub fn insert(&mut self, name: String, tensor: WeightTensor) {
        self.entries.insert(name, tensor);
    }

    pub fn get(&self, name: &str) -> Option<&WeightTensor> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copy the stored arrays into `network`.
    ///
    /// Every layer must be present with exactly its shape and no extra
    /// entries may exist; on any mismatch the network is left untouched.
    pub fn apply_to(&self, network: &mut KernelNetwork) -> Result<()> {
        let mut expected = 0usize;
        for (name, w) in network.named_weights() {
            self.expect(&format!("{name}/kernel"), w.kernel.shape())?;
            self.expect(&format!("{name}/bias"), w.bias.shape())?;
            expected += 2;
        }
        if expected != self.entries.len() {
            let known: Vec<String> = network
                .named_weights()
                .into_iter()
                .flat_map(|(n, _)| [format!("{n}/kernel"), format!("{n}/bias")])
                .collect();
            let extra = self
                .names()
                .find(|n| !known.iter().any(|k| k == n))
                .unwrap_or_default()
                .to_string();
            return Err(KernelNetError::WeightMismatch {
                layer: extra,
                reason: "not present in the network".into(),
            });
        }

        for (name, w) in network.named_weights_mut() {
            let kernel = &self.entries[&format!("{name}/kernel")];
            let (kh, kw, cin, cout) = w.kernel.dim();
            w.kernel = Array4::from_shape_vec((kh, kw, cin, cout), kernel.values.clone())
                .map_err(|e| KernelNetError::InvalidWeights(e.to_string()))?;
            let bias = &self.entries[&format!("{name}/bias")];
            w.bias = Array1::from_vec(bias.values.clone());
        }
        Ok(())
    }

    fn expect(&self, name: &str, shape: &[usize]) -> Result<()> {
        let tensor = self.get(name).ok_or_else(|| KernelNetError::WeightMismatch {
            layer: name.to_string(),
            reason: "missing from weight file".into(),
        })?;
        if tensor.shape != shape {
            return Err(KernelNetError::WeightMismatch {
                layer: name.to_string(),
                reason: format!("expected shape {:?}, found {:?}", shape, tensor.shape),
            });
        }
        Ok(())
    }

    /// Read a weight file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let store = Self::from_bytes(&mmap)?;
        info!(
            path = %path.display(),
            tensors = store.len(),
            "Weights loaded"
        );
        Ok(store)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < WEIGHTS_MAGIC.len() || &buf[..WEIGHTS_MAGIC.len()] != WEIGHTS_MAGIC {
            return Err(KernelNetError::InvalidWeights(
                "Missing PSFNETW1 magic".into(),
            ));
        }
        let mut cursor = Cursor::new(&buf[WEIGHTS_MAGIC.len()..]);
        let count = cursor.read_u32::<LittleEndian>().map_err(truncated)?;

        let mut store = Self::new();
        for _ in 0..count {
            let name_len = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;
            let mut name_bytes = vec![0u8; name_len];
            cursor.read_exact(&mut name_bytes).map_err(truncated)?;
            let name = String::from_utf8(name_bytes)
                .map_err(|_| KernelNetError::InvalidWeights("Layer name is not UTF-8".into()))?;

            let rank = cursor.read_u8().map_err(truncated)? as usize;
            let mut shape = Vec::with_capacity(rank);
            for _ in 0..rank {
                shape.push(cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize);
            }
            let n = shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| KernelNetError::InvalidWeights(format!("'{name}' is too large")))?;
            let remaining = buf.len() - WEIGHTS_MAGIC.len() - cursor.position() as usize;
            if n.saturating_mul(4) > remaining {
                return Err(KernelNetError::InvalidWeights(format!(
                    "File truncated inside '{name}'"
                )));
            }
            let mut values = vec![0f32; n];
            cursor
                .read_f32_into::<LittleEndian>(&mut values)
                .map_err(truncated)?;

            store.insert(name, WeightTensor { shape, values });
        }
        Ok(store)
    }

    /// Write the store to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), tensors = self.len(), "Weights saved");
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(WEIGHTS_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        for (name, tensor) in &self.entries {
            let name_len = u16::try_from(name.len()).map_err(|_| {
                KernelNetError::InvalidWeights(format!("Layer name too long: {name}"))
            })?;
            writer.write_u16::<LittleEndian>(name_len)?;
            writer.write_all(name.as_bytes())?;
            writer.write_u8(tensor.shape.len() as u8)?;
            for &d in &tensor.shape {
                writer.write_u32::<LittleEndian>(d as u32)?;
            }
            for &v in &tensor.values {
                writer.write_f32::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }
}

fn truncated(e: std::io::Error) -> KernelNetError {
    KernelNetError::InvalidWeights(format!("File truncated: {e}"))
}
