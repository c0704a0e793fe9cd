use ndarray::Array3;
use rand::Rng;
use tracing::debug;

use crate::config::KernelNetConfig;
use crate::consts::PYRAMID_STRIDE;
use crate::error::{KernelNetError, Result};
use crate::layers::{Conv2d, ConvTranspose2d, ConvWeights, Padding};
use crate::ops::{concat_channels, crop_center};

/// Merges the fused map of the coarser levels into pyramid level `level`.
#[derive(Clone, Debug)]
pub struct FusionStage {
    pub level: usize,
    pub upsample: ConvTranspose2d,
    pub fuse: Conv2d,
}

impl FusionStage {
    fn build<R: Rng>(config: &KernelNetConfig, level: usize, rng: &mut R) -> Self {
        let n = config.n_upsampling_features;
        let u = config.upsample_filter_size;
        let f = config.filter_size_after_cc;
        Self {
            level,
            upsample: ConvTranspose2d::new(
                ConvWeights::glorot((u, u), n, n, rng),
                PYRAMID_STRIDE,
                config.activation,
            ),
            // Input is [level map, upsampled coarse map].
            fuse: Conv2d::new(
                ConvWeights::glorot((f, f), 2 * n, n, rng),
                1,
                Padding::Same,
                config.activation,
            ),
        }
    }

    pub fn forward(&self, coarse: &Array3<f32>, level_map: &Array3<f32>) -> Result<Array3<f32>> {
        let up = self.upsample.forward(coarse)?;
        let (th, tw, _) = level_map.dim();
        let cropped = crop_center(&up, th, tw)?;
        let merged = concat_channels(level_map, &cropped)?;
        self.fuse.forward(&merged)
    }
}

/// Top-down fusion of the per-level correlation maps.
///
/// Stages are ordered from the second-coarsest level down to level 0.
#[derive(Clone, Debug)]
pub struct Decoder {
    pub stages: Vec<FusionStage>,
}

impl Decoder {
    pub fn build<R: Rng>(config: &KernelNetConfig, rng: &mut R) -> Self {
        let stages = (0..config.n_levels.saturating_sub(1))
            .rev()
            .map(|level| FusionStage::build(config, level, rng))
            .collect();
        Self { stages }
    }

    /// Fuse `maps` (finest first, one per pyramid level) into one map with
    /// the spatial size of level 0.
    pub fn forward(&self, maps: Vec<Array3<f32>>) -> Result<Array3<f32>> {
        if maps.len() != self.stages.len() + 1 {
            return Err(KernelNetError::InvalidShape(format!(
                "Decoder expects {} level maps, got {}",
                self.stages.len() + 1,
                maps.len()
            )));
        }
        let mut maps = maps;
        let mut fused = maps.pop().ok_or_else(|| {
            KernelNetError::InvalidShape("Decoder received no level maps".into())
        })?;
        for stage in &self.stages {
            fused = stage.forward(&fused, &maps[stage.level])?;
            debug!(level = stage.level, fused = ?fused.dim(), "Fusion stage done");
        }
        Ok(fused)
    }

    pub fn named_weights(&self) -> Vec<(String, &ConvWeights)> {
        self.stages
            .iter()
            .flat_map(|s| {
                [
                    (format!("fusion{}/upsample", s.level), &s.upsample.weights),
                    (format!("fusion{}/fuse", s.level), &s.fuse.weights),
                ]
            })
            .collect()
    }

    pub fn named_weights_mut(&mut self) -> Vec<(String, &mut ConvWeights)> {
        self.stages
            .iter_mut()
            .flat_map(|s| {
                [
                    (format!("fusion{}/upsample", s.level), &mut s.upsample.weights),
                    (format!("fusion{}/fuse", s.level), &mut s.fuse.weights),
                ]
            })
            .collect()
    }
}
