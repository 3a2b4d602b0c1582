use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::has_image_extension;
use crate::error::{PrepError, Result};

/// Grayscale mean and standard deviation of a processed dataset, in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f32,
    pub std: f32,
    pub images: usize,
    pub pixels: u64,
}

fn load_gray(path: &Path) -> Option<GrayImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_luma8()),
        Err(e) => {
            tracing::warn!("skipping {}: {e}", path.display());
            None
        }
    }
}

/// Lists the images directly inside `dir` (the flat output of a batch run).
pub fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PrepError::NotADirectory(dir.to_path_buf()));
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path, extensions))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Two passes over the images: per-image sums for the mean, then squared
/// differences for the standard deviation.
pub fn compute_stats(paths: &[PathBuf]) -> Result<NormalizationStats> {
    let sums: Vec<(f64, u64)> = paths
        .par_iter()
        .filter_map(|path| load_gray(path))
        .map(|img| {
            let sum = img.pixels().map(|p| p.0[0] as f64 / 255.0).sum::<f64>();
            (sum, img.width() as u64 * img.height() as u64)
        })
        .collect();

    let images = sums.len();
    let pixels: u64 = sums.iter().map(|(_, n)| n).sum();
    if pixels == 0 {
        return Err(PrepError::NoImages);
    }
    let mean = sums.iter().map(|(s, _)| s).sum::<f64>() / pixels as f64;

    tracing::info!("calculated mean over {images} images, computing standard deviation...");

    let squared_diff: f64 = paths
        .par_iter()
        .filter_map(|path| load_gray(path))
        .map(|img| {
            img.pixels()
                .map(|p| {
                    let diff = p.0[0] as f64 / 255.0 - mean;
                    diff * diff
                })
                .sum::<f64>()
        })
        .sum();

    Ok(NormalizationStats {
        mean: mean as f32,
        std: (squared_diff / pixels as f64).sqrt() as f32,
        images,
        pixels,
    })
}
