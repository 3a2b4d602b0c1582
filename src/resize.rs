use burn::prelude::*;
use burn::tensor::module::{avg_pool2d, interpolate};
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use image::imageops::FilterType;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ItemError;

pub const DEFAULT_SIZE: TargetSize = TargetSize {
    width: 224,
    height: 224,
};

/// Output resolution every image is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl Default for TargetSize {
    fn default() -> Self {
        DEFAULT_SIZE
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Accepts `224x224` or a single side length `224`.
impl FromStr for TargetSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid size {s:?}: {e}"))
        };
        let (width, height) = match s.split_once(['x', 'X']) {
            Some((w, h)) => (parse(w)?, parse(h)?),
            None => {
                let side = parse(s)?;
                (side, side)
            }
        };
        if width == 0 || height == 0 {
            return Err(format!("size must be non-zero, got {s:?}"));
        }
        Ok(Self { width, height })
    }
}

/// Interpolation used for the resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }

    /// Tensor backends have no lanczos kernel; bicubic is the closest.
    pub fn interpolate_mode(self) -> InterpolateMode {
        match self {
            ResizeFilter::Nearest => InterpolateMode::Nearest,
            ResizeFilter::Bilinear => InterpolateMode::Bilinear,
            ResizeFilter::Bicubic | ResizeFilter::Lanczos3 => InterpolateMode::Bicubic,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "linear" | "triangle" => Ok(Self::Bilinear),
            "bicubic" | "cubic" => Ok(Self::Bicubic),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(format!("unknown filter {other:?}")),
        }
    }
}

/// Resize-and-normalize of a grayscale image, independent of where it runs.
///
/// Implementations are shared by every worker of a batch, so they must not
/// hold per-call mutable state.
pub trait Resizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn resize(&self, image: &GrayImage, size: TargetSize) -> Result<GrayImage, ItemError>;
}

pub struct CpuResizer {
    filter: ResizeFilter,
}

impl CpuResizer {
    pub fn new(filter: ResizeFilter) -> Self {
        Self { filter }
    }
}

impl Resizer for CpuResizer {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resize(&self, image: &GrayImage, size: TargetSize) -> Result<GrayImage, ItemError> {
        Ok(image::imageops::resize(
            image,
            size.width,
            size.height,
            self.filter.filter_type(),
        ))
    }
}

/// Runs the resize as a tensor interpolation on a burn backend.
///
/// Pixels go to the device as `[1, 1, H, W]` floats in [0, 1] and come back
/// rounded to 8-bit. When shrinking, the input is first average-pooled by the
/// whole-number scale factor.
pub struct TensorResizer<B: Backend> {
    device: B::Device,
    filter: ResizeFilter,
}

impl<B: Backend> TensorResizer<B> {
    pub fn new(device: B::Device, filter: ResizeFilter) -> Self {
        Self { device, filter }
    }
}

impl<B: Backend> Resizer for TensorResizer<B> {
    fn name(&self) -> &'static str {
        "tensor"
    }

    fn resize(&self, image: &GrayImage, size: TargetSize) -> Result<GrayImage, ItemError> {
        let (width, height) = image.dimensions();
        let pixels: Vec<f32> = image.as_raw().iter().map(|&p| p as f32).collect();
        let data = TensorData::new(pixels, Shape::new([1, 1, height as usize, width as usize]));

        let input = Tensor::<B, 4>::from_data(data.convert::<B::FloatElem>(), &self.device) / 255;
        let factor_x = (width / size.width).max(1) as usize;
        let factor_y = (height / size.height).max(1) as usize;
        let input = if self.filter != ResizeFilter::Nearest && (factor_x > 1 || factor_y > 1) {
            let kernel = [factor_y, factor_x];
            avg_pool2d(input, kernel, kernel, [0, 0], true)
        } else {
            input
        };
        let output = interpolate(
            input,
            [size.height as usize, size.width as usize],
            InterpolateOptions::new(self.filter.interpolate_mode()),
        );
        // bicubic overshoots at hard edges
        let output = output.clamp(0.0, 1.0) * 255;

        let values = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ItemError::Accelerator(format!("{e:?}")))?;
        let bytes: Vec<u8> = values
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();

        GrayImage::from_raw(size.width, size.height, bytes).ok_or_else(|| {
            ItemError::Accelerator(format!("tensor output does not match {size}"))
        })
    }
}
