//! Execution target selection and the GPU availability check.
//!
//! The accelerator is checked once at startup. A missing adapter is a
//! configuration error, never a per-image one.

use burn::backend::wgpu::WgpuDevice;
use burn::backend::Wgpu;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PrepError, Result};
use crate::resize::{CpuResizer, ResizeFilter, Resizer, TensorResizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    Cpu,
    /// wgpu through burn (Vulkan, Metal or DX12)
    Accelerator,
}

impl FromStr for ExecutionTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "accelerator" | "gpu" | "wgpu" => Ok(Self::Accelerator),
            other => Err(format!("unknown execution target {other:?}")),
        }
    }
}

fn request_adapter() -> Option<wgpu::Adapter> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    pollster::block_on(async {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    })
}

/// Runs a tiny tensor round trip so burn picks its adapter now.
///
/// burn initializes the device lazily and panics when its graphics API has no
/// adapter, which may be the case even when another wgpu backend has one.
fn warm_up(device: &WgpuDevice) -> bool {
    let device = device.clone();
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        Tensor::<Wgpu, 1>::zeros([1], &device).into_data();
    }))
    .is_ok()
}

/// Check if burn's wgpu backend can run on this system.
pub fn is_accelerator_available() -> bool {
    request_adapter().is_some() && warm_up(&WgpuDevice::default())
}

/// Name, type and backend of the adapter that would be used.
pub fn accelerator_info() -> Option<String> {
    request_adapter().map(|adapter| {
        let info = adapter.get_info();
        format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend)
    })
}

/// Builds the resizer for `target`. Fails fast when the GPU is requested but absent.
pub fn build_resizer(target: ExecutionTarget, filter: ResizeFilter) -> Result<Arc<dyn Resizer>> {
    let resizer: Arc<dyn Resizer> = match target {
        ExecutionTarget::Cpu => Arc::new(CpuResizer::new(filter)),
        ExecutionTarget::Accelerator => {
            let info = accelerator_info().ok_or(PrepError::AcceleratorUnavailable)?;
            let device = WgpuDevice::default();
            if !warm_up(&device) {
                return Err(PrepError::AcceleratorUnavailable);
            }
            tracing::info!("using GPU adapter {info}");
            Arc::new(TensorResizer::<Wgpu>::new(device, filter))
        }
    };
    Ok(resizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn cpu_target_always_builds() {
        let resizer = build_resizer(ExecutionTarget::Cpu, ResizeFilter::Bilinear).unwrap();
        assert_eq!(resizer.name(), "cpu");
    }

    #[test]
    fn accelerator_build_matches_availability() {
        let built = build_resizer(ExecutionTarget::Accelerator, ResizeFilter::Bilinear);
        if is_accelerator_available() {
            assert_eq!(built.unwrap().name(), "tensor");
        } else {
            assert!(matches!(built, Err(PrepError::AcceleratorUnavailable)));
        }
    }

    #[test]
    fn built_accelerator_resizes_without_panicking() {
        let Ok(resizer) = build_resizer(ExecutionTarget::Accelerator, ResizeFilter::Bilinear) else {
            return;
        };
        let image = image::GrayImage::from_pixel(64, 64, image::Luma([90]));
        let size = crate::resize::TargetSize {
            width: 16,
            height: 16,
        };
        let out = std::panic::catch_unwind(AssertUnwindSafe(|| resizer.resize(&image, size)))
            .expect("device was warmed up at build time")
            .unwrap();
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn parses_targets() {
        assert_eq!("GPU".parse::<ExecutionTarget>(), Ok(ExecutionTarget::Accelerator));
        assert_eq!("cpu".parse::<ExecutionTarget>(), Ok(ExecutionTarget::Cpu));
        assert!("tpu".parse::<ExecutionTarget>().is_err());
    }
}
