use burn::prelude::*;
use std::path::PathBuf;

use crate::device::ExecutionTarget;
use crate::discovery::OutputFormat;
use crate::error::PrepError;
use crate::resize::{ResizeFilter, TargetSize};

#[derive(Config, Debug)]
pub struct PreprocessConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[config(default = 224)]
    pub width: u32,
    #[config(default = 224)]
    pub height: u32,
    /// 1 runs sequentially
    #[config(default = 1)]
    pub workers: usize,
    #[config(default = "ExecutionTarget::Cpu")]
    pub target: ExecutionTarget,
    #[config(default = "ResizeFilter::Bilinear")]
    pub filter: ResizeFilter,
    #[config(default = "OutputFormat::Png")]
    pub format: OutputFormat,
    #[config(default = "vec![String::from(\"jpg\")]")]
    pub extensions: Vec<String>,
    pub limit: Option<usize>,
}

impl PreprocessConfig {
    pub fn target_size(&self) -> TargetSize {
        TargetSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn with_target_size(self, size: TargetSize) -> Self {
        self.with_width(size.width).with_height(size.height)
    }

    /// Checks everything that can be checked without touching the images.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.input_dir.exists() {
            return Err(PrepError::MissingInputDir(self.input_dir.clone()));
        }
        if !self.input_dir.is_dir() {
            return Err(PrepError::NotADirectory(self.input_dir.clone()));
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(PrepError::NotADirectory(self.output_dir.clone()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PrepError::InvalidTargetSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.workers == 0 {
            return Err(PrepError::InvalidWorkers);
        }
        if self.extensions.is_empty() {
            return Err(PrepError::NoExtensions);
        }
        Ok(())
    }

    pub fn load_json(path: &std::path::Path) -> crate::error::Result<Self> {
        Self::load(path).map_err(|e| PrepError::Config(format!("{}: {e:?}", path.display())))
    }
}
