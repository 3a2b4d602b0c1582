use image::GrayImage;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::discovery::OutputFormat;
use crate::error::ItemError;
use crate::resize::{Resizer, TargetSize};

/// Everything a worker needs to process one image.
///
/// Built once per run and shared by reference across workers.
#[derive(Clone)]
pub struct PrepContext {
    pub resizer: Arc<dyn Resizer>,
    pub size: TargetSize,
    pub format: OutputFormat,
}

impl PrepContext {
    pub fn new(resizer: Arc<dyn Resizer>, size: TargetSize, format: OutputFormat) -> Self {
        Self {
            resizer,
            size,
            format,
        }
    }
}

/// `create_dir_all` that treats a directory created by someone else in the
/// meantime as success.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Decode, grayscale and resize.
pub fn load_and_resize(ctx: &PrepContext, source: &Path) -> Result<GrayImage, ItemError> {
    let img = image::open(source).map_err(ItemError::UnreadableSource)?;
    let gray = img.to_luma8();
    ctx.resizer.resize(&gray, ctx.size)
}

/// Processes one image end to end.
pub fn process_image(ctx: &PrepContext, source: &Path, output: &Path) -> Result<(), ItemError> {
    let resized = load_and_resize(ctx, source)?;

    if let Some(parent) = output.parent() {
        ensure_dir(parent).map_err(|source| ItemError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    resized.save(output).map_err(|source| ItemError::Write {
        path: output.to_path_buf(),
        source,
    })
}

/// Like [`process_image`], but logs the failure and reports it as `false`.
pub fn try_process_image(ctx: &PrepContext, source: &Path, output: &Path) -> bool {
    match process_image(ctx, source, output) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{}: {e}", source.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resize::{CpuResizer, ResizeFilter};
    use image::{ColorType, Luma, Rgb, RgbImage};

    fn cpu_context() -> PrepContext {
        PrepContext::new(
            Arc::new(CpuResizer::new(ResizeFilter::Bilinear)),
            TargetSize::default(),
            OutputFormat::Png,
        )
    }

    #[test]
    fn writes_single_channel_at_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("color.jpg");
        RgbImage::from_pixel(640, 480, Rgb([200, 40, 10]))
            .save(&source)
            .unwrap();
        let output = dir.path().join("out/nested/color.png");

        process_image(&cpu_context(), &source, &output).unwrap();

        let written = image::open(&output).unwrap();
        assert_eq!(written.color(), ColorType::L8);
        assert_eq!((written.width(), written.height()), (224, 224));
    }

    #[test]
    fn zero_byte_source_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty.jpg");
        fs::write(&source, b"").unwrap();
        let output = dir.path().join("empty.png");

        let err = process_image(&cpu_context(), &source, &output).unwrap_err();
        assert!(matches!(err, ItemError::UnreadableSource(_)));
        assert!(!output.exists());
        assert!(!try_process_image(&cpu_context(), &source, &output));
    }

    #[test]
    fn corrupt_source_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("corrupt.jpg");
        fs::write(&source, b"\xFF\xD8\xFF\xE0 definitely not a jpeg").unwrap();

        let err = load_and_resize(&cpu_context(), &source).unwrap_err();
        assert!(matches!(err, ItemError::UnreadableSource(_)));
    }

    #[test]
    fn ensure_dir_tolerates_existing_and_racing_creators() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c");
        ensure_dir(&target).unwrap();
        ensure_dir(&target).unwrap();

        let racing = dir.path().join("x/y/z");
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| ensure_dir(&racing))).collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        });
        assert!(racing.is_dir());
    }

    #[test]
    fn ensure_dir_fails_on_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        assert!(ensure_dir(&blocker).is_err());
    }

    #[test]
    fn grayscale_input_keeps_its_level() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flat.png");
        GrayImage::from_pixel(300, 300, Luma([77])).save(&source).unwrap();

        let out = load_and_resize(&cpu_context(), &source).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 77));
    }
}
