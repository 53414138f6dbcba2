//! Image codec collaborator
//!
//! Decoding, resizing, and encoding sit behind [`ImageCodec`] so the
//! optimizer's decision logic can be exercised without real pixel work.
//! [`NativeCodec`] is the production implementation; [`MockCodec`] records
//! what it was asked to do.

pub mod mock;
pub mod native;

pub use mock::MockCodec;
pub use native::NativeCodec;

use crate::models::{ImageMetadata, OutputFormat};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    pub quality: u8,
    pub progressive: bool,
    /// Use mozjpeg's trellis/scan optimizations instead of libjpeg defaults.
    pub mozjpeg: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngOptions {
    /// Palette quantization target.
    pub quality: u8,
    /// zlib-style 0-9 scale.
    pub compression_level: u8,
    /// Adam7 interlacing.
    pub progressive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebPOptions {
    pub quality: u8,
    /// 0 (fast) to 6 (slowest, smallest).
    pub effort: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOptions {
    Jpeg(JpegOptions),
    Png(PngOptions),
    WebP(WebPOptions),
}

impl EncodeOptions {
    pub fn format(&self) -> OutputFormat {
        match self {
            EncodeOptions::Jpeg(_) => OutputFormat::Jpeg,
            EncodeOptions::Png(_) => OutputFormat::Png,
            EncodeOptions::WebP(_) => OutputFormat::WebP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to fit within the box, preserving aspect ratio.
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    /// `None` lets the codec derive height from the aspect ratio.
    pub height: Option<u32>,
    pub without_enlargement: bool,
    pub fit: Fit,
}

impl ResizeSpec {
    pub fn to_width(width: u32) -> Self {
        Self {
            width,
            height: None,
            without_enlargement: true,
            fit: Fit::Inside,
        }
    }

    /// Final dimensions for a source image under this spec.
    pub fn target_dimensions(&self, source: ImageMetadata) -> (u32, u32) {
        if source.width == 0 || source.height == 0 {
            return (source.width, source.height);
        }

        let scale_w = self.width as f64 / source.width as f64;
        let scale = match self.height {
            Some(h) => scale_w.min(h as f64 / source.height as f64),
            None => scale_w,
        };
        let scale = if self.without_enlargement {
            scale.min(1.0)
        } else {
            scale
        };

        let width = (source.width as f64 * scale).round() as u32;
        let height = (source.height as f64 * scale).round() as u32;
        (width.max(1), height.max(1))
    }
}

/// Decode/resize/encode contract consumed by the optimizer.
///
/// Implementations run on a blocking thread; handles are owned values and
/// are released when dropped.
pub trait ImageCodec: Send + Sync {
    type Handle: Send;

    /// Decode with no pixel-count ceiling.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Handle>;

    fn metadata(&self, handle: &Self::Handle) -> ImageMetadata;

    fn resize(&self, handle: Self::Handle, spec: ResizeSpec) -> Result<Self::Handle>;

    fn encode(&self, handle: &Self::Handle, options: &EncodeOptions) -> Result<Vec<u8>>;
}
