use super::{EncodeOptions, ImageCodec, JpegOptions, PngOptions, ResizeSpec, WebPOptions};
use crate::models::ImageMetadata;
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

/// Codec backed by `image` for decode/resize, `mozjpeg` for JPEG,
/// `imagequant` + `oxipng` for PNG, and libwebp for WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_jpeg(image: &DynamicImage, options: &JpegOptions) -> Result<Vec<u8>> {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let pixels = rgb.into_raw();
        let options = *options;

        // libjpeg reports fatal errors by unwinding
        let encoded = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            if !options.mozjpeg {
                comp.set_fastest_defaults();
            }
            comp.set_size(width, height);
            comp.set_quality(options.quality as f32);
            if options.progressive {
                comp.set_progressive_mode();
            }
            if options.mozjpeg {
                comp.set_optimize_coding(true);
                comp.set_optimize_scans(true);
            }

            let mut started = comp.start_compress(Vec::new())?;
            started.write_scanlines(&pixels)?;
            started.finish()
        }))
        .map_err(|_| Error::Codec("JPEG encoder aborted".to_string()))?;

        encoded.map_err(|e| Error::Codec(format!("JPEG encode failed: {}", e)))
    }

    fn encode_png(image: &DynamicImage, options: &PngOptions) -> Result<Vec<u8>> {
        let quantized = quantize(&image.to_rgba8(), options.quality)?;

        let mut buffer = Cursor::new(Vec::new());
        quantized.write_to(&mut buffer, ImageFormat::Png)?;

        let mut png_options = oxipng::Options::from_preset(oxipng_preset(options.compression_level));
        png_options.strip = oxipng::StripChunks::Safe;
        png_options.interlace = Some(if options.progressive {
            oxipng::Interlacing::Adam7
        } else {
            oxipng::Interlacing::None
        });

        oxipng::optimize_from_memory(buffer.get_ref(), &png_options)
            .map_err(|e| Error::Codec(format!("PNG optimization failed: {}", e)))
    }

    fn encode_webp(image: &DynamicImage, options: &WebPOptions) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());

        let config = webp_config(options)?;

        let encoded = if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            webp::Encoder::from_rgba(rgba.as_raw(), width, height)
                .encode_advanced(&config)
                .map(|memory| memory.to_vec())
        } else {
            let rgb = image.to_rgb8();
            webp::Encoder::from_rgb(rgb.as_raw(), width, height)
                .encode_advanced(&config)
                .map(|memory| memory.to_vec())
        };

        encoded.map_err(|e| Error::Codec(format!("WebP encode failed: {:?}", e)))
    }
}

/// Lossy libwebp settings; `effort` maps onto the encoder's `method`.
fn webp_config(options: &WebPOptions) -> Result<webp::WebPConfig> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| Error::Codec("WebP encoder config could not be initialized".to_string()))?;
    config.lossless = 0;
    config.quality = options.quality as f32;
    config.method = options.effort as i32;
    Ok(config)
}

impl ImageCodec for NativeCodec {
    type Handle = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::Codec(format!("Could not read image header: {}", e)))?;
        reader.no_limits();
        Ok(reader.decode()?)
    }

    fn metadata(&self, handle: &DynamicImage) -> ImageMetadata {
        ImageMetadata {
            width: handle.width(),
            height: handle.height(),
        }
    }

    fn resize(&self, handle: DynamicImage, spec: ResizeSpec) -> Result<DynamicImage> {
        let source = self.metadata(&handle);
        let (width, height) = spec.target_dimensions(source);
        if (width, height) == (source.width, source.height) {
            return Ok(handle);
        }
        Ok(handle.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode(&self, handle: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>> {
        match options {
            EncodeOptions::Jpeg(jpeg) => Self::encode_jpeg(handle, jpeg),
            EncodeOptions::Png(png) => Self::encode_png(handle, png),
            EncodeOptions::WebP(webp) => Self::encode_webp(handle, webp),
        }
    }
}

/// Map a zlib-style 0-9 level onto oxipng's 0-6 presets.
fn oxipng_preset(compression_level: u8) -> u8 {
    (compression_level.min(9) as u16 * 6 / 9) as u8
}

/// Reduce to a palette that meets `quality`, returned as RGBA so the PNG
/// writer can re-derive the palette during optimization.
fn quantize(rgba: &RgbaImage, quality: u8) -> Result<RgbaImage> {
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);
    let pixels: Vec<imagequant::RGBA> = rgba
        .pixels()
        .map(|p| imagequant::RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let quant_err = |e: imagequant::Error| Error::Codec(format!("PNG quantization failed: {}", e));

    let mut attributes = imagequant::new();
    attributes.set_quality(0, quality).map_err(quant_err)?;
    let mut image = attributes
        .new_image(pixels, width, height, 0.0)
        .map_err(quant_err)?;
    let mut quantized = attributes.quantize(&mut image).map_err(quant_err)?;
    quantized.set_dithering_level(1.0).map_err(quant_err)?;
    let (palette, indices) = quantized.remapped(&mut image).map_err(quant_err)?;

    let mut expanded = Vec::with_capacity(width * height * 4);
    for index in indices {
        let color = palette[index as usize];
        expanded.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    RgbaImage::from_raw(rgba.width(), rgba.height(), expanded)
        .ok_or_else(|| Error::Invariant("Quantized buffer does not match image size".to_string()))
}
