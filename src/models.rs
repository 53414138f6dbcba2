//! Data models and structures
//!
//! Defines the request and result records that flow through the optimizer,
//! plus the format dispatch used to pick per-format encoder settings.

use crate::codec::{EncodeOptions, JpegOptions, PngOptions, WebPOptions};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_MAX_WIDTH: u32 = 1200;
pub const PNG_COMPRESSION_LEVEL: u8 = 9;
pub const WEBP_EFFORT: u8 = 6;

/// A format the optimizer can actually emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing, used where an unsupported format must be rejected up front.
impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(Error::Validation(format!("Unsupported format: {}", other))),
        }
    }
}

/// The caller's format choice after lenient normalization.
///
/// `Fallback` covers a missing or unrecognized format string. It encodes
/// JPEG like the explicit `Jpeg` arm but without the mozjpeg encoder path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Jpeg,
    Png,
    WebP,
    Fallback,
}

impl FormatChoice {
    /// Map a raw form value onto a choice; never fails.
    pub fn from_field(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("jpeg") => FormatChoice::Jpeg,
            Some("png") => FormatChoice::Png,
            Some("webp") => FormatChoice::WebP,
            _ => FormatChoice::Fallback,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        match self {
            FormatChoice::Jpeg | FormatChoice::Fallback => OutputFormat::Jpeg,
            FormatChoice::Png => OutputFormat::Png,
            FormatChoice::WebP => OutputFormat::WebP,
        }
    }

    pub fn encode_options(&self, quality: u8, progressive: bool) -> EncodeOptions {
        match self {
            FormatChoice::Jpeg => EncodeOptions::Jpeg(JpegOptions {
                quality,
                progressive,
                mozjpeg: true,
            }),
            FormatChoice::Png => EncodeOptions::Png(PngOptions {
                quality,
                compression_level: PNG_COMPRESSION_LEVEL,
                progressive,
            }),
            FormatChoice::WebP => EncodeOptions::WebP(WebPOptions {
                quality,
                effort: WEBP_EFFORT,
            }),
            FormatChoice::Fallback => EncodeOptions::Jpeg(JpegOptions {
                quality,
                progressive,
                mozjpeg: false,
            }),
        }
    }
}

impl From<OutputFormat> for FormatChoice {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Jpeg => FormatChoice::Jpeg,
            OutputFormat::Png => FormatChoice::Png,
            OutputFormat::WebP => FormatChoice::WebP,
        }
    }
}

/// Form fields exactly as they arrive from an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOptimizeParams {
    pub quality: Option<String>,
    pub max_width: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub image_bytes: Vec<u8>,
    pub quality: u8,
    /// `None` disables resizing entirely.
    pub max_width: Option<u32>,
    pub format: FormatChoice,
    pub progressive: bool,
}

impl OptimizationRequest {
    pub fn new(image_bytes: Vec<u8>) -> Self {
        Self {
            image_bytes,
            quality: DEFAULT_QUALITY,
            max_width: Some(DEFAULT_MAX_WIDTH),
            format: FormatChoice::Jpeg,
            progressive: true,
        }
    }

    /// Build a request from untyped form fields, applying every default.
    pub fn from_form(image_bytes: Vec<u8>, params: &RawOptimizeParams) -> Self {
        let quality = params
            .quality
            .as_deref()
            .and_then(parse_leading_int)
            .map(clamp_quality)
            .unwrap_or(DEFAULT_QUALITY);

        let max_width = params
            .max_width
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|w| *w > 0)
            .map(|w| w.min(u32::MAX as i64) as u32)
            .unwrap_or(DEFAULT_MAX_WIDTH);

        Self {
            image_bytes,
            quality,
            max_width: Some(max_width),
            format: FormatChoice::from_field(params.format.as_deref()),
            progressive: true,
        }
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    pub fn with_max_width(mut self, max_width: Option<u32>) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn with_format(mut self, format: FormatChoice) -> Self {
        self.format = format;
        self
    }

    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_bytes.is_empty() {
            return Err(Error::Validation("No image data provided".to_string()));
        }
        if self.max_width == Some(0) {
            return Err(Error::Validation(
                "maxWidth must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Validation(format!(
                "quality {} is outside 1-100",
                self.quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub output_bytes: Vec<u8>,
    pub original_size: usize,
    pub optimized_size: usize,
    pub reduction_percent: f64,
    pub format: OutputFormat,
    pub source: ImageMetadata,
    pub output: ImageMetadata,
}

fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Integer prefix of a form value: `" 90abc"` is 90, `"abc"` is nothing.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Saturate rather than fail on absurdly long digit runs.
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(quality: Option<&str>, max_width: Option<&str>, format: Option<&str>) -> RawOptimizeParams {
        RawOptimizeParams {
            quality: quality.map(str::to_string),
            max_width: max_width.map(str::to_string),
            format: format.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let request = OptimizationRequest::from_form(vec![1], &RawOptimizeParams::default());
        assert_eq!(request.quality, 85);
        assert_eq!(request.max_width, Some(1200));
        assert_eq!(request.format, FormatChoice::Fallback);
        assert!(request.progressive);
    }

    #[test]
    fn test_non_numeric_fields_use_defaults() {
        let request = OptimizationRequest::from_form(vec![1], &params(Some("high"), Some("wide"), None));
        assert_eq!(request.quality, 85);
        assert_eq!(request.max_width, Some(1200));
    }

    #[test]
    fn test_quality_is_clamped() {
        let low = OptimizationRequest::from_form(vec![1], &params(Some("-4"), None, None));
        let high = OptimizationRequest::from_form(vec![1], &params(Some("250"), None, None));
        let zero = OptimizationRequest::from_form(vec![1], &params(Some("0"), None, None));
        assert_eq!(low.quality, 1);
        assert_eq!(high.quality, 100);
        assert_eq!(zero.quality, 1);
    }

    #[test]
    fn test_leading_integer_prefix_is_used() {
        let request = OptimizationRequest::from_form(vec![1], &params(Some(" 72%"), Some("800px"), None));
        assert_eq!(request.quality, 72);
        assert_eq!(request.max_width, Some(800));
    }

    #[test]
    fn test_non_positive_max_width_falls_back() {
        let zero = OptimizationRequest::from_form(vec![1], &params(None, Some("0"), None));
        let negative = OptimizationRequest::from_form(vec![1], &params(None, Some("-300"), None));
        assert_eq!(zero.max_width, Some(1200));
        assert_eq!(negative.max_width, Some(1200));
    }

    #[test]
    fn test_format_choice_from_field() {
        assert_eq!(FormatChoice::from_field(Some("jpeg")), FormatChoice::Jpeg);
        assert_eq!(FormatChoice::from_field(Some("PNG")), FormatChoice::Png);
        assert_eq!(FormatChoice::from_field(Some(" webp ")), FormatChoice::WebP);
        assert_eq!(FormatChoice::from_field(Some("gif")), FormatChoice::Fallback);
        assert_eq!(FormatChoice::from_field(Some("jpg")), FormatChoice::Fallback);
        assert_eq!(FormatChoice::from_field(Some("")), FormatChoice::Fallback);
        assert_eq!(FormatChoice::from_field(None), FormatChoice::Fallback);
    }

    #[test]
    fn test_encode_options_per_arm() {
        assert_eq!(
            FormatChoice::Jpeg.encode_options(85, true),
            EncodeOptions::Jpeg(JpegOptions {
                quality: 85,
                progressive: true,
                mozjpeg: true
            })
        );
        assert_eq!(
            FormatChoice::Png.encode_options(70, true),
            EncodeOptions::Png(PngOptions {
                quality: 70,
                compression_level: 9,
                progressive: true
            })
        );
        assert_eq!(
            FormatChoice::WebP.encode_options(60, true),
            EncodeOptions::WebP(WebPOptions {
                quality: 60,
                effort: 6
            })
        );
        assert_eq!(
            FormatChoice::Fallback.encode_options(85, true),
            EncodeOptions::Jpeg(JpegOptions {
                quality: 85,
                progressive: true,
                mozjpeg: false
            })
        );
    }

    #[test]
    fn test_fallback_reports_jpeg() {
        assert_eq!(FormatChoice::Fallback.output_format(), OutputFormat::Jpeg);
    }

    #[test]
    fn test_output_format_strict_parse() {
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::WebP);
        let err = "tiff".parse::<OutputFormat>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("tiff"));
    }

    #[test]
    fn test_validate_rejects_empty_bytes() {
        let err = OptimizationRequest::new(Vec::new()).validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_rejects_zero_max_width() {
        let request = OptimizationRequest::new(vec![1]).with_max_width(Some(0));
        assert!(request.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_output_format_serialization() {
        let json = serde_json::to_string(&OutputFormat::WebP).unwrap();
        assert_eq!(json, "\"webp\"");
    }
}
