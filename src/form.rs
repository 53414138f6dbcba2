//! Multipart upload parsing shared by the HTTP server and the serverless
//! handler.
//!
//! Fields: `image` (the file), and the text fields `quality`, `maxWidth`,
//! `format`. Repeated text fields keep their first value.

use crate::models::RawOptimizeParams;
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use thiserror::Error;

pub const IMAGE_FIELD: &str = "image";
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Cap for each non-file field (`quality`, `maxWidth`, `format`, unknown names).
pub const TEXT_FIELD_LIMIT: u64 = 1024 * 1024;

/// Room for part headers and text fields on top of the image limit.
pub const FORM_OVERHEAD: u64 = 64 * 1024;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Content-Type must be multipart/form-data with a boundary")]
    Boundary,

    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("Malformed multipart body: {0}")]
    Multipart(multer::Error),

    #[error("Malformed request body: {0}")]
    Body(String),
}

impl From<multer::Error> for FormError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::FieldSizeExceeded { limit, .. }
            | multer::Error::StreamSizeExceeded { limit } => FormError::TooLarge { limit },
            other => FormError::Multipart(other),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn has_accepted_type(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ACCEPTED_MIME_TYPES.contains(&ct.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptimizeForm {
    pub image: Option<UploadedImage>,
    pub params: RawOptimizeParams,
}

pub fn parse_boundary(content_type: Option<&str>) -> Result<String, FormError> {
    let content_type = content_type.ok_or(FormError::Boundary)?;
    multer::parse_boundary(content_type).map_err(|_| FormError::Boundary)
}

/// Build a multipart reader.
///
/// `max_image_bytes` caps the `image` field and, with [`FORM_OVERHEAD`], the
/// whole body. Other fields never exceed [`TEXT_FIELD_LIMIT`].
pub fn multipart<S, O, E>(
    body: S,
    boundary: String,
    max_image_bytes: Option<u64>,
) -> multer::Multipart<'static>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let mut limits = multer::SizeLimit::new().per_field(TEXT_FIELD_LIMIT);
    limits = match max_image_bytes {
        Some(max) => limits
            .for_field(IMAGE_FIELD, max)
            .whole_stream(max.saturating_add(FORM_OVERHEAD)),
        None => limits.for_field(IMAGE_FIELD, u64::MAX),
    };
    let constraints = multer::Constraints::new().size_limit(limits);
    multer::Multipart::with_constraints(body, boundary, constraints)
}

/// Multipart reader over a body that is already fully in memory.
pub fn multipart_from_bytes(
    body: Vec<u8>,
    boundary: String,
    max_image_bytes: Option<u64>,
) -> multer::Multipart<'static> {
    let body = stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(body)) });
    multipart(body, boundary, max_image_bytes)
}

pub async fn read_form(mut multipart: multer::Multipart<'_>) -> Result<OptimizeForm, FormError> {
    let mut form = OptimizeForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                if form.image.is_none() {
                    form.image = Some(UploadedImage {
                        bytes: bytes.to_vec(),
                        content_type,
                        file_name,
                    });
                }
            }
            Some("quality") => set_once(&mut form.params.quality, field.text().await?),
            Some("maxWidth") => set_once(&mut form.params.max_width, field.text().await?),
            Some("format") => set_once(&mut form.params.format, field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}
