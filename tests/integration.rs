use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use image_optimizer::{
    batch::{run_batch, FileOutcome},
    codec::NativeCodec,
    config::BatchConfig,
    models::{FormatChoice, OptimizationRequest, OutputFormat, RawOptimizeParams},
    optimizer::{ImageOptimizer, Optimizer},
    serverless::ServerlessHandler,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::io::Cursor;
use std::sync::Arc;

fn photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let noise = ((x * 31 + y * 17) % 23) as u8;
        image::Rgb([
            ((x * 255) / width) as u8 ^ noise,
            ((y * 255) / height) as u8,
            (((x + y) * 3) % 256) as u8,
        ])
    })
}

fn jpeg_bytes(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(img)
        .unwrap();
    bytes
}

fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

#[tokio::test]
async fn test_wide_jpeg_is_resized_and_smaller() {
    let input = jpeg_bytes(&photo(2000, 1000), 100);
    let optimizer = Optimizer::new(NativeCodec::new());

    let result = optimizer
        .optimize(
            OptimizationRequest::new(input.clone())
                .with_quality(85)
                .with_max_width(Some(1200))
                .with_format(FormatChoice::Jpeg),
        )
        .await
        .unwrap();

    let decoded = image::load_from_memory(&result.output_bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1200, 600));
    assert_eq!(result.original_size, input.len());
    assert!(result.optimized_size < result.original_size);
    assert!(result.reduction_percent > 0.0);
}

#[tokio::test]
async fn test_narrow_png_keeps_its_width() {
    let input = png_bytes(&photo(800, 600));
    let optimizer = Optimizer::new(NativeCodec::new());

    let result = optimizer
        .optimize(OptimizationRequest::from_form(
            input,
            &RawOptimizeParams::default(),
        ))
        .await
        .unwrap();

    let decoded = image::load_from_memory(&result.output_bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));
    assert_eq!(result.format, OutputFormat::Jpeg);
}

#[tokio::test]
async fn test_output_matches_requested_format() {
    let input = png_bytes(&photo(120, 80));
    let optimizer = Optimizer::new(NativeCodec::new());

    for (format, expected) in [
        (OutputFormat::Jpeg, ImageFormat::Jpeg),
        (OutputFormat::Png, ImageFormat::Png),
        (OutputFormat::WebP, ImageFormat::WebP),
    ] {
        let result = optimizer
            .optimize(OptimizationRequest::new(input.clone()).with_format(format.into()))
            .await
            .unwrap();
        assert_eq!(image::guess_format(&result.output_bytes).unwrap(), expected);
        assert_eq!(result.format, format);
    }
}

#[tokio::test]
async fn test_corrupt_input_is_codec_error() {
    let mut input = jpeg_bytes(&photo(64, 64), 90);
    input.truncate(input.len() / 4);
    let optimizer = Optimizer::new(NativeCodec::new());

    let err = optimizer
        .optimize(OptimizationRequest::new(input))
        .await
        .unwrap_err();
    assert!(err.is_codec());
}

#[tokio::test]
async fn test_batch_with_one_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = BatchConfig {
        input_dir: dir.path().join("input"),
        output_dir: dir.path().join("output"),
        backup_dir: dir.path().join("backup"),
        ..Default::default()
    };
    fs::create_dir_all(&config.input_dir).unwrap();
    fs::write(
        config.input_dir.join("a-wide.jpg"),
        jpeg_bytes(&photo(1600, 900), 100),
    )
    .unwrap();
    fs::write(config.input_dir.join("b-small.png"), png_bytes(&photo(300, 200))).unwrap();
    fs::write(config.input_dir.join("c-broken.jpg"), b"\xFF\xD8\xFF\xE0 not really").unwrap();

    let optimizer = Optimizer::new(NativeCodec::new());
    let summary = run_batch(&optimizer, &config).await.unwrap();

    assert_eq!(summary.successful(), 2);
    assert_eq!(summary.failed(), 1);

    let (original, optimized): (u64, u64) = summary
        .outcomes
        .iter()
        .filter_map(|o| match o {
            FileOutcome::Optimized {
                original_size,
                optimized_size,
                ..
            } => Some((*original_size, *optimized_size)),
            FileOutcome::Failed { .. } => None,
        })
        .fold((0, 0), |(a, b), (o, p)| (a + o, b + p));
    assert_eq!(summary.total_original(), original);
    assert_eq!(summary.total_optimized(), optimized);
    assert!(summary.total_reduction().is_some());

    let wide = image::open(config.output_dir.join("a-wide-optimized.jpeg")).unwrap();
    assert_eq!(wide.width(), 1200);
    assert!(config.output_dir.join("b-small-optimized.jpeg").is_file());
    assert!(!config.output_dir.join("c-broken-optimized.jpeg").exists());
    assert!(config.backup_dir.join("a-wide-original.jpg").is_file());
    assert!(config.backup_dir.join("c-broken-original.jpg").is_file());
}

#[tokio::test]
async fn test_serverless_round_trip() {
    let input = png_bytes(&photo(300, 200));
    let boundary = "ROUND-TRIP";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\nwebp\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"maxWidth\"\r\n\r\n150\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"in.png\"\r\n\
         Content-Type: image/png\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend_from_slice(&input);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let handler = ServerlessHandler::new(Arc::new(Optimizer::new(NativeCodec::new())));
    let event = json!({
        "httpMethod": "POST",
        "headers": { "content-type": format!("multipart/form-data; boundary={}", boundary) },
        "body": general_purpose::STANDARD.encode(&body),
        "isBase64Encoded": true
    });

    let response = handler.handle_event(&event).await;

    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["headers"]["Content-Type"], "image/webp");
    let stats: Value =
        serde_json::from_str(response["headers"]["X-Image-Stats"].as_str().unwrap()).unwrap();
    assert!(stats["originalSize"].as_str().unwrap().ends_with("KB"));

    let output = general_purpose::STANDARD
        .decode(response["body"].as_str().unwrap())
        .unwrap();
    let decoded = image::load_from_memory(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (150, 100));
}
