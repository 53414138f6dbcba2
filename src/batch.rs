//! Directory batch runner.
//!
//! Walks the input directory, optimizes every image with one fixed
//! [`BatchConfig`], writes `{stem}-optimized.{format}` to the output
//! directory and, when asked, keeps an untouched copy as
//! `{stem}-original.{ext}` in the backup directory.

use crate::config::BatchConfig;
use crate::models::{OptimizationRequest, OutputFormat};
use crate::optimizer::ImageOptimizer;
use crate::stats::{format_size, reduction_percent};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Optimized {
        file_name: String,
        output_path: PathBuf,
        original_size: u64,
        optimized_size: u64,
        reduction_percent: f64,
    },
    Failed {
        file_name: String,
        error: String,
    },
}

impl FileOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            FileOutcome::Optimized { file_name, .. } | FileOutcome::Failed { file_name, .. } => {
                file_name
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Optimized { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    pub fn total_original(&self) -> u64 {
        self.successes().map(|(original, _)| original).sum()
    }

    pub fn total_optimized(&self) -> u64 {
        self.successes().map(|(_, optimized)| optimized).sum()
    }

    /// Reduction over the successful files only; `None` if nothing succeeded.
    pub fn total_reduction(&self) -> Option<f64> {
        if self.successful() == 0 {
            return None;
        }
        Some(reduction_percent(
            self.total_original(),
            self.total_optimized(),
        ))
    }

    fn successes(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Optimized {
                original_size,
                optimized_size,
                ..
            } => Some((*original_size, *optimized_size)),
            FileOutcome::Failed { .. } => None,
        })
    }
}

pub fn ensure_directories(config: &BatchConfig) -> Result<()> {
    for dir in [&config.input_dir, &config.output_dir, &config.backup_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            info!("Created directory: {}", dir.display());
        }
    }
    Ok(())
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn output_path(output_dir: &Path, source: &Path, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("{}-optimized.{}", file_stem(source), format))
}

pub fn backup_path(backup_dir: &Path, source: &Path) -> PathBuf {
    let name = match source.extension() {
        Some(ext) => format!("{}-original.{}", file_stem(source), ext.to_string_lossy()),
        None => format!("{}-original", file_stem(source)),
    };
    backup_dir.join(name)
}

async fn process_file(
    optimizer: &dyn ImageOptimizer,
    config: &BatchConfig,
    path: &Path,
) -> Result<FileOutcome> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Processing {}", file_name);

    let bytes = fs::read(path)?;

    if config.preserve_original {
        let backup = backup_path(&config.backup_dir, path);
        fs::copy(path, &backup)?;
        info!("Backed up original to {}", backup.display());
    }

    let request = OptimizationRequest::new(bytes)
        .with_quality(i64::from(config.quality))
        .with_max_width(Some(config.max_width))
        .with_format(config.format.into())
        .with_progressive(config.progressive);
    let result = optimizer.optimize(request).await?;

    let output = output_path(&config.output_dir, path, result.format);
    fs::write(&output, &result.output_bytes)?;

    info!(
        "{}: {} -> {} ({:.2}% smaller)",
        file_name,
        format_size(result.original_size as u64),
        format_size(result.optimized_size as u64),
        result.reduction_percent
    );

    Ok(FileOutcome::Optimized {
        file_name,
        output_path: output,
        original_size: result.original_size as u64,
        optimized_size: result.optimized_size as u64,
        reduction_percent: result.reduction_percent,
    })
}

/// Optimize every image in the input directory, one file at a time.
///
/// Directory setup and listing errors abort the run. A failure on a single
/// file is logged, recorded in the summary, and the run moves on.
pub async fn run_batch(optimizer: &dyn ImageOptimizer, config: &BatchConfig) -> Result<BatchSummary> {
    ensure_directories(config)?;

    let images = list_images(&config.input_dir)?;
    let mut summary = BatchSummary::default();

    if images.is_empty() {
        warn!("No images found in {}", config.input_dir.display());
        return Ok(summary);
    }

    info!(
        "Found {} image(s) in {}",
        images.len(),
        config.input_dir.display()
    );

    for path in &images {
        match process_file(optimizer, config, path).await {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(e) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                error!("Failed to process {}: {}", file_name, e);
                summary.outcomes.push(FileOutcome::Failed {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

pub fn log_summary(summary: &BatchSummary) {
    info!("Optimization summary");
    info!("  Successful: {}", summary.successful());
    info!("  Failed: {}", summary.failed());

    if let Some(reduction) = summary.total_reduction() {
        info!(
            "  Total: {} -> {} ({:.2}% smaller)",
            format_size(summary.total_original()),
            format_size(summary.total_optimized()),
            reduction
        );
    }

    for outcome in &summary.outcomes {
        if let FileOutcome::Failed { file_name, error } = outcome {
            warn!("  {} failed: {}", file_name, error);
        }
    }
}
