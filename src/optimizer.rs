//! The optimization adapter shared by every entry point.
//!
//! Validates a request, decodes through the codec, resizes only when the
//! source is wider than `max_width`, encodes with the per-format settings,
//! and reports size statistics.

use crate::codec::{ImageCodec, ResizeSpec};
use crate::models::{OptimizationRequest, OptimizationResult};
use crate::stats::reduction_percent;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult>;
}

/// Stateless adapter over an [`ImageCodec`]; safe to share across requests.
pub struct Optimizer<C> {
    codec: Arc<C>,
}

impl<C: ImageCodec + 'static> Optimizer<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
        }
    }

    /// Run the whole pipeline on the current thread.
    ///
    /// The decoded handle lives only inside this call and is dropped on every
    /// exit path.
    pub fn optimize_blocking(codec: &C, request: OptimizationRequest) -> Result<OptimizationResult> {
        request.validate()?;

        let original_size = request.image_bytes.len();
        let handle = codec.decode(&request.image_bytes)?;
        let source = codec.metadata(&handle);
        debug!(
            "Decoded {}x{} image ({} bytes)",
            source.width, source.height, original_size
        );

        let handle = match request.max_width {
            Some(max_width) if source.width > max_width => {
                debug!("Resizing to max width {}px", max_width);
                codec.resize(handle, ResizeSpec::to_width(max_width))?
            }
            _ => handle,
        };
        let output = codec.metadata(&handle);

        let options = request
            .format
            .encode_options(request.quality, request.progressive);
        let output_bytes = codec.encode(&handle, &options)?;
        drop(handle);

        let optimized_size = output_bytes.len();
        let reduction = reduction_percent(original_size as u64, optimized_size as u64);
        info!(
            "Optimized {}x{} -> {}x{} {}: {} -> {} bytes ({:.2}%)",
            source.width,
            source.height,
            output.width,
            output.height,
            options.format(),
            original_size,
            optimized_size,
            reduction
        );

        Ok(OptimizationResult {
            output_bytes,
            original_size,
            optimized_size,
            reduction_percent: reduction,
            format: options.format(),
            source,
            output,
        })
    }
}

#[async_trait]
impl<C: ImageCodec + 'static> ImageOptimizer for Optimizer<C> {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult> {
        // Reject before paying for a blocking-pool hop.
        request.validate()?;

        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || Self::optimize_blocking(&codec, request))
            .await
            .map_err(|e| Error::Invariant(format!("Optimization task join error: {}", e)))?
    }
}
