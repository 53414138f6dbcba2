//! Size statistics reported alongside an optimized image.

use crate::models::OptimizationResult;
use crate::Result;
use serde::Serialize;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// `(1 - optimized / original) * 100`, rounded to two decimals.
///
/// Negative when re-encoding made the file larger.
pub fn reduction_percent(original: u64, optimized: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let raw = (1.0 - optimized as f64 / original as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}

pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if value < KIB {
        format!("{} B", bytes)
    } else if value < MIB {
        format!("{:.2} KB", value / KIB)
    } else {
        format!("{:.2} MB", value / MIB)
    }
}

/// Payload of the `X-Image-Stats` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub original_size: String,
    pub optimized_size: String,
    pub reduction: String,
}

impl ImageStats {
    pub fn from_result(result: &OptimizationResult) -> Self {
        Self {
            original_size: format_size(result.original_size as u64),
            optimized_size: format_size(result.optimized_size as u64),
            reduction: format!("{:.2}", result.reduction_percent),
        }
    }

    pub fn to_header_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
