//! Serverless entry point
//!
//! Handles Lambda proxy events (REST and HTTP API payload shapes). The
//! request body is a multipart form, base64-encoded when the gateway says
//! so; the optimized image goes back base64-encoded with the same stats
//! header the HTTP server sends.

use crate::form::{self, FormError};
use crate::models::OptimizationRequest;
use crate::optimizer::ImageOptimizer;
use crate::stats::ImageStats;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

pub struct ServerlessHandler {
    optimizer: Arc<dyn ImageOptimizer>,
    max_upload_bytes: Option<u64>,
}

impl ServerlessHandler {
    pub fn new(optimizer: Arc<dyn ImageOptimizer>) -> Self {
        Self {
            optimizer,
            max_upload_bytes: None,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = Some(max_upload_bytes);
        self
    }

    pub async fn handle_event(&self, payload: &Value) -> Value {
        if !get_event_method(payload)
            .map(|m| m.eq_ignore_ascii_case("POST"))
            .unwrap_or(false)
        {
            return error_response(405, "Method not allowed");
        }

        let form = match self.read_event_form(payload).await {
            Ok(form) => form,
            Err(e) => {
                warn!("Parse error: {}", e);
                return error_response(400, "Failed to parse form data");
            }
        };

        let Some(image) = form.image else {
            return error_response(400, "No image uploaded");
        };

        let request = OptimizationRequest::from_form(image.bytes, &form.params);
        let result = match self.optimizer.optimize(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Optimization error: {}", e);
                return error_response(500, "Failed to optimize image");
            }
        };

        let stats = match ImageStats::from_result(&result).to_header_value() {
            Ok(stats) => stats,
            Err(e) => {
                error!("Handler error: {}", e);
                return error_response(500, "Internal server error");
            }
        };

        let mut headers = Map::new();
        headers.insert(
            "Content-Type".to_string(),
            json!(result.format.content_type()),
        );
        headers.insert("X-Image-Stats".to_string(), json!(stats));

        json!({
            "statusCode": 200,
            "headers": headers,
            "body": general_purpose::STANDARD.encode(&result.output_bytes),
            "isBase64Encoded": true
        })
    }

    async fn read_event_form(&self, payload: &Value) -> Result<form::OptimizeForm, FormError> {
        let content_type = get_event_header(payload, "content-type");
        let boundary = form::parse_boundary(content_type.as_deref())?;
        let body = get_event_body_bytes(payload)?;
        let multipart = form::multipart_from_bytes(body, boundary, self.max_upload_bytes);
        form::read_form(multipart).await
    }
}

fn error_response(status: u16, message: &str) -> Value {
    json!({
        "statusCode": status,
        "headers": { "Content-Type": "application/json" },
        "body": json!({ "error": message }).to_string(),
        "isBase64Encoded": false
    })
}

fn get_event_method(payload: &Value) -> Option<&str> {
    payload
        .get("requestContext")
        .and_then(|ctx| ctx.get("http"))
        .and_then(|http| http.get("method"))
        .and_then(Value::as_str)
        .or_else(|| payload.get("httpMethod").and_then(Value::as_str))
}

fn get_event_header(payload: &Value, name: &str) -> Option<String> {
    payload
        .get("headers")?
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}

fn get_event_body_bytes(payload: &Value) -> Result<Vec<u8>, FormError> {
    let body = payload.get("body").and_then(Value::as_str).unwrap_or("");
    let is_base64 = payload
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if is_base64 {
        general_purpose::STANDARD
            .decode(body)
            .map_err(|e| FormError::Body(format!("invalid base64: {}", e)))
    } else {
        Ok(body.as_bytes().to_vec())
    }
}
