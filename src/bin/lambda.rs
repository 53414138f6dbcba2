use image_optimizer::codec::NativeCodec;
use image_optimizer::config::ServerConfig;
use image_optimizer::optimizer::Optimizer;
use image_optimizer::serverless::ServerlessHandler;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_optimizer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(false))
        .init();

    let config = ServerConfig::from_env()?;
    let handler = Arc::new(
        ServerlessHandler::new(Arc::new(Optimizer::new(NativeCodec::new())))
            .with_max_upload_bytes(config.max_upload_bytes),
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<Value, Error>(handler.handle_event(&event.payload).await) }
    }))
    .await
}
