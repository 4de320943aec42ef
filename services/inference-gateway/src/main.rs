use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    gateway_core::init_tracing(inference_gateway::SERVICE_NAME)?;
    info!(target: "inference-gateway", "Starting inference-gateway service");
    inference_gateway::run().await
}
