//! Simulates a handful of concurrent requests sharing one feature manager.
//!
//! Run with `RUST_LOG=flagscope=debug cargo run --example request_scope`.

use std::sync::Arc;
use std::time::Duration;

use flagscope::{FeatureManager, InMemoryEvaluator, SnapshotConfig};
use tracing_subscriber::EnvFilter;

const FLAGS: &str = r#"{"feature-management": {"beta": true, "dark-mode": false}}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let evaluator = Arc::new(InMemoryEvaluator::from_json(FLAGS)?);
    let manager = FeatureManager::from_arc(Arc::clone(&evaluator))
        .with_config(SnapshotConfig::from_json(r#"{"failure-policy": "retry"}"#)?);

    let mut requests = Vec::new();
    for id in 0..3 {
        let manager = manager.clone();
        requests.push(tokio::spawn(async move {
            manager
                .scoped(|features| async move {
                    let before = features.is_enabled("beta").await?;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let after = features.is_enabled("beta").await?;
                    let dark = features.is_enabled("dark-mode").await?;
                    tracing::info!(request = id, before, after, dark, "request finished");
                    Ok::<_, std::convert::Infallible>(())
                })
                .await
        }));
    }

    // Flip the flag while requests are in flight; none of them observe it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    evaluator.set("beta", false);

    for request in requests {
        request.await??;
    }

    let late = manager.snapshot();
    tracing::info!(beta = late.is_enabled("beta").await?, "new request sees the flip");
    Ok(())
}
