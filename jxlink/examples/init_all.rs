//! Broadcast init and clock sync to every controller on the segment

use jxlink::{Bridge, BridgeConfig};

#[tokio::main]
async fn main() -> jxlink::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let bridge = Bridge::bind(BridgeConfig::new(0)).await?;
    let all = bridge.session(None)?;

    all.init_device().await?;
    all.sync_time().await?;

    println!("Broadcast done");
    Ok(())
}
