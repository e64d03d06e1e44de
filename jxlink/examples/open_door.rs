//! Open a door on a controller from the local network

use std::time::Duration;

use jxlink::{Bridge, BridgeConfig, FunctionCode, Reply, RetryPolicy};

#[tokio::main]
async fn main() -> jxlink::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Change to your controller IP
    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.3.250".to_string());
    let ip = ip
        .parse()
        .map_err(|_| jxlink::Error::Config(format!("invalid DEVICE_IP {}", ip)))?;

    let bridge = Bridge::bind(BridgeConfig::new(0)).await?;
    let runner = bridge.clone();
    tokio::spawn(async move { runner.run().await });

    let door = bridge.session(Some(ip))?;

    println!("Controller clock: {}", door.read_time().await?);

    let policy = RetryPolicy::new(3, Duration::from_secs(5));
    match door
        .send_with_retry(FunctionCode::OpenDoor, vec![1, 0], &policy)
        .await?
    {
        Reply::Received(frame) => println!("Door 1 opened: {}", frame),
        Reply::Sent => println!("Sent"),
    }

    Ok(())
}
