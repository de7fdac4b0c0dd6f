//! Simple SDK Example
//!
//! Demonstrates basic usage of the Linguard SDK.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package linguard-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple
//!    ```

use linguard_sdk::LinguardClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Linguard SDK - Simple Example");
    println!("=============================\n");

    let client = LinguardClient::new("http://127.0.0.1:8080")?;

    // 1. Engine health
    let health = client.health().await?;
    println!("1. Health: {} (engine {})", health.status, health.supervisor.state);
    if !health.is_healthy() {
        println!("   Engine not ready, requesting a start...");
        let status = client.start_engine().await?;
        println!("   Engine is now {}\n", status.state);
    }

    // 2. Translate twice; the second answer comes from the cache
    for attempt in 1..=2 {
        let response = client.translate("Hello, world!", "en", "ko").await?;
        println!(
            "2.{} {} ({}ms, cached: {})",
            attempt, response.translated_text, response.latency_ms, response.cached
        );
    }

    // 3. Cache statistics
    let stats = client.stats().await?;
    println!(
        "\n3. Cache: {} hits, {} misses, {} entries",
        stats.cache.hits, stats.cache.misses, stats.cache.entries
    );

    Ok(())
}
