//! Simple SDK example.
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package foreman-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --package foreman-sdk --example simple
//!    ```

use foreman_sdk::{Client, SubmitOutcome, SubmitRequest};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Foreman SDK - Simple Example");
    println!("=============================\n");

    let client = Client::with_host("http://127.0.0.1:9527", "simple-example");

    println!("1. Submitting a job...");
    let (token, outcome) = client
        .submit(SubmitRequest::new(
            "noop",
            json!({"path": "examples/simple.rs"}),
        ))
        .await?;
    println!("   token: {token}");
    println!(
        "   outcome: {}\n",
        match outcome {
            SubmitOutcome::Created => "created",
            SubmitOutcome::AlreadyExists => "already existed",
        }
    );

    println!("2. Polling status...");
    for _ in 0..10 {
        let status = client.status(token.as_str()).await?;
        println!("   status: {status}");
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
    }

    println!("\n3. Fetching full job info...");
    let info = client.info(token.as_str()).await?;
    println!("   report host: {}", info.report.host);
    println!("   log empty: {}", info.report.log.is_empty());

    println!("\ndone");

    Ok(())
}
