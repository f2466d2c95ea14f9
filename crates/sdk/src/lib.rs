//! Foreman SDK - Rust client library
//!
//! A thin REST client for services that submit jobs to a running
//! foreman daemon and poll their status, without linking against the
//! controller or its storage adapters.
//!
//! # Example
//!
//! ```no_run
//! use foreman_sdk::{Client, SubmitRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("http://127.0.0.1:9527");
//!
//!     let (token, outcome) = client
//!         .submit(SubmitRequest::new("noop", json!({"path": "src/main.rs"})))
//!         .await?;
//!
//!     println!("submitted {} ({:?})", token, outcome);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::Client;
pub use error::{Result, SdkError};
pub use types::{SubmitOutcome, SubmitRequest};
