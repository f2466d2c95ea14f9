//! Foreman CLI - operator entry point for submitting jobs, inspecting
//! registry records, and issuing abort messages against a running
//! daemon's HTTP surface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foreman_sdk::{Client, SubmitOutcome, SubmitRequest};

const DEFAULT_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Foreman job orchestration CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon HTTP address
    #[arg(long, env = "FOREMAN_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new job
    Submit {
        /// Job type name (must be registered with the worker pool)
        #[arg(short = 't', long)]
        job_type: String,

        /// Original request body as a JSON string
        #[arg(short, long)]
        body: String,

        /// Pin a specific token instead of generating one
        #[arg(long)]
        token: Option<String>,
    },

    /// Get a job's status (queued/running/aborted/completed/failed)
    Status {
        /// Token to look up
        token: String,
    },

    /// Get a job's full registry record (config, metadata, report)
    Info {
        /// Token to look up
        token: String,
    },

    /// Request that a running job abort
    Abort {
        /// Token to abort
        token: String,

        /// Free-text reason recorded in the message log
        #[arg(long, default_value = "requested via CLI")]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = Client::with_host(cli.url, "foreman-cli");

    match cli.command {
        Commands::Submit {
            job_type,
            body,
            token,
        } => {
            let original_body: serde_json::Value =
                serde_json::from_str(&body).context("body must be valid JSON")?;
            let mut request = SubmitRequest::new(job_type, original_body);
            if let Some(token) = token {
                request = request.with_token(token);
            }
            let (token, outcome) = client.submit(request).await?;
            match outcome {
                SubmitOutcome::Created => println!("submitted {token}"),
                SubmitOutcome::AlreadyExists => println!("already submitted {token}"),
            }
        }

        Commands::Status { token } => {
            let status = client.status(&token).await?;
            println!("{status}");
        }

        Commands::Info { token } => {
            let info = client.info(&token).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Abort { token, reason } => {
            client.abort(&token, "foreman-cli", &reason).await?;
            println!("abort requested for {token}");
        }
    }

    Ok(())
}
