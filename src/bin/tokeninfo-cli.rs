use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};

use tokeninfo_gateway::revocation::{ingest, unix_now, RevocationFeed};
use tokeninfo_gateway::routing::is_uuid_token;

#[derive(Parser)]
#[command(name = "tokeninfo-cli")]
#[command(about = "Operator CLI for the token-info gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a revocation feed file
    Validate {
        /// Feed JSON as served by the revocation provider
        feed: PathBuf,

        /// Validation time in unix seconds (defaults to now)
        #[arg(long)]
        now: Option<i64>,
    },
    /// Check whether a token has the canonical UUID shape
    Shape { token: String },
    /// Ask the gateway about a token
    Introspect {
        #[arg(short, long, default_value = "http://localhost:9021/oauth2/tokeninfo")]
        url: String,

        #[arg(short, long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { feed, now } => {
            let content = std::fs::read_to_string(&feed)?;
            let parsed: RevocationFeed = serde_json::from_str(&content)?;
            let now = now.unwrap_or_else(unix_now);

            let (snapshot, rejected) = ingest(parsed.meta, &parsed.revocations, now);
            let report = json!({
                "now": now,
                "accepted": snapshot.records(),
                "rejected": rejected,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Shape { token } => {
            let uuid = is_uuid_token(&token);
            println!("{}", serde_json::to_string_pretty(&json!({"token": token, "uuid": uuid}))?);
        }
        Commands::Introspect { url, token } => {
            let res = reqwest::Client::new()
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let cache = res
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

    let report = json!({
        "status": status.as_u16(),
        "x_cache": cache,
        "body": body,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }
    Ok(())
}
