use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(about = "Operator CLI for the media fleet control plane", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, sent as a bearer token.
    #[arg(short, long)]
    key: Option<String>,

    /// Operator id recorded on manual failovers.
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Control plane status summary
    Status,
    /// List the server catalog with live state
    Servers,
    /// Ask the load balancer for a server
    Select {
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },
    /// Latest health sample of a server
    Health { server_id: u64 },
    /// Move traffic off a server
    Failover {
        from: u64,
        to: u64,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Recent failover events
    History {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Sync job operations
    #[command(subcommand)]
    Sync(SyncCommands),
    /// List load-balancing rules
    Rules,
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Start a sync job (streams, lines, settings, full)
    Create {
        job_type: String,
        target: u64,
        #[arg(long)]
        source: Option<u64>,
    },
    /// Show one job
    Get { id: u64 },
    /// List all jobs
    List,
    /// Cancel a job
    Cancel { id: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }
    if let Some(user) = &cli.user {
        headers.insert("x-user-id", HeaderValue::from_str(user)?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/status")),
        Commands::Servers => client.get(format!("{base}/servers")),
        Commands::Select { strategy, country } => {
            let mut query = Vec::new();
            if let Some(s) = strategy {
                query.push(("strategy", s));
            }
            if let Some(c) = country {
                query.push(("country", c));
            }
            client.get(format!("{base}/select")).query(&query)
        }
        Commands::Health { server_id } => client.get(format!("{base}/servers/{server_id}/health")),
        Commands::Failover { from, to, reason } => client
            .post(format!("{base}/failover"))
            .json(&json!({ "fromServerId": from, "toServerId": to, "reason": reason })),
        Commands::History { limit } => {
            let mut req = client.get(format!("{base}/failover-history"));
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit)]);
            }
            req
        }
        Commands::Sync(SyncCommands::Create {
            job_type,
            target,
            source,
        }) => client.post(format!("{base}/sync")).json(&json!({
            "jobType": job_type,
            "sourceServerId": source,
            "targetServerId": target,
        })),
        Commands::Sync(SyncCommands::Get { id }) => client.get(format!("{base}/sync/{id}")),
        Commands::Sync(SyncCommands::List) => client.get(format!("{base}/sync")),
        Commands::Sync(SyncCommands::Cancel { id }) => {
            client.post(format!("{base}/sync/{id}/cancel"))
        }
        Commands::Rules => client.get(format!("{base}/rules")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control plane returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
