use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;

use forward_proxy::admin::{self, ControlClient, ControlRequest};
use forward_proxy::config::load_or_default;
use forward_proxy::context::ServerContext;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the forward proxy")]
#[command(
    long_about = "Management CLI for the forward proxy.\n\n\
    Commands go to the running proxy over its control socket. When nothing is \
    listening there, read and store commands act on the database directly and \
    are picked up by the next proxy start."
)]
struct Cli {
    /// Proxy configuration file; selects the control socket and database.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control socket address, overriding the configuration.
    #[arg(long)]
    control: Option<String>,

    /// Database URL used when no proxy is running, overriding the configuration.
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request totals and store sizes
    Stats,
    /// Cache size and per-content-type breakdown
    CacheStats,
    /// Most recent requests, newest first
    Logs {
        #[arg(short, long, default_value_t = admin::DEFAULT_LOG_LIMIT)]
        limit: usize,
    },
    /// Cached URLs, newest first
    CachedUrls,
    /// List blocked domains
    Blocked,
    /// Block a domain
    Block { domain: String },
    /// Unblock a domain
    Unblock { domain: String },
    /// Remove every cached response
    ClearCache,
    /// Serve and store cached responses again (running proxy only)
    EnableCache,
    /// Bypass the cache without deleting entries (running proxy only)
    DisableCache,
    /// Insert sample cache entries
    SeedDemo,
}

impl From<Commands> for ControlRequest {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Stats => ControlRequest::Stats,
            Commands::CacheStats => ControlRequest::CacheStats,
            Commands::Logs { limit } => ControlRequest::Logs { limit },
            Commands::CachedUrls => ControlRequest::CachedUrls,
            Commands::Blocked => ControlRequest::Blocked,
            Commands::Block { domain } => ControlRequest::Block { domain },
            Commands::Unblock { domain } => ControlRequest::Unblock { domain },
            Commands::ClearCache => ControlRequest::ClearCache,
            Commands::EnableCache => ControlRequest::SetCacheEnabled { enabled: true },
            Commands::DisableCache => ControlRequest::SetCacheEnabled { enabled: false },
            Commands::SeedDemo => ControlRequest::SeedDemo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.database {
        config.storage.database_url = url;
    }
    let control = cli.control.unwrap_or_else(|| config.admin.control_address.clone());
    let request = ControlRequest::from(cli.command);

    let result = match ControlClient::connect(&control).await {
        Ok(mut client) => client.send(&request).await?,
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
            if request.requires_running_proxy() {
                return Err(format!("no proxy is listening on {control}; cache toggling needs a running proxy").into());
            }
            eprintln!("No proxy listening on {control}; using {} directly", config.storage.database_url);

            // Config seeds are not merged in here; the CLI only reflects stored state.
            config.blocklist.domains.clear();
            let ctx = ServerContext::open(config).await?;
            let result = admin::control::execute(&ctx, request).await;
            ctx.close().await;
            result?
        }
        Err(e) => return Err(e.into()),
    };

    print_json(&result)
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
