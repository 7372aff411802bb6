use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "vhostctl")]
#[command(about = "Command-line client for the vhost-manager API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "VHOST_MANAGER_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// API key, if the server has one configured
    #[arg(short, long, env = "VHOST_MANAGER_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all sites
    List,
    /// Show one site
    Get { domain: String },
    /// Create a site (or overwrite one with the same domain)
    Create(SiteArgs),
    /// Replace a site, optionally renaming it
    Update {
        /// Domain the site is currently stored under
        domain: String,
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Disable and delete a site
    Delete { domain: String },
    /// Re-apply a stored site to Apache
    Sync { domain: String },
    /// Compare a stored site with the files on disk
    Status { domain: String },
    /// Run the Apache configuration test
    Test,
    /// Reload Apache
    Reload,
    /// List local ports with something listening
    Services,
}

#[derive(Args)]
struct SiteArgs {
    /// Primary server name
    #[arg(long)]
    domain: String,

    /// Serve files from this directory
    #[arg(long, conflicts_with = "proxy_target")]
    document_root: Option<PathBuf>,

    /// Reverse-proxy to this URL
    #[arg(long)]
    proxy_target: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    server_alias: Option<String>,

    /// Also emit a TLS virtual host on port 443
    #[arg(long)]
    ssl: bool,
}

impl SiteArgs {
    fn to_json(&self) -> Value {
        json!({
            "domain": self.domain,
            "isProxy": self.proxy_target.is_some(),
            "documentRoot": self.document_root,
            "proxyTarget": self.proxy_target,
            "port": self.port,
            "serverAlias": self.server_alias,
            "enableSSL": self.ssl,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the server reported success.
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }
    let client = Client::builder().default_headers(headers).build()?;
    let base = cli.url.trim_end_matches('/');
    let request = |method: Method, path: &str| client.request(method, format!("{}/api{}", base, path));

    let builder: RequestBuilder = match &cli.command {
        Commands::List => request(Method::GET, "/sites"),
        Commands::Get { domain } => request(Method::GET, &format!("/sites/{}", domain)),
        Commands::Create(site) => request(Method::POST, "/sites").json(&site.to_json()),
        Commands::Update { domain, site } => {
            request(Method::PUT, &format!("/sites/{}", domain)).json(&site.to_json())
        }
        Commands::Delete { domain } => request(Method::DELETE, &format!("/sites/{}", domain)),
        Commands::Sync { domain } => request(Method::POST, &format!("/sites/{}/sync", domain)),
        Commands::Status { domain } => request(Method::GET, &format!("/sites/{}/status", domain)),
        Commands::Test => request(Method::GET, "/apache/test"),
        Commands::Reload => request(Method::POST, "/apache/reload"),
        Commands::Services => request(Method::GET, "/services/active"),
    };

    print_response(builder.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => {
                if let Some(error) = body.get("error").and_then(Value::as_str) {
                    eprintln!("{}", error);
                }
                if let Some(output) = body.get("output").and_then(Value::as_str).filter(|o| !o.is_empty()) {
                    eprintln!("{}", output.trim_end());
                }
            }
            Err(_) => eprintln!("Response: {}", text),
        }
        return Ok(false);
    }

    let json: Value = serde_json::from_str(&text)?;
    if let Some(warning) = json.get("warning").and_then(Value::as_str) {
        eprintln!("Warning: {}", warning);
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}
