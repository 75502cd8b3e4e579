use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the fetch gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL through the gateway
    Fetch {
        target: String,
        /// Send the call as a form body instead of a query string
        #[arg(long)]
        post: bool,
    },
    /// Call any method with key=value parameters
    Call {
        method: String,
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Fetch { target, post } => {
            let form = [("method", "getURLContents"), ("url", target.as_str())];
            if post {
                client.post(&cli.url).form(&form).send().await?
            } else {
                client.get(&cli.url).query(&form).send().await?
            }
        }
        Commands::Call { method, params } => {
            let mut query = vec![("method".to_string(), method)];
            for param in params {
                let (key, value) = param
                    .split_once('=')
                    .ok_or_else(|| format!("parameter '{}' is not key=value", param))?;
                query.push((key.to_string(), value.to_string()));
            }
            client.get(&cli.url).query(&query).send().await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("HTTP {}", status);

    let text = res.text().await?;
    if text.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
