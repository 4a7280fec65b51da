use clap::{Parser, ValueEnum};
use client::network::{ClientError, RelayClient};
use log::{info, warn};
use shared::{Envelope, PlayerProfile};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Host,
    Client,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay server URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Register as the host or as a player
    #[arg(long, value_enum, default_value_t = RoleArg::Client)]
    role: RoleArg,

    /// Player name sent on registration
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut client = RelayClient::connect(&args.server).await?;

    match args.role {
        RoleArg::Host => run_host(client).await?,
        RoleArg::Client => {
            let profile = PlayerProfile::named(args.name.clone());
            client.register_client(profile.clone()).await?;
            client.ready(profile).await?;
            info!("Registered as {}, type lines to broadcast", args.name);
            run_player(client).await?;
        }
    }

    Ok(())
}

/// Prints every notification the relay sends to the host.
async fn run_host(mut client: RelayClient) -> Result<(), ClientError> {
    client.register_host().await?;
    info!("Registered as host, waiting for players");

    loop {
        let text = match client.next_text().await {
            Ok(text) => text,
            Err(ClientError::Closed) => break,
            Err(e) => return Err(e),
        };

        match Envelope::from_text(&text) {
            Ok(envelope) => info!("[{}] {} {}", envelope.kind, envelope.message, envelope.data),
            Err(_) => info!("[relay] {}", text),
        }
    }

    info!("Server closed the connection");
    Ok(())
}

/// Broadcasts stdin lines and prints whatever other connections relay.
async fn run_player(mut client: RelayClient) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => client.send_message(line).await?,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            text = client.next_text() => {
                match text {
                    Ok(text) => info!("[relay] {}", text),
                    Err(ClientError::Closed) => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    client.close().await
}
