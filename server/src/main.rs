use clap::Parser;
use log::{error, info};
use server::network::Server;

/// Relay between one game host and its players
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address).await?;
    let handle = server.handle();

    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
        }
    }

    if let Err(e) = server_task.await {
        error!("Server task panicked: {}", e);
    }

    Ok(())
}
