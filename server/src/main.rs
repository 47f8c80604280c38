use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_DIMENSION, DEFAULT_PORT, MISMATCH_DELAY_MS};
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, binds the listening socket and runs the accept loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Board dimension (even, at most 12)
        #[clap(short, long, default_value_t = DEFAULT_DIMENSION)]
        dimension: usize,
        /// Delay in milliseconds before a mismatch is reported
        #[clap(short, long, default_value_t = MISMATCH_DELAY_MS)]
        mismatch_delay_ms: u64,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        address: format!("{}:{}", args.host, args.port),
        dimension: args.dimension,
        mismatch_delay: Duration::from_millis(args.mismatch_delay_ms),
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    // Handle shutdown gracefully
    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
