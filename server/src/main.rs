use clap::Parser;
use server::network::Server;
use shared::WRITING_SECS;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, binds the server, and runs it until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server port to listen on
        #[clap(short, long, default_value = "3000", env = "PORT")]
        port: u16,
    }

    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    let address = format!("0.0.0.0:{}", args.port);
    let mut server = Server::new(&address, Duration::from_secs(WRITING_SECS)).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
