//! Deckbridge CLI binary entry point.

use deckbridge::cli::{commands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Serve(args) => commands::handle_serve(args).await,
        Commands::Chat(args) => commands::handle_chat(args).await,
        Commands::Tools(args) => commands::handle_tools(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr: stdout carries the protocol in `serve` mode.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "deckbridge=info",
            1 => "deckbridge=debug",
            _ => "deckbridge=trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
