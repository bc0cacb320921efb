//! highway: admin console server.
//!
//!   highway web --conf configs/config.toml [--policy <file>] [--menu <file>]
//!
//! `.env` is read first; HIGHWAY_DATABASE_URL, HIGHWAY_JWT_SECRET and
//! HIGHWAY_HTTP_PORT override the config file.

use clap::Parser;

use highway_server::cli::{Cli, Command};
use highway_server::lifecycle::{listen_for_signals, run};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Web(args) => match listen_for_signals() {
            Ok(signals) => run(args, signals).await,
            Err(e) => {
                eprintln!("failed to install signal handlers: {e}");
                1
            }
        },
    };
    std::process::exit(code);
}
