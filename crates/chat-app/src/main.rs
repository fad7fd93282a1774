use clap::Parser;
use tracing::Level;

use serenity::app::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = app::run(cli).await {
        tracing::error!(error = %error, "serenity exited with an error");
        std::process::exit(1);
    }
}
