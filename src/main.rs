mod bot;
mod config;
mod fxrates;
mod generate;
mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chigui",
    about = "ChiguiCifras Telegram bot for exchange rate queries and notifications"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the exchange-rate Telegram bot
    Serve(serve::ServeArgs),
    /// Generates and outputs the default configuration
    Generate(generate::GenerateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Serve(args) => serve::run(args).await.map_err(Into::into),
        Commands::Generate(args) => generate::run(&args).map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
