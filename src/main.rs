//! Octogate CLI binary entry point.

use clap::Parser;
use octogate::cli::{Cli, Commands, ServeArgs};
use octogate::config::AppConfig;
use octogate::http::{self, AppState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Login(args) => octogate::cli::login::handle_login(args.scope).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn handle_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        // keep a derived redirect URI in step with the port override
        let derived = format!("http://localhost:{}/callback", config.port);
        if config.redirect_uri == derived {
            config.redirect_uri = format!("http://localhost:{port}/callback");
        }
        config.port = port;
    }

    let state = AppState::from_config(&config)?;
    println!("🚀 octogate listening on http://localhost:{}", config.port);
    println!("   Login: http://localhost:{}/login", config.port);
    println!("   Redirect URI: {}", config.redirect_uri);
    http::serve(state, config.bind_addr()).await?;
    Ok(())
}
