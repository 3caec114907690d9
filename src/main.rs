use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use vito::cli::Cli;
use vito::{utils, Bot};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match cli.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            utils::print_fatal(&anyhow::Error::new(e));
            std::process::exit(1);
        }
    };

    init_tracing(&settings.logging.level);

    let bot = match Bot::from_settings(&settings).await {
        Ok(bot) => bot,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            utils::print_fatal(&e);
            std::process::exit(1);
        }
    };

    utils::print_banner(&settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    bot.run(shutdown_rx).await
}

fn init_tracing(level: &str) {
    // HTTP client internals stay quiet so every long poll is not logged
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn", level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
