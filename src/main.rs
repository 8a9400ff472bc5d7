use clap::Parser;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use stockwatch::alerts::{
    run_alert_dispatcher, ChannelNotifier, EmailNotifier, Notifier, Thresholds,
};
use stockwatch::api::yahoo::ws::{FeedConfig, RunOutcome};
use stockwatch::cli::Cli;
use stockwatch::config::Config;
use stockwatch::shutdown::Shutdown;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("stockwatch", LevelFilter::Debug)
        .parse_default_env()
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let symbol = cli.stock_symbol();
    let thresholds = Thresholds::new(cli.take_profit, cli.stop_loss);

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Stock Symbol: {}, Take Profit: {}, Stop Loss: {}",
        symbol, thresholds.take_profit, thresholds.stop_loss
    );
    if thresholds.is_degenerate() {
        warn!("Stop loss is not below take profit; the no-trade zone is empty");
    }

    let delivery: Option<Arc<dyn Notifier>> = match &config.email_settings {
        Some(settings) => match EmailNotifier::new(settings) {
            Ok(notifier) => {
                info!(
                    "Email alerts go to {} via {}:{}",
                    settings.to_email, settings.smtp_server, settings.smtp_port
                );
                Some(Arc::new(notifier))
            }
            Err(e) => {
                error!("Invalid email settings: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            info!("No email settings configured; alerts will only be logged");
            None
        }
    };

    let (alert_tx, alert_rx) = mpsc::channel(config.alert_buffer);
    let dispatcher = tokio::spawn(run_alert_dispatcher(alert_rx, delivery));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    let outcome = stockwatch::monitor(
        FeedConfig::from(&config),
        &symbol,
        thresholds,
        Arc::new(ChannelNotifier::new(alert_tx)),
        Shutdown::new(shutdown_rx),
    )
    .await;

    // The notifier was dropped with the engine, so the dispatcher drains and stops.
    match dispatcher.await {
        Ok(summary) if summary.failed_deliveries > 0 => warn!(
            "{} of {} alert(s) could not be delivered",
            summary.failed_deliveries, summary.alerts
        ),
        Ok(_) => {}
        Err(e) => error!("Alert dispatcher failed: {}", e),
    }

    match outcome {
        RunOutcome::Cancelled => {
            info!("Shutdown complete");
            Ok(())
        }
        RunOutcome::RetriesExhausted { attempts } => {
            error!("Giving up on {} after {} failed attempts", symbol, attempts);
            std::process::exit(1);
        }
    }
}
