//! `pushframe` binary: listen for notifications and print them as JSON
//! lines on stdout.

mod cli;

use std::{path::Path, time::Duration};

use clap::Parser;
use pushframe::{
    client::{ClientConfig, ClientEvent, PushClient},
    credentials::CredentialsFile,
};
use tracing::info;

use crate::cli::{Cli, Command, ListenArgs};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Listen(args) => listen(args).await,
    }
}

async fn read_persistent_ids(path: &Path) -> Result<Vec<String>, BoxError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn install_metrics(args: &ListenArgs) -> Result<(), BoxError> {
    let Some(addr) = args.metrics_addr else {
        return Ok(());
    };
    #[cfg(feature = "metrics")]
    {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "serving metrics");
    }
    #[cfg(not(feature = "metrics"))]
    tracing::warn!(%addr, "built without the metrics feature; ignoring --metrics-addr");
    Ok(())
}

async fn listen(args: ListenArgs) -> Result<(), BoxError> {
    install_metrics(&args)?;

    let file = CredentialsFile::load(&args.credentials).await?;
    let mut persistent_ids = file.persistent_ids;
    if let Some(path) = &args.persistent_ids {
        persistent_ids.extend(read_persistent_ids(path).await?);
    }

    let config = ClientConfig::default()
        .with_endpoint(args.host.clone(), args.port)
        .with_max_backoff(Duration::from_secs(args.max_backoff));
    let (client, mut events) = PushClient::builder(file.credentials)
        .config(config)
        .persistent_ids(persistent_ids)
        .build()?;
    client.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ClientEvent::Notification { notification, persistent_id } => {
                        let line = serde_json::json!({
                            "persistentId": persistent_id,
                            "notification": notification,
                        });
                        println!("{line}");
                        if let Some(path) = &args.persistent_ids {
                            let ids = serde_json::to_vec(&client.persistent_ids())?;
                            tokio::fs::write(path, ids).await?;
                        }
                    }
                    ClientEvent::Stopped(err) => {
                        return Err(format!("client stopped: {err}").into());
                    }
                    other => info!(event = ?other, "client event"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    client.destroy();
    Ok(())
}
