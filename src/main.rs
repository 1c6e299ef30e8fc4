//! MySQL Backup Kubernetes Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client,
//! registers the MysqlCluster controller, and runs the reconciliation loop.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mysql_backup_operator::{
    config::OperatorConfig,
    controllers::{self, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting MySQL Backup Operator");

    // Configuration is built once here and passed by reference from now on
    let config = OperatorConfig::from_env();

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(config.metrics_port));
    info!("Metrics server starting on port {}", config.metrics_port);

    // Create shared context and run the controller
    let context = Arc::new(Context::new(client.clone(), config));
    let cluster_controller = controllers::run_cluster_controller(client, context);

    // Handle graceful shutdown
    tokio::select! {
        _ = cluster_controller => {
            error!("MysqlCluster controller exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
        }
    }

    info!("MySQL Backup Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
