use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::handler;
use crate::services::health::HealthMonitor;
use crate::services::registry::RegistryStore;

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.server.listen_address();

    // 初始化服务注册表
    let registry = Arc::new(RegistryStore::new());

    // 启动健康检查循环
    let shutdown = CancellationToken::new();
    let monitor = HealthMonitor::new(registry.clone(), &config.monitor)?;
    let monitor_handle = tokio::spawn(monitor.run(shutdown.clone()));

    let app = handler::router(registry, &config.server);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(
        address = %addr,
        register_path = %config.server.register_path,
        services_path = %config.server.services_path,
        "Service registry listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = monitor_handle.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }

    tracing::info!("Service registry stopped");
    Ok(())
}

// 等待 Ctrl-C 或 SIGTERM
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
