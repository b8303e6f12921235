//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::audit::Auditor;
use crate::cli::ServeArgs;
use crate::cluster::{KubeCluster, SharedCluster};
use crate::config::AdvisorConfig;
use crate::mcp::{McpServer, RegistryError, ServerInfo};
use crate::tools;
use anyhow::Context;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(args: &ServeArgs) -> anyhow::Result<AdvisorConfig> {
    let mut config = if args.config.exists() {
        AdvisorConfig::load(Some(&args.config))
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        AdvisorConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_kubernetes {
        config.kubernetes.enabled = false;
    }

    Ok(config)
}

/// Dispatch core with built-in prompts and resources, plus the domain tools
/// when a cluster is available.
pub fn build_server(
    cluster: Option<SharedCluster>,
    auditor: Auditor,
) -> Result<McpServer, RegistryError> {
    let server = McpServer::new(ServerInfo::default()).with_auditor(auditor);
    tools::register_builtins(server.registry())?;
    if let Some(cluster) = cluster {
        tools::register_all_tools(server.registry(), cluster)?;
    }
    Ok(server)
}

/// Connect to Kubernetes when enabled. Failure downgrades to running without tools.
async fn connect_cluster(config: &AdvisorConfig) -> Option<SharedCluster> {
    if !config.kubernetes.enabled {
        tracing::info!("Kubernetes disabled; domain tools not registered");
        return None;
    }

    match KubeCluster::try_default().await {
        Ok(cluster) => {
            tracing::info!("Connected to Kubernetes");
            Some(Arc::new(cluster))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Kubernetes unavailable; domain tools not registered");
            None
        }
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Resolves once `cancel` fires and `grace` has elapsed after it.
async fn grace_deadline(cancel: CancellationToken, grace: Duration) {
    cancel.cancelled().await;
    tokio::time::sleep(grace).await;
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    crate::logging::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting pdb-advisor");
    tracing::debug!(?config, "Loaded configuration");

    let cluster = connect_cluster(&config).await;
    let auditor = Auditor::tracing(config.transport.enable_audit_log);
    let server = build_server(cluster.clone(), auditor.clone())
        .context("registering tools, prompts and resources")?;
    tracing::info!(
        tools = server.registry().tool_count(),
        kubernetes = cluster.is_some(),
        "Dispatch core ready"
    );

    let config = Arc::new(config);
    let state = Arc::new(
        AppState::new(Arc::clone(&config), Arc::new(server), cluster).with_auditor(auditor),
    );
    let cleanup_handle = state.rate_limiter.start_cleanup();
    let app = create_router(Arc::clone(&state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(addr = %addr, "pdb-advisor listening");

    let cancel_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_signal(cancel_token.clone()));

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let cancel = cancel_token.clone();
        async move { cancel.cancelled().await }
    })
    .into_future();

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    tokio::select! {
        result = serve => result?,
        _ = grace_deadline(cancel_token.clone(), grace) => {
            tracing::warn!(grace_seconds = grace.as_secs(), "Shutdown grace period elapsed; dropping in-flight requests");
        }
    }

    state.rate_limiter.stop();
    if let Some(handle) = cleanup_handle {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Rate limiter cleanup task failed");
        }
    }
    signal_handle.abort();

    tracing::info!("pdb-advisor stopped");
    Ok(())
}
