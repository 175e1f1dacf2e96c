//! Daemon orchestration -- assembly, startup, and ordered shutdown.
//!
//! The [`Orchestrator`] owns the configured [`LogPipeline`] and the
//! HTTP endpoints around it.
//!
//! # Startup Order
//!
//! 1. Log pipeline (open file, spawn workers, reader last)
//! 2. Monitor endpoint (bind failure rolls the pipeline back)
//! 3. Uptime gauge updater (when metrics are enabled)
//!
//! # Shutdown Order
//!
//! 1. Log pipeline (reader stops, queues drain, writers flush)
//! 2. Monitor endpoint and uptime updater

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logflux_core::config::LogfluxConfig;
use logflux_core::pipeline::{HealthStatus, Pipeline};
use logflux_log_pipeline::{
    InfluxConnector, LogPipeline, LogPipelineBuilder, PipelineConfig, ReaderExit,
};

use crate::{metrics_server, monitor_server};

/// Why the main loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGTERM or SIGINT.
    Signal(&'static str),
    /// The reader stopped on its own (fatal I/O error or lost task).
    ReaderExited(Option<String>),
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogfluxConfig,
    pipeline: LogPipeline<InfluxConnector>,
    /// Stops the monitor endpoint and uptime updater.
    cancel: CancellationToken,
    start_time: Instant,
    reader_exit: Option<ReaderExit>,
    monitor_addr: Option<SocketAddr>,
    monitor_task: Option<JoinHandle<Result<()>>>,
    uptime_task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Load `logflux.toml` with environment overrides, then build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogfluxConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// - Configuration or sink descriptor is invalid
    /// - Metrics recorder cannot be installed
    pub fn build_from_config(config: LogfluxConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let pipeline_config = PipelineConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("invalid pipeline config: {}", e))?;
        let connector = InfluxConnector::from_config(&pipeline_config)
            .map_err(|e| anyhow::anyhow!("invalid sink descriptor: {}", e))?;

        tracing::info!(
            path = %pipeline_config.path.display(),
            sink = %connector.descriptor().address,
            database = %connector.descriptor().database,
            "initializing log pipeline"
        );

        let pipeline = LogPipelineBuilder::new()
            .config(pipeline_config)
            .connector(Arc::new(connector))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        Ok(Self {
            config,
            pipeline,
            cancel: CancellationToken::new(),
            start_time: Instant::now(),
            reader_exit: None,
            monitor_addr: None,
            monitor_task: None,
            uptime_task: None,
        })
    }

    /// Start everything, wait for a shutdown signal, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        let reason = self.wait(wait_for_shutdown_signal()).await?;
        self.finish(reason).await
    }

    /// Shut down and turn the shutdown reason into the process result.
    ///
    /// A reader that stopped with an error makes the daemon exit non-zero.
    pub async fn finish(&mut self, reason: ShutdownReason) -> Result<()> {
        tracing::info!(reason = ?reason, "shutting down");
        self.shutdown().await?;

        match reason {
            ShutdownReason::ReaderExited(Some(error)) => {
                Err(anyhow::anyhow!("log reader failed: {}", error))
            }
            _ => Ok(()),
        }
    }

    /// Start the pipeline and the HTTP endpoints.
    ///
    /// If the monitor endpoint cannot be bound the pipeline is stopped
    /// again and the bind error is returned.
    pub async fn start(&mut self) -> Result<()> {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;
        self.reader_exit = self.pipeline.take_reader_exit();
        tracing::info!("log pipeline started");

        if self.config.monitor.enabled {
            let listener = match monitor_server::bind(&self.config.monitor).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, "monitor endpoint unavailable, rolling back");
                    if let Err(stop_err) = self.pipeline.stop().await {
                        tracing::error!(
                            startup_error = %e,
                            rollback_error = %stop_err,
                            "rollback also failed during startup failure cleanup"
                        );
                    }
                    return Err(e);
                }
            };
            self.monitor_addr = listener.local_addr().ok();
            let router = monitor_server::build_monitor_router(self.pipeline.monitor());
            self.monitor_task = Some(monitor_server::spawn_monitor_server(
                listener,
                router,
                self.cancel.clone(),
            ));
        }

        if self.config.metrics.enabled {
            self.uptime_task = Some(metrics_server::spawn_uptime_updater(
                self.start_time,
                self.cancel.clone(),
            ));
        }

        Ok(())
    }

    /// Wait for `shutdown` to resolve or for the reader to stop by itself.
    pub async fn wait<F>(&mut self, shutdown: F) -> Result<ShutdownReason>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let reader_exit = self.reader_exit.take();

        tokio::select! {
            signal = shutdown => {
                let signal = signal?;
                tracing::info!(signal = signal, "shutdown signal received");
                Ok(ShutdownReason::Signal(signal))
            }
            exit = wait_reader_exit(reader_exit) => {
                match &exit {
                    Some(error) => tracing::error!(error = %error, "log reader stopped"),
                    None => tracing::warn!("log reader stopped without error"),
                }
                Ok(ShutdownReason::ReaderExited(exit))
            }
        }
    }

    /// Stop the pipeline first, then the endpoints around it.
    pub async fn shutdown(&mut self) -> Result<()> {
        let stop_result = self.pipeline.stop().await;

        self.cancel.cancel();
        if let Some(task) = self.monitor_task.take() {
            match task.await {
                Ok(Err(e)) => tracing::warn!(error = %e, "monitor endpoint ended with error"),
                Err(e) => tracing::warn!(error = %e, "monitor endpoint task panicked"),
                Ok(Ok(())) => {}
            }
        }
        if let Some(task) = self.uptime_task.take() {
            let _ = task.await;
        }

        stop_result.map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e))?;
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "logflux-daemon shut down"
        );
        Ok(())
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    /// Bound monitor address, once started with the monitor enabled.
    pub fn monitor_addr(&self) -> Option<SocketAddr> {
        self.monitor_addr
    }

    /// The loaded configuration.
    pub fn config(&self) -> &LogfluxConfig {
        &self.config
    }

    /// The managed pipeline.
    pub fn pipeline(&self) -> &LogPipeline<InfluxConnector> {
        &self.pipeline
    }
}

/// Resolves with the reader's error text, or `None` for a clean exit.
/// Never resolves when there is no reader to watch.
async fn wait_reader_exit(exit: Option<ReaderExit>) -> Option<String> {
    let Some(exit) = exit else {
        return std::future::pending().await;
    };
    match exit.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("reader task ended without reporting".to_owned()),
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}
