//! Main application orchestration.
//!
//! Wires the components together:
//! - websocket mirror and its connection manager
//! - order gateway (signed REST client, or a recorder on dry runs)
//! - the single-writer dispatcher
//! - one task per campaign

use crate::campaign::{Campaign, CampaignSummary};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use kola_dispatch::{Dispatcher, DynOrderGateway, RecordingGateway};
use kola_rest::RestClient;
use kola_telemetry::Metrics;
use kola_ws::{ConnectionManager, Mirror};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    /// Stops every campaign.
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancelling this token has the same effect as Ctrl-C.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run every campaign to completion.
    pub async fn run(self) -> AppResult<Vec<CampaignSummary>> {
        let credentials = self.config.credentials();
        if credentials.is_none() && !self.config.dry_run {
            return Err(AppError::Config(
                "API credentials are required unless dry_run is set".to_string(),
            ));
        }

        info!(
            live = self.config.live,
            dry_run = self.config.dry_run,
            symbol = %self.config.symbol,
            campaigns = self.config.campaigns.len(),
            "Starting application"
        );

        let mirror = Arc::new(Mirror::new(
            self.config.symbol.clone(),
            self.config.order_id_prefix.clone(),
            self.config.websocket.max_table_len,
        ));
        let ws = Arc::new(ConnectionManager::new(
            self.config.connection_config(credentials.clone()),
            Arc::clone(&mirror),
        ));
        let ws_task = {
            let ws = Arc::clone(&ws);
            tokio::spawn(async move {
                if let Err(e) = ws.run().await {
                    error!(error = %e, "WebSocket connection failed");
                }
            })
        };

        let phase = tokio::select! {
            ready = ws.wait_ready() => match ready {
                Ok(phase) => phase,
                Err(e) => {
                    ws.shutdown();
                    return Err(e.into());
                }
            },
            _ = self.shutdown.cancelled() => {
                ws.shutdown();
                return Err(AppError::Shutdown);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received before the mirror was ready");
                ws.shutdown();
                return Err(AppError::Shutdown);
            }
        };
        info!(phase = %phase, "Market mirror ready");

        let gateway: DynOrderGateway = if self.config.dry_run {
            warn!("Dry run: orders are recorded, never sent");
            Arc::new(RecordingGateway::new())
        } else {
            let client = RestClient::new(self.config.rest_config(), credentials)?
                .with_open_orders(Arc::clone(&mirror) as _);
            Arc::new(client)
        };

        // Stopped after the campaigns so their last cancels still go out.
        let dispatch_shutdown = CancellationToken::new();
        let (dispatcher, handle) = Dispatcher::new(
            self.config.dispatcher_config(),
            gateway,
            Arc::clone(&mirror) as _,
            dispatch_shutdown.clone(),
        );
        let dispatcher_task = tokio::spawn(dispatcher.run());

        let mut campaigns = JoinSet::new();
        for config in &self.config.campaigns {
            let campaign = Campaign::new(
                config.clone(),
                handle.clone(),
                Arc::clone(&mirror) as _,
                &self.config.attempt,
                self.config.trail.clone(),
                self.shutdown.clone(),
            )?;
            campaigns.spawn(campaign.run());
        }
        if campaigns.is_empty() {
            warn!("No campaigns configured");
        }

        let mut summaries = Vec::new();
        loop {
            tokio::select! {
                joined = campaigns.join_next() => match joined {
                    Some(Ok(Ok(summary))) => {
                        info!(
                            campaign = %summary.name,
                            trials_run = summary.trials_run(),
                            reasons = ?summary.reasons,
                            "Campaign done"
                        );
                        summaries.push(summary);
                    }
                    Some(Ok(Err(e))) => error!(error = %e, "Campaign failed"),
                    Some(Err(e)) => error!(error = %e, "Campaign task aborted"),
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !self.shutdown.is_cancelled() => {
                    info!("Shutdown signal received, stopping campaigns");
                    self.shutdown.cancel();
                }
            }
        }

        info!(campaigns = summaries.len(), "Shutting down");
        dispatch_shutdown.cancel();
        if let Err(e) = dispatcher_task.await {
            warn!(error = %e, "Dispatcher task ended abnormally");
        }
        ws.shutdown();
        ws_task.abort();

        match Metrics::gather() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Could not render metrics"),
        }
        Ok(summaries)
    }
}
