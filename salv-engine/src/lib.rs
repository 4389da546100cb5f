//! salv-engine library interface
//!
//! Exposes the store queries, the notification gateway, and the scheduler
//! services for the binary and for integration tests.

pub mod db;
pub mod notify;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use salv_common::config::EngineConfig;
use salv_common::Result;

use crate::notify::NotificationGateway;
use crate::services::{EligibilityScheduler, FollowUpEscalator, LiquidacionSweep, NightlyStateSweep};

/// Shared handles for the scheduler daemon
#[derive(Clone)]
pub struct Engine {
    pub db: SqlitePool,
    pub gateway: Arc<dyn NotificationGateway>,
    pub config: EngineConfig,
}

impl Engine {
    pub fn new(db: SqlitePool, gateway: Arc<dyn NotificationGateway>, config: EngineConfig) -> Self {
        Self { db, gateway, config }
    }

    /// Construct and spawn the four schedulers. They share nothing in
    /// process; the store is the only coordination point. Cancelling the
    /// token lets in-flight batches finish instead of hard-killing them.
    pub fn start_schedulers(&self, token: &CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        let tz = self.config.tz()?;
        let nightly_fire = self.config.nightly_fire()?;

        let handles = vec![
            EligibilityScheduler::new(
                self.db.clone(),
                self.gateway.clone(),
                Duration::from_secs(self.config.eligibility_interval_minutes * 60),
            )
            .spawn(token.clone()),
            NightlyStateSweep::new(self.db.clone(), tz, nightly_fire).spawn(token.clone()),
            FollowUpEscalator::new(
                self.db.clone(),
                self.gateway.clone(),
                Duration::from_secs(self.config.follow_up_interval_minutes * 60),
                self.config.follow_up_sla_hours,
            )
            .spawn(token.clone()),
            LiquidacionSweep::new(self.db.clone(), tz, nightly_fire).spawn(token.clone()),
        ];

        Ok(handles)
    }
}
