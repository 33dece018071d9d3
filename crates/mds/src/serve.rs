// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mds serve` command implementation.
//!
//! Runs the logistics and radio-delivery services in one process. Each
//! service owns its SQLite database and outbox relay; they only talk through
//! the in-process event bus.

use std::sync::Arc;
use std::time::Duration;

use mds_bus::EventBus;
use mds_config::model::MdsConfig;
use mds_core::{EventPublisher, MdsError};
use mds_radio::Multiplexer;
use mds_storage::{Database, OutboxRelay};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

const IN_PROCESS_BUS: &str = "in-process";
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `mds serve` command until SIGINT or SIGTERM.
pub async fn run_serve(config: MdsConfig) -> Result<(), MdsError> {
    init_tracing(&config.log_level);

    info!(data_dir = %config.storage.data_dir, "starting mds serve");

    let cancel = shutdown::install_signal_handler();
    let running = start(&config, cancel.clone()).await?;
    info!("mds serve ready");

    cancel.cancelled().await;
    running.stop().await;

    info!("mds serve shutdown complete");
    Ok(())
}

/// Background tasks and databases of a started engine.
pub struct Running {
    tasks: JoinSet<()>,
    databases: Vec<(&'static str, Database)>,
}

impl Running {
    /// Wait for the tasks (which must already observe a cancelled token) and
    /// close both databases.
    pub async fn stop(self) {
        shutdown::drain_tasks(self.tasks, SHUTDOWN_DRAIN_TIMEOUT).await;
        for (name, db) in self.databases {
            if let Err(e) = db.close().await {
                warn!(database = name, error = %e, "closing database failed");
            }
        }
    }
}

/// Open storage, wire both services to one bus and spawn every background
/// loop. All loops stop once `cancel` fires.
pub async fn start(config: &MdsConfig, cancel: CancellationToken) -> Result<Running, MdsError> {
    if config.bus.address != IN_PROCESS_BUS {
        warn!(address = %config.bus.address, "only the in-process bus is available, ignoring bus address");
    }

    let logistics_db = Database::open_with(
        &config.storage.logistics_database_path(),
        config.storage.wal_mode,
        mds_logistics::run_migrations,
    )
    .await?;
    let radio_db = Database::open_with(
        &config.storage.radio_database_path(),
        config.storage.wal_mode,
        mds_radio::run_migrations,
    )
    .await?;
    info!(
        logistics = %config.storage.logistics_database_path(),
        radio = %config.storage.radio_database_path(),
        "storage initialized"
    );

    let bus = EventBus::new(config.bus.capacity);
    let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());

    let logistics_relay = OutboxRelay::new(
        mds_logistics::notifier::SOURCE,
        logistics_db.clone(),
        Arc::clone(&publisher),
        config.outbox.relay_interval(),
        config.outbox.batch_size,
    );
    let radio_relay = OutboxRelay::new(
        mds_radio::notifier::SOURCE,
        radio_db.clone(),
        publisher,
        config.outbox.relay_interval(),
        config.outbox.batch_size,
    );

    let logistics = mds_logistics::Controller::new(
        logistics_db.clone(),
        logistics_relay.waker(),
        config.logistics.clone(),
    );
    let multiplexer = Multiplexer::new(
        radio_db.clone(),
        config.radio.notify_request_buffer,
        cancel.child_token(),
    );
    let radio = mds_radio::Controller::new(
        radio_db.clone(),
        radio_relay.waker(),
        Arc::clone(&multiplexer),
        &config.radio,
    )?;

    let logistics_events = bus.subscribe();
    let radio_events = bus.subscribe();

    let mut tasks = JoinSet::new();
    tasks.spawn(logistics_relay.run(cancel.clone()));
    tasks.spawn(radio_relay.run(cancel.clone()));
    tasks.spawn(mds_logistics::EventPort::new(logistics.clone()).run(logistics_events, cancel.clone()));
    tasks.spawn(mds_radio::EventPort::new(radio.clone()).run(radio_events, cancel.clone()));
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { logistics.run_periodic_delivery_checks(cancel).await });
    }
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { radio.run_periodic_pickup_timeout_checks(cancel).await });
    }
    tasks.spawn(multiplexer.run());

    Ok(Running {
        tasks,
        databases: vec![("logistics", logistics_db), ("radio", radio_db)],
    })
}

/// Initializes the tracing subscriber with the configured log level.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mds={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> MdsConfig {
        let mut config = MdsConfig::default();
        config.storage.data_dir = dir.display().to_string();
        config.radio.pickup_timeout_secs = Some(60);
        config
    }

    #[tokio::test]
    async fn starts_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let cancel = CancellationToken::new();
        let running = start(&config, cancel.clone()).await.unwrap();

        assert!(dir.path().join("logistics.db").exists());
        assert!(dir.path().join("radio.db").exists());

        cancel.cancel();
        running.stop().await;
    }

    #[tokio::test]
    async fn missing_pickup_timeout_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.radio.pickup_timeout_secs = None;
        let err = match start(&config, CancellationToken::new()).await {
            Ok(_) => panic!("start must fail without pickup timeout"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), mds_core::ErrorKind::Internal);
    }
}
