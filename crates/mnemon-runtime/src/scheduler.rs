//! Background maintenance: scheduled and capacity-triggered consolidation,
//! plus periodic snapshots.

use crate::error::RuntimeError;
use crate::service::MemoryService;
use log::{debug, error, info};
use mnemon_memory::{PassControl, PassOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Maintenance cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Period between scheduled passes; `None` leaves only capacity triggers.
    pub consolidation_interval: Option<Duration>,
    /// Period between snapshot writes.
    pub snapshot_interval: Option<Duration>,
    /// Deadline applied to each pass.
    pub pass_timeout: Option<Duration>,
}

/// Handle to the maintenance task.
pub struct MaintenanceScheduler {
    service: Arc<MemoryService>,
    shutdown: watch::Sender<bool>,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl MaintenanceScheduler {
    /// Start the maintenance loop on the current tokio runtime.
    pub fn spawn(service: Arc<MemoryService>, settings: SchedulerSettings) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_loop(
            service.clone(),
            settings,
            receiver,
            cancel.clone(),
        ));
        info!(
            "maintenance scheduler started (consolidation_interval={:?}, snapshot_interval={:?})",
            settings.consolidation_interval, settings.snapshot_interval
        );
        Self {
            service,
            shutdown,
            cancel,
            handle,
        }
    }

    /// Stop the loop, interrupting a running pass between records, and write
    /// a final snapshot when one is configured.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        self.cancel.store(true, Ordering::Release);
        // The loop may already have exited; a closed channel is fine.
        let _ = self.shutdown.send(true);
        self.handle.await?;
        let saved = self.service.snapshot().await?;
        info!("maintenance scheduler stopped (final_snapshot={})", saved);
        Ok(())
    }
}

async fn run_loop(
    service: Arc<MemoryService>,
    settings: SchedulerSettings,
    mut shutdown: watch::Receiver<bool>,
    cancel: Arc<AtomicBool>,
) {
    let trigger = service.trigger();
    let mut consolidation = settings.consolidation_interval.map(ticker);
    let mut snapshots = settings.snapshot_interval.map(ticker);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tick(&mut consolidation) => {
                run_pass(&service, &settings, &cancel, "schedule").await;
            }
            _ = trigger.notified() => {
                run_pass(&service, &settings, &cancel, "capacity").await;
            }
            _ = tick(&mut snapshots) => {
                match service.snapshot().await {
                    Ok(_) => debug!("periodic snapshot written"),
                    Err(err) => error!("periodic snapshot failed (error={})", err),
                }
            }
        }
    }
    debug!("maintenance loop exited");
}

async fn run_pass(
    service: &MemoryService,
    settings: &SchedulerSettings,
    cancel: &Arc<AtomicBool>,
    trigger: &str,
) {
    let mut control = PassControl::unbounded().with_cancel(cancel.clone());
    if let Some(timeout) = settings.pass_timeout {
        control = control.with_timeout(timeout);
    }
    match service.consolidate(control).await {
        Ok(report) if report.outcome == PassOutcome::Skipped => {
            debug!("consolidation skipped (trigger={})", trigger);
        }
        Ok(report) => debug!(
            "consolidation finished (trigger={}, outcome={:?}, evicted={})",
            trigger,
            report.outcome,
            report.evicted.len()
        ),
        Err(err) => error!("consolidation failed (trigger={}, error={})", trigger, err),
    }
}

/// First tick one period from now.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
