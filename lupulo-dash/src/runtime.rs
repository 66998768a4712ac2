//! Runtime loop
//!
//! One task owns the [`Dashboard`]. It multiplexes upstream messages, commands
//! from the HTTP API and the repaint tick, so widget state is never shared
//! and never locked. Results leave the task on the EventBus (frames, notices,
//! lifecycle events) and through a watch channel (latest snapshot).

use crate::dashboard::{Dashboard, DashboardSnapshot, DeviceUpdate};
use crate::error::{DashError, Result};
use crate::layout::{DeviceEnvelope, LayoutEnvelope};
use crate::source::SourceMessage;
use lupulo_common::events::{DashEvent, EventBus, LayoutReport, Notice};
use lupulo_common::time;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Upstream event carrying a layout envelope
pub const NEW_WIDGETS_EVENT: &str = "new_widgets";
/// Upstream event carrying a device envelope
pub const NEW_DEVICES_EVENT: &str = "new_devices";

const COMMAND_CAPACITY: usize = 32;

/// Requests into the runtime loop
#[derive(Debug)]
pub enum Command {
    SelectDevice {
        device: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ApplyLayouts {
        envelope: LayoutEnvelope,
        reply: oneshot::Sender<LayoutReport>,
    },
    Shutdown,
}

/// Cloneable access to a running loop
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<DashboardSnapshot>,
}

impl RuntimeHandle {
    pub async fn select_device(&self, device: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectDevice {
            device: device.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn apply_layouts(&self, envelope: LayoutEnvelope) -> Result<LayoutReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyLayouts { envelope, reply }).await?;
        rx.await.map_err(|_| stopped())
    }

    /// Ask the loop to stop; a loop that already stopped is not an error
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that sees every new snapshot
    pub fn watch_snapshot(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> DashError {
    DashError::Runtime("runtime loop is not running".to_string())
}

pub struct Runtime {
    dashboard: Dashboard,
    bus: Arc<EventBus>,
    tick_interval: Duration,
    started: Instant,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
}

impl Runtime {
    pub fn new(dashboard: Dashboard, bus: Arc<EventBus>, tick_interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(dashboard.snapshot());
        Self {
            dashboard,
            bus,
            tick_interval,
            started: Instant::now(),
            snapshot_tx,
        }
    }

    /// Start the loop on the current tokio runtime
    pub fn spawn(self, upstream: mpsc::Receiver<SourceMessage>) -> (RuntimeHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = RuntimeHandle {
            commands: commands_tx,
            snapshot: self.snapshot_tx.subscribe(),
        };
        let task = tokio::spawn(self.run(upstream, commands_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut upstream: mpsc::Receiver<SourceMessage>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Runtime loop started (tick every {:?})", self.tick_interval);

        loop {
            tokio::select! {
                Some(message) = upstream.recv() => {
                    self.handle_message(message);
                }
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        info!("Runtime loop stopped");
    }

    /// Apply one upstream event
    pub fn handle_message(&mut self, message: SourceMessage) {
        match message.event.as_str() {
            NEW_WIDGETS_EVENT => match LayoutEnvelope::from_json(&message.data) {
                Ok(envelope) => {
                    let report = self.dashboard.apply_layouts(envelope);
                    self.publish_report(report);
                }
                Err(e) => self.warn_malformed(&message.event, e),
            },
            NEW_DEVICES_EVENT => match DeviceEnvelope::from_json(&message.data) {
                Ok(envelope) => {
                    let update = self.dashboard.apply_devices(envelope);
                    self.publish_devices(update);
                }
                Err(e) => self.warn_malformed(&message.event, e),
            },
            event => match serde_json::from_str::<Value>(&message.data) {
                Ok(payload) => {
                    let delivered = self.dashboard.ingest(event, &payload);
                    debug!("Event {} delivered to {} widgets", event, delivered);
                }
                Err(e) => self.warn_malformed(event, DashError::Common(e.into())),
            },
        }
        self.publish_notices();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectDevice { device, reply } => {
                let result = self.dashboard.select_device(&device);
                if result.is_ok() {
                    self.bus.emit_lossy(DashEvent::DeviceSelected {
                        device: Some(device),
                        timestamp: time::now(),
                    });
                    self.publish_snapshot();
                }
                let _ = reply.send(result);
            }
            Command::ApplyLayouts { envelope, reply } => {
                let report = self.dashboard.apply_layouts(envelope);
                self.publish_report(report.clone());
                let _ = reply.send(report);
            }
            Command::Shutdown => {}
        }
        self.publish_notices();
    }

    /// Paint and publish
    pub fn tick(&mut self) {
        let frames = self.dashboard.tick(self.started.elapsed());
        if !frames.is_empty() {
            self.bus.emit_lossy(DashEvent::FramesPainted {
                frames,
                timestamp: time::now(),
            });
        }
        self.publish_notices();
        self.publish_snapshot();
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    fn warn_malformed(&self, event: &str, error: DashError) {
        warn!("Malformed payload on {}: {}", event, error);
        self.bus.emit_lossy(DashEvent::Notice {
            notice: Notice::warning(
                None,
                format!("malformed payload on '{}': {}", event, error),
            ),
        });
    }

    fn publish_report(&self, report: LayoutReport) {
        self.bus.emit_lossy(DashEvent::LayoutsApplied {
            report,
            timestamp: time::now(),
        });
        self.publish_snapshot();
    }

    fn publish_devices(&self, update: DeviceUpdate) {
        let timestamp = time::now();
        self.bus.emit_lossy(DashEvent::DevicesChanged {
            devices: update.devices,
            timestamp,
        });
        if update.selection_changed {
            self.bus.emit_lossy(DashEvent::DeviceSelected {
                device: update.selected,
                timestamp,
            });
        }
        self.publish_snapshot();
    }

    fn publish_notices(&mut self) {
        for notice in self.dashboard.take_notices() {
            self.bus.emit_lossy(DashEvent::Notice { notice });
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.dashboard.snapshot());
    }
}
