//! The hub: registry, clipboard store and router behind one dispatch queue.
//!
//! # Data flow (for beginners)
//!
//! ```text
//!  session read tasks ──submit()──┐
//!  admit()  ──Welcome────────────►├──► bounded queue (256) ──► dispatch task
//!  admit()/remove() ──try_send───┘                              │
//!                                                               ├─ ClipboardStore (only writer)
//!                                                               └─ Router ──► device links
//! ```
//!
//! - Inbound events and welcome frames use `send().await`: they are never
//!   dropped, the caller waits for queue space instead.
//! - Membership-change `device_list` broadcasts use `try_send`: when the queue
//!   is full the broadcast is dropped with a warning.  The next membership
//!   change (or any `request_devices`) carries the up-to-date list anyway.
//!
//! A new device is registered *pending*: it holds its id but is left out of
//! relays and device lists until the dispatch task has written its welcome
//! frames.  Relays queued before its `Welcome` therefore never reach it ahead
//! of the welcome.
//!
//! The queue serializes *dispatch* only.  Registry membership is guarded by the
//! registry's own `RwLock`, so `admit` and `remove` take effect immediately,
//! without waiting for the dispatch task.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use clipsync_core::protocol::timing::MAX_MESSAGE_SIZE;
use clipsync_core::{history_within, ClipboardStore, DeviceId, Event};

use crate::application::registry::{Device, Registry};
use crate::application::router::{Routed, Router};
use crate::domain::config::ServerConfig;

/// Errors returned by hub entry points.
#[derive(Debug, Error)]
pub enum HubError {
    /// The dispatch task has stopped; the hub is shutting down.
    #[error("hub dispatch queue is closed")]
    QueueClosed,

    /// A device with the same id is already registered.
    #[error("device {0} is already registered")]
    DuplicateDevice(DeviceId),
}

/// One unit of work for the dispatch task.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A decoded frame from a device.
    Inbound { sender: DeviceId, event: Event },
    /// Send the current clipboard state to a newly admitted device.
    Welcome(DeviceId),
    /// Broadcast the device list after an admit or remove.
    MembershipChanged,
}

/// Shared hub state.  Constructed once and passed around as `Arc<Hub>`.
pub struct Hub {
    registry: Registry,
    clipboard: ClipboardStore,
    router: Router,
    queue: mpsc::Sender<Dispatch>,
}

impl Hub {
    /// Creates a hub and the receiving end of its dispatch queue.
    ///
    /// The caller must drive the receiver, usually with
    /// `tokio::spawn(Arc::clone(&hub).run(rx))`.
    pub fn new(config: &ServerConfig) -> (Arc<Self>, mpsc::Receiver<Dispatch>) {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let hub = Arc::new(Self {
            registry: Registry::new(),
            clipboard: ClipboardStore::new(),
            router: Router::new(config.write_wait),
            queue,
        });
        (hub, rx)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn clipboard(&self) -> &ClipboardStore {
        &self.clipboard
    }

    // ── Membership ────────────────────────────────────────────────────────────

    /// Registers a pending device, queues its welcome frames and announces the
    /// new membership.  The device joins relays once the welcome is written.
    ///
    /// # Errors
    ///
    /// - [`HubError::DuplicateDevice`] if the id is already taken.
    /// - [`HubError::QueueClosed`] if the dispatch task has stopped.  The
    ///   device is removed again in that case.
    pub async fn admit(&self, device: Device) -> Result<(), HubError> {
        let id = device.id.clone();
        let hostname = device.hostname.clone();
        if !self.registry.admit_pending(device).await {
            return Err(HubError::DuplicateDevice(id));
        }
        info!("device {id} ({hostname}) registered");

        if self.queue.send(Dispatch::Welcome(id.clone())).await.is_err() {
            self.registry.remove(&id).await;
            return Err(HubError::QueueClosed);
        }
        self.notify_membership();
        Ok(())
    }

    /// Unregisters a device and closes its link.
    ///
    /// Safe to call from any number of failure paths: only the first call for
    /// a given id has an effect, and only that call announces the change.
    pub async fn remove(&self, id: &DeviceId) -> bool {
        if !self.registry.remove(id).await {
            return false;
        }
        info!("device {id} unregistered");
        self.notify_membership();
        true
    }

    fn notify_membership(&self) {
        match self.queue.try_send(Dispatch::MembershipChanged) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("hub queue full; dropping device_list broadcast");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("hub queue closed; skipping device_list broadcast");
            }
        }
    }

    // ── Inbound events ────────────────────────────────────────────────────────

    /// Queues an event received from `sender` for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::QueueClosed`] if the dispatch task has stopped.
    pub async fn submit(&self, sender: DeviceId, event: Event) -> Result<(), HubError> {
        self.queue
            .send(Dispatch::Inbound { sender, event })
            .await
            .map_err(|_| HubError::QueueClosed)
    }

    // ── Dispatch task ─────────────────────────────────────────────────────────

    /// Drains the dispatch queue until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Dispatch>) {
        while let Some(item) = rx.recv().await {
            self.dispatch(item).await;
        }
        info!("hub dispatch loop stopped");
    }

    /// Processes one queue item.
    pub async fn dispatch(&self, item: Dispatch) {
        match item {
            Dispatch::Inbound { sender, event } => self.handle_event(sender, event).await,
            Dispatch::Welcome(id) => self.welcome(id).await,
            Dispatch::MembershipChanged => {
                let devices = self.registry.device_infos().await;
                self.route(Routed::broadcast(Event::DeviceList { devices }))
                    .await;
            }
        }
    }

    async fn handle_event(&self, sender: DeviceId, event: Event) {
        match event {
            Event::ClipboardUpdate { content } => {
                if self.clipboard.set_if_changed(&content) {
                    info!("device {sender}: clipboard updated ({} bytes)", content.len());
                    self.route(Routed::relay(Event::ClipboardUpdate { content }, sender))
                        .await;
                } else {
                    debug!("device {sender}: clipboard unchanged; not relaying");
                }
            }
            Event::RequestDevices => {
                let devices = self.registry.device_infos().await;
                debug!("device {sender}: sending device_list ({} devices)", devices.len());
                self.route(Routed::reply(Event::DeviceList { devices }, sender))
                    .await;
            }
            Event::FileOffer {
                filename,
                filesize,
                target_id,
            } => {
                info!(
                    "device {sender}: file_offer {filename} ({filesize} bytes) to {}",
                    target_id
                        .as_ref()
                        .filter(|t| !t.is_empty())
                        .map_or("all", |t| t.as_str())
                );
                let event = Event::FileOffer {
                    filename,
                    filesize,
                    target_id,
                };
                self.route(Routed::relay(event, sender)).await;
            }
            Event::FileAck {
                filename,
                allow,
                source_id,
            } => {
                info!(
                    "device {sender}: file_ack {filename} allow={allow} for {source_id}"
                );
                let event = Event::FileAck {
                    filename,
                    allow,
                    source_id,
                };
                self.route(Routed::relay(event, sender)).await;
            }
            other @ (Event::ClipboardHistory { .. } | Event::DeviceList { .. }) => {
                warn!(
                    "device {sender}: sent server-only event {}; dropping",
                    other.kind()
                );
            }
        }
    }

    /// Writes the current value and the history to a pending device, then
    /// makes it visible to relays.
    async fn welcome(&self, id: DeviceId) {
        // Gone already: its session ended before the welcome was dispatched.
        let Some(device) = self.registry.get(&id).await else {
            return;
        };
        let mut frames = Vec::new();
        let current = self.clipboard.current_snapshot();
        if !current.is_empty() {
            frames.push(Event::ClipboardUpdate { content: current });
        }
        let history = self.clipboard.history_snapshot();
        let total = history.len();
        let history = history_within(history, MAX_MESSAGE_SIZE);
        if history.len() < total {
            debug!(
                "device {id}: welcome history trimmed from {total} to {} entries",
                history.len()
            );
        }
        if !history.is_empty() {
            frames.push(Event::ClipboardHistory { history });
        }

        let target = std::slice::from_ref(&device);
        for event in frames {
            let failed = self
                .router
                .deliver(&Routed::reply(event, id.clone()), target)
                .await;
            if !failed.is_empty() {
                self.remove(&id).await;
                return;
            }
        }
        self.registry.mark_ready(&id).await;
    }

    /// Snapshots the registry, delivers, and removes every device whose write
    /// failed.
    async fn route(&self, routed: Routed) {
        let members = self.registry.snapshot().await;
        let failed = self.router.deliver(&routed, &members).await;
        for id in failed {
            self.remove(&id).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
