//! The central adapter: gates scanning on the radio power state, tracks
//! in-flight connect attempts, owns the per-device sessions, and routes
//! every inbound transport event to the completion that expects it.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task;

use async_broadcast::InactiveReceiver;
use async_lock::Mutex;
use log::{info, warn};
use uuid::Uuid;

use crate::async_util::SingleListener;
use crate::device::Device;
use crate::error::{Error, ErrorKind};
use crate::session::DeviceSession;
use crate::transport::{Event, Transport};
use crate::types::{AdapterState, DeviceId, DiscoveredDevice};
use crate::Result;

/// The entry point of this crate: one `Adapter` per platform radio stack.
///
/// All mutable state lives behind this handle; the platform glue feeds the
/// stack's callbacks into [`Adapter::handle_event`] from a single delivery
/// context, and application tasks issue operations concurrently from
/// anywhere.
#[derive(Clone)]
pub struct Adapter {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    state: Mutex<AdapterState>,
    /// At most one deferred "start scanning" intent; overwritten, not
    /// queued, and executed once on the transition to `PoweredOn`.
    pending_scan: Mutex<Option<ScanIntent>>,
    scan_sink: SingleListener<DiscoveredDevice>,
    connecting: Mutex<HashMap<DeviceId, PendingConnect>>,
    sessions: Mutex<HashMap<DeviceId, Arc<DeviceSession>>>,
}

struct ScanIntent {
    services: Option<Vec<Uuid>>,
}

/// One entry per identity; duplicate concurrent connects attach to the
/// existing entry, and the single transport result fans out to every
/// waiting caller.
struct PendingConnect {
    sender: async_broadcast::Sender<std::result::Result<(), Error>>,
    #[allow(unused)]
    keeper: InactiveReceiver<std::result::Result<(), Error>>,
}

impl Adapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                state: Mutex::new(AdapterState::Unknown),
                pending_scan: Mutex::new(None),
                scan_sink: SingleListener::new(),
                connecting: Mutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The last power/authorization state pushed by the transport.
    pub fn state(&self) -> AdapterState {
        *self.shared.state.lock_blocking()
    }

    /// Starts scanning for devices advertising any of `services` (all
    /// devices if `None`).
    ///
    /// If the adapter is not powered on yet, the start is deferred until it
    /// is; the returned stream is live either way. Calling this again
    /// displaces the previous subscriber, whose stream ends.
    pub fn scan(&self, services: Option<Vec<Uuid>>) -> Result<ScanStream> {
        let (receiver, displaced) = self.shared.scan_sink.register();
        if displaced {
            info!("scan: displaced the previous scan subscriber");
        }
        if self.state() == AdapterState::PoweredOn {
            if let Err(e) = self.shared.transport.scan_start(services.as_deref()) {
                self.shared.scan_sink.close();
                return Err(e);
            }
        } else {
            let prev = self
                .shared
                .pending_scan
                .lock_blocking()
                .replace(ScanIntent { services });
            if prev.is_some() {
                info!("scan: overwrote a deferred scan intent");
            }
        }
        Ok(ScanStream {
            receiver: Box::pin(receiver),
        })
    }

    /// Stops scanning unconditionally, ends the subscriber stream and
    /// disarms any still-deferred start intent.
    pub fn stop_scan(&self) {
        self.shared.transport.scan_stop();
        self.shared.scan_sink.close();
        if self.shared.pending_scan.lock_blocking().take().is_some() {
            info!("stop_scan: cleared a deferred scan intent");
        }
    }

    /// Connects to a device and resolves once the transport reports the
    /// outcome. Concurrent calls for the same identity share one attempt
    /// and all observe its result.
    pub async fn connect(&self, device: &DeviceId) -> Result<Device> {
        if let Some(session) = self.shared.sessions.lock_blocking().get(device) {
            return Ok(Device::new(session));
        }
        let mut receiver = {
            let mut connecting = self.shared.connecting.lock_blocking();
            if let Some(pending) = connecting.get(device) {
                pending.sender.new_receiver()
            } else {
                let (sender, receiver) = async_broadcast::broadcast(1);
                let keeper = receiver.clone().deactivate();
                connecting.insert(device.clone(), PendingConnect { sender, keeper });
                drop(connecting);
                if let Err(e) = self.shared.transport.connect(device) {
                    self.shared.connecting.lock_blocking().remove(device);
                    return Err(e);
                }
                receiver
            }
        };
        match receiver.recv().await {
            Ok(Ok(())) => self.device(device),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ErrorKind::NotConnected.into()),
        }
    }

    /// Returns a handle to an already-connected device.
    pub fn device(&self, device: &DeviceId) -> Result<Device> {
        self.shared
            .sessions
            .lock_blocking()
            .get(device)
            .map(Device::new)
            .ok_or_else(|| ErrorKind::NotConnected.into())
    }

    /// Asks the transport to disconnect; the session is torn down when the
    /// disconnected event arrives.
    pub fn disconnect(&self, device: &DeviceId) -> Result<()> {
        self.shared.transport.disconnect(device)
    }

    /// Routes one unsolicited transport event.
    ///
    /// Must be called from a single delivery context (or otherwise
    /// serialized) for any given device; events for different devices may
    /// interleave. Never blocks and never panics on an event nobody is
    /// waiting for — such events are logged and dropped.
    pub fn handle_event(&self, event: Event) {
        match event {
            Event::AdapterStateChanged { state } => self.on_state_changed(state),
            Event::DeviceDiscovered {
                device,
                name,
                advertisement,
                rssi,
            } => {
                let discovered = DiscoveredDevice {
                    id: device,
                    name,
                    advertisement,
                    rssi,
                };
                if !self.shared.scan_sink.notify(discovered) {
                    warn!("discovered-device event with no scan subscriber");
                }
            }
            Event::Connected { device } => self.on_connected(device),
            Event::ConnectFailed { device, error } => self.on_connect_failed(device, error),
            Event::Disconnected { device, error } => self.on_disconnected(device, error),
            other => {
                let Some(device) = other.device_id().cloned() else {
                    warn!("unroutable transport event: {other:?}");
                    return;
                };
                let session = self.shared.sessions.lock_blocking().get(&device).cloned();
                match session {
                    Some(session) => session.route(other),
                    None => warn!("event for device {device} with no session: {other:?}"),
                }
            }
        }
    }

    fn on_state_changed(&self, state: AdapterState) {
        info!("adapter state changed: {state:?}");
        *self.shared.state.lock_blocking() = state;
        if state != AdapterState::PoweredOn {
            return;
        }
        let intent = self.shared.pending_scan.lock_blocking().take();
        if let Some(intent) = intent {
            if let Err(e) = self.shared.transport.scan_start(intent.services.as_deref()) {
                warn!("deferred scan start failed: {e}");
                self.shared.scan_sink.close();
            }
        }
    }

    fn on_connected(&self, device: DeviceId) {
        let Some(pending) = self.shared.connecting.lock_blocking().remove(&device) else {
            warn!("connected event for {device} with no pending connect");
            return;
        };
        let session = DeviceSession::new(device.clone(), self.shared.transport.clone());
        self.shared
            .sessions
            .lock_blocking()
            .insert(device.clone(), session);
        info!("connected to {device}");
        let _ = pending.sender.broadcast_blocking(Ok(()));
    }

    fn on_connect_failed(&self, device: DeviceId, error: Option<Error>) {
        let Some(pending) = self.shared.connecting.lock_blocking().remove(&device) else {
            warn!("connect-failed event for {device} with no pending connect");
            return;
        };
        let error = error.unwrap_or_else(Error::unknown_connection_failure);
        info!("failed to connect to {device}: {error}");
        let _ = pending.sender.broadcast_blocking(Err(error));
    }

    fn on_disconnected(&self, device: DeviceId, error: Option<Error>) {
        let Some(session) = self.shared.sessions.lock_blocking().remove(&device) else {
            warn!("disconnected event for {device} with no session");
            return;
        };
        match error {
            Some(e) => info!("disconnected from {device}: {e}"),
            None => info!("disconnected from {device}"),
        }
        session.teardown();
    }
}

impl Event {
    fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Event::ServicesDiscovered { device, .. }
            | Event::CharacteristicsDiscovered { device, .. }
            | Event::ValueUpdated { device, .. }
            | Event::WriteConfirmed { device, .. }
            | Event::RssiRead { device, .. } => Some(device),
            _ => None,
        }
    }
}

/// Devices seen while the scan is running. Ends when the scan is stopped or
/// a later [`Adapter::scan`] call displaces this subscriber.
pub struct ScanStream {
    // Boxed because the channel receiver is not `Unpin`.
    receiver: Pin<Box<async_channel::Receiver<DiscoveredDevice>>>,
}

impl futures_core::Stream for ScanStream {
    type Item = DiscoveredDevice;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.receiver.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        futures_core::Stream::size_hint(&*self.receiver)
    }
}
