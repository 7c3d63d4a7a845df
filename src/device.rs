use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task;

use log::info;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};
use crate::service::Service;
use crate::session::{displaced_or_disconnected, DeviceSession, RssiResult};
use crate::types::DeviceId;
use crate::Result;

/// A connected BLE device.
///
/// Cheap to clone; holds no strong reference to the session, so operations
/// on a handle that outlived its connection fail with
/// [`ErrorKind::NotConnected`].
#[derive(Clone)]
pub struct Device {
    id: DeviceId,
    session: Weak<DeviceSession>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("id", &self.id).finish()
    }
}

impl Device {
    pub(crate) fn new(session: &Arc<DeviceSession>) -> Self {
        Self {
            id: session.id.clone(),
            session: Arc::downgrade(session),
        }
    }

    /// Returns this device's identifier.
    pub fn id(&self) -> DeviceId {
        self.id.clone()
    }

    /// The connection status for this device.
    pub fn is_connected(&self) -> bool {
        self.session.upgrade().is_some()
    }

    /// Discovers the services of this device, optionally filtered to the
    /// given UUIDs.
    ///
    /// At most one service discovery may be pending per device; a second
    /// call while one is in flight displaces the first caller, which then
    /// fails with [`ErrorKind::Displaced`].
    pub async fn discover_services(&self, services: Option<Vec<Uuid>>) -> Result<Vec<Service>> {
        let session = self.get_session()?;
        if session.discover_services.is_awaiting() {
            info!(
                "discover_services: displacing a pending discovery on {}",
                self.id
            );
        }
        let completion = session.discover_services.register();
        if let Err(e) = session
            .transport
            .discover_services(&session.id, services.as_deref())
        {
            session.discover_services.cancel(&completion);
            return Err(e);
        }
        drop(session);
        match completion.wait().await {
            Some(Ok(())) => self.collect_services(services.as_deref()),
            Some(Err(e)) => Err(e),
            None => Err(displaced_or_disconnected(&self.session)),
        }
    }

    /// Returns the service(s) of this device with the given [Uuid].
    pub async fn discover_services_with_uuid(&self, uuid: Uuid) -> Result<Vec<Service>> {
        self.discover_services(Some(vec![uuid])).await
    }

    /// Get previously discovered services.
    ///
    /// If no services have been discovered yet, this method will perform
    /// service discovery.
    pub async fn services(&self) -> Result<Vec<Service>> {
        let session = self.get_session()?;
        if session.has_discovered_services() {
            drop(session);
            self.collect_services(None)
        } else {
            drop(session);
            self.discover_services(None).await
        }
    }

    /// Issues a signal-strength read command; the reading arrives on the
    /// stream registered with [`Device::rssi_updates`], or is dropped if
    /// none is registered.
    pub fn read_rssi(&self) -> Result<()> {
        let session = self.get_session()?;
        session.transport.read_rssi(&session.id)
    }

    /// Registers the signal-strength listener, displacing any previous one
    /// (its stream ends). Each reading requested with
    /// [`Device::read_rssi`] is delivered here.
    pub fn rssi_updates(&self) -> Result<RssiUpdates> {
        let session = self.get_session()?;
        let (receiver, displaced) = session.rssi.register();
        if displaced {
            info!("rssi_updates: displaced the previous listener for {}", self.id);
        }
        Ok(RssiUpdates {
            receiver: Box::pin(receiver),
        })
    }

    fn collect_services(&self, filter: Option<&[Uuid]>) -> Result<Vec<Service>> {
        let session = self.get_session()?;
        Ok(session
            .service_uuids()
            .into_iter()
            .filter(|uuid| filter.map_or(true, |f| f.contains(uuid)))
            .map(|uuid| Service::new(self.id.clone(), uuid, self.session.clone()))
            .collect())
    }

    fn get_session(&self) -> Result<Arc<DeviceSession>> {
        self.session
            .upgrade()
            .ok_or_else(|| Error::from(ErrorKind::NotConnected))
    }
}

/// Signal-strength readings in dBm, one per completed
/// [`Device::read_rssi`] request. Ends when displaced by a later
/// [`Device::rssi_updates`] registration or on disconnection.
pub struct RssiUpdates {
    // Boxed because the channel receiver is not `Unpin`.
    receiver: Pin<Box<async_channel::Receiver<RssiResult>>>,
}

impl futures_core::Stream for RssiUpdates {
    type Item = RssiResult;

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
