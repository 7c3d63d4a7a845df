use std::sync::{Arc, Weak};

use log::info;
use uuid::Uuid;

use crate::characteristic::Characteristic;
use crate::error::{Error, ErrorKind};
use crate::session::{displaced_or_disconnected, DeviceSession, ServiceInner};
use crate::types::DeviceId;
use crate::Result;

/// A GATT service of a connected device.
#[derive(Clone)]
pub struct Service {
    device_id: DeviceId,
    service_id: Uuid,
    session: Weak<DeviceSession>,
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id && self.service_id == other.service_id
    }
}

impl Eq for Service {}

impl std::hash::Hash for Service {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.device_id.hash(state);
        self.service_id.hash(state);
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("device", &self.device_id)
            .field("uuid", &self.service_id)
            .finish()
    }
}

impl Service {
    pub(crate) fn new(device_id: DeviceId, service_id: Uuid, session: Weak<DeviceSession>) -> Self {
        Self {
            device_id,
            service_id,
            session,
        }
    }

    /// The [Uuid] identifying the type of this GATT service.
    pub fn uuid(&self) -> Uuid {
        self.service_id
    }

    /// Whether this is a primary service of the device.
    pub fn is_primary(&self) -> Result<bool> {
        Ok(self.get_inner()?.primary)
    }

    /// Discovers the characteristics of this service, optionally filtered
    /// to the given UUIDs.
    ///
    /// The pending completion is held by this service, so concurrent
    /// discovery on two different services of the same device resolves
    /// each result to the caller that requested it. A second call for the
    /// *same* service while one is in flight displaces the first caller,
    /// which then fails with [`ErrorKind::Displaced`].
    pub async fn discover_characteristics(
        &self,
        characteristics: Option<Vec<Uuid>>,
    ) -> Result<Vec<Characteristic>> {
        let session = self.get_session()?;
        let inner = self.get_inner()?;
        if inner.discover_chars.is_awaiting() {
            info!(
                "discover_characteristics: displacing a pending discovery on service {}",
                self.service_id
            );
        }
        let completion = inner.discover_chars.register();
        if let Err(e) = session.transport.discover_characteristics(
            &session.id,
            self.service_id,
            characteristics.as_deref(),
        ) {
            inner.discover_chars.cancel(&completion);
            return Err(e);
        }
        drop((session, inner));
        match completion.wait().await {
            Some(Ok(())) => self.collect_characteristics(characteristics.as_deref()),
            Some(Err(e)) => Err(e),
            None => Err(displaced_or_disconnected(&self.session)),
        }
    }

    /// Returns the characteristic(s) of this service with the given [Uuid].
    pub async fn discover_characteristics_with_uuid(
        &self,
        uuid: Uuid,
    ) -> Result<Vec<Characteristic>> {
        self.discover_characteristics(Some(vec![uuid])).await
    }

    /// Get previously discovered characteristics.
    pub fn characteristics(&self) -> Result<Vec<Characteristic>> {
        self.collect_characteristics(None)
    }

    fn collect_characteristics(&self, filter: Option<&[Uuid]>) -> Result<Vec<Characteristic>> {
        Ok(self
            .get_inner()?
            .characteristic_uuids()
            .into_iter()
            .filter(|uuid| filter.map_or(true, |f| f.contains(uuid)))
            .map(|uuid| {
                Characteristic::new(
                    self.device_id.clone(),
                    self.service_id,
                    uuid,
                    self.session.clone(),
                )
            })
            .collect())
    }

    fn get_session(&self) -> Result<Arc<DeviceSession>> {
        self.session
            .upgrade()
            .ok_or_else(|| Error::from(ErrorKind::NotConnected))
    }

    fn get_inner(&self) -> Result<Arc<ServiceInner>> {
        self.get_session()?
            .find_service(self.service_id)
            .ok_or_else(|| Error::from(ErrorKind::NotFound))
    }
}
