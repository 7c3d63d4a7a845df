use std::sync::{Arc, Weak};

use log::info;
use uuid::Uuid;

use crate::async_util::Listener;
use crate::error::{Error, ErrorKind};
use crate::session::{
    displaced_or_disconnected, CharacteristicInner, DeviceSession, ReadResult, WriteResult,
};
use crate::types::{CharacteristicProperties, CharacteristicValue, DeviceId, WriteInput, WriteMode};
use crate::Result;

/// Values delivered to one persistent read listener: one item per read
/// response or notification event on the characteristic.
pub type ValueUpdates = Listener<ReadResult>;

/// Outcomes delivered to one persistent write listener, one per
/// write-confirmation event on the characteristic.
pub type WriteConfirmations = Listener<WriteResult>;

/// A GATT characteristic of a connected device.
#[derive(Clone)]
pub struct Characteristic {
    device_id: DeviceId,
    service_id: Uuid,
    char_id: Uuid,
    session: Weak<DeviceSession>,
}

impl PartialEq for Characteristic {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.service_id == other.service_id
            && self.char_id == other.char_id
    }
}

impl Eq for Characteristic {}

impl std::hash::Hash for Characteristic {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.device_id.hash(state);
        self.service_id.hash(state);
        self.char_id.hash(state);
    }
}

impl std::fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Characteristic")
            .field("device", &self.device_id)
            .field("service", &self.service_id)
            .field("uuid", &self.char_id)
            .finish()
    }
}

impl Characteristic {
    pub(crate) fn new(
        device_id: DeviceId,
        service_id: Uuid,
        char_id: Uuid,
        session: Weak<DeviceSession>,
    ) -> Self {
        Self {
            device_id,
            service_id,
            char_id,
            session,
        }
    }

    /// The [Uuid] identifying the type of this GATT characteristic.
    pub fn uuid(&self) -> Uuid {
        self.char_id
    }

    /// The declared properties of this characteristic.
    pub fn properties(&self) -> Result<CharacteristicProperties> {
        Ok(self.get_inner()?.properties)
    }

    /// Reads the value of this characteristic from the device once.
    ///
    /// The same value-update event also feeds every persistent listener
    /// registered with [`Characteristic::updates`] or
    /// [`Characteristic::notifications`]; only this single-shot completion
    /// is cleared by it. A second `read` issued before the first resolves
    /// displaces the first caller with [`ErrorKind::Displaced`].
    pub async fn read(&self) -> Result<CharacteristicValue> {
        let session = self.get_session()?;
        let inner = self.get_inner()?;
        if inner.read.is_awaiting() {
            info!("read: displacing a pending read on {}", self.char_id);
        }
        let completion = inner.read.register();
        if let Err(e) =
            session
                .transport
                .read_characteristic(&session.id, self.service_id, self.char_id)
        {
            inner.read.cancel(&completion);
            return Err(e);
        }
        drop((session, inner));
        match completion.wait().await {
            Some(result) => result,
            None => Err(displaced_or_disconnected(&self.session)),
        }
    }

    /// Registers a persistent listener receiving every future value update
    /// of this characteristic (read responses and notifications alike),
    /// without touching transport-level notification state.
    pub fn updates(&self) -> Result<ValueUpdates> {
        self.get_inner()?.updates.subscribe(|| Ok(()), || ())
    }

    /// Subscribes to notifications from the device.
    ///
    /// Notification subscribers are tracked separately from plain
    /// [`Characteristic::updates`] listeners: the first subscriber enables
    /// transport-level notifications and the last one dropped disables
    /// them, no matter how many plain listeners exist either side.
    /// Dropping the stream is the way to unsubscribe; subsequent
    /// value-update events with no receiver left are dropped (and logged),
    /// not delivered.
    pub fn notifications(&self) -> Result<ValueUpdates> {
        let session = self.get_session()?;
        let inner = self.get_inner()?;
        let (service_id, char_id) = (self.service_id, self.char_id);
        let transport = session.transport.clone();
        let device_id = session.id.clone();
        let (transport_stop, device_id_stop) = (transport.clone(), device_id.clone());
        inner.notifications.subscribe(
            move || transport.set_notify(&device_id, service_id, char_id, true),
            move || {
                let _ = transport_stop.set_notify(&device_id_stop, service_id, char_id, false);
            },
        )
    }

    /// Ends every plain value-update listener stream for this
    /// characteristic. A pending single-shot read and any notification
    /// subscribers are unaffected.
    pub fn clear_updates(&self) -> Result<()> {
        self.get_inner()?.updates.close();
        Ok(())
    }

    /// Writes to this characteristic and waits for the device's
    /// confirmation event.
    ///
    /// The input is resolved to bytes first; a malformed hex input fails
    /// with [`ErrorKind::Conversion`] before any transport command is
    /// issued.
    pub async fn write(&self, input: WriteInput) -> Result<()> {
        let data = input.resolve()?;
        let session = self.get_session()?;
        let inner = self.get_inner()?;
        if inner.write.is_awaiting() {
            info!("write: displacing a pending write on {}", self.char_id);
        }
        let completion = inner.write.register();
        if let Err(e) = session.transport.write_characteristic(
            &session.id,
            self.service_id,
            self.char_id,
            &data,
            WriteMode::WithResponse,
        ) {
            inner.write.cancel(&completion);
            return Err(e);
        }
        drop((session, inner));
        match completion.wait().await {
            Some(result) => result,
            None => Err(displaced_or_disconnected(&self.session)),
        }
    }

    /// Writes to this characteristic without requesting a response.
    ///
    /// The transport never confirms such a write, so no completion is
    /// registered; the only possible failures are synchronous (input
    /// conversion, command rejection).
    pub fn write_without_response(&self, input: WriteInput) -> Result<()> {
        let data = input.resolve()?;
        let session = self.get_session()?;
        session.transport.write_characteristic(
            &session.id,
            self.service_id,
            self.char_id,
            &data,
            WriteMode::WithoutResponse,
        )
    }

    /// Registers a persistent listener receiving the outcome of every
    /// future confirmed write on this characteristic.
    pub fn write_confirmations(&self) -> Result<WriteConfirmations> {
        self.get_inner()?.write_results.subscribe(|| Ok(()), || ())
    }

    /// Ends every persistent write listener stream for this
    /// characteristic. A pending single-shot write is unaffected.
    pub fn clear_write_confirmations(&self) -> Result<()> {
        self.get_inner()?.write_results.close();
        Ok(())
    }

    fn get_session(&self) -> Result<Arc<DeviceSession>> {
        self.session
            .upgrade()
            .ok_or_else(|| Error::from(ErrorKind::NotConnected))
    }

    fn get_inner(&self) -> Result<Arc<CharacteristicInner>> {
        self.get_session()?
            .find_characteristic(self.service_id, self.char_id)
            .ok_or_else(|| Error::from(ErrorKind::NotFound))
    }
}
