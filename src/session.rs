//! Per-device GATT session state: the discovered service/characteristic
//! registry, the pending-completion slots and listener sets that inbound
//! events resolve against, and session teardown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_lock::Mutex;
use log::warn;
use uuid::Uuid;

use crate::async_util::{CompletionSlot, ListenerSet, SingleListener};
use crate::error::{Error, ErrorKind};
use crate::transport::{Event, Transport};
use crate::types::{
    CharacteristicInfo, CharacteristicProperties, CharacteristicValue, DeviceId, ServiceInfo,
};

pub(crate) type ReadResult = Result<CharacteristicValue, Error>;
pub(crate) type WriteResult = Result<(), Error>;
pub(crate) type RssiResult = Result<i16, Error>;

const LISTENER_CAPACITY: usize = 64;

/// Maps a closed completion channel to the caller's error: the slot was
/// either displaced by a later registration or closed by session teardown.
pub(crate) fn displaced_or_disconnected(session: &std::sync::Weak<DeviceSession>) -> Error {
    if session.upgrade().is_some() {
        ErrorKind::Displaced.into()
    } else {
        ErrorKind::NotConnected.into()
    }
}

/// State owned by one connected device, alive from the connected event
/// until the disconnected event tears it down.
pub(crate) struct DeviceSession {
    pub id: DeviceId,
    pub transport: Arc<dyn Transport>,
    services: Mutex<HashMap<Uuid, Arc<ServiceInner>>>,
    services_discovered: AtomicBool,
    pub discover_services: CompletionSlot<Result<(), Error>>,
    pub rssi: SingleListener<RssiResult>,
}

pub(crate) struct ServiceInner {
    pub primary: bool,
    chars: Mutex<HashMap<Uuid, Arc<CharacteristicInner>>>,
    // Keyed per service so that concurrent discovery on two services
    // resolves each result to the caller that requested it.
    pub discover_chars: CompletionSlot<Result<(), Error>>,
}

pub(crate) struct CharacteristicInner {
    pub properties: CharacteristicProperties,
    pub read: CompletionSlot<ReadResult>,
    pub updates: ListenerSet<ReadResult>,
    // Kept apart from `updates` so the first notification subscriber always
    // enables transport-level notifications and the last always disables
    // them, regardless of how many plain update listeners exist.
    pub notifications: ListenerSet<ReadResult>,
    pub write: CompletionSlot<WriteResult>,
    pub write_results: ListenerSet<WriteResult>,
}

impl DeviceSession {
    pub fn new(id: DeviceId, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            id,
            transport,
            services: Mutex::new(HashMap::new()),
            services_discovered: AtomicBool::new(false),
            discover_services: CompletionSlot::new(),
            rssi: SingleListener::new(),
        })
    }

    pub fn has_discovered_services(&self) -> bool {
        self.services_discovered.load(Ordering::Acquire)
    }

    pub fn service_uuids(&self) -> Vec<Uuid> {
        self.services.lock_blocking().keys().copied().collect()
    }

    pub fn find_service(&self, uuid: Uuid) -> Option<Arc<ServiceInner>> {
        self.services.lock_blocking().get(&uuid).cloned()
    }

    pub fn find_characteristic(
        &self,
        service_id: Uuid,
        char_id: Uuid,
    ) -> Option<Arc<CharacteristicInner>> {
        self.find_service(service_id)?.find_characteristic(char_id)
    }

    // Value-update and write-confirmation events carry no service identity,
    // so correlation falls back to the characteristic UUID alone.
    fn find_characteristic_anywhere(&self, char_id: Uuid) -> Option<Arc<CharacteristicInner>> {
        self.services
            .lock_blocking()
            .values()
            .find_map(|service| service.find_characteristic(char_id))
    }

    /// Routes one device-level event to the matching completion slot and
    /// listener set. Events with no registered receiver are logged and
    /// dropped; they indicate API misuse or a transport inconsistency, not
    /// a fault of this core.
    pub fn route(&self, event: Event) {
        match event {
            Event::ServicesDiscovered { services, error, .. } => {
                self.on_services_discovered(services, error)
            }
            Event::CharacteristicsDiscovered {
                service,
                characteristics,
                error,
                ..
            } => self.on_characteristics_discovered(service, characteristics, error),
            Event::ValueUpdated {
                characteristic,
                value,
                error,
                ..
            } => self.on_value_updated(characteristic, value, error),
            Event::WriteConfirmed {
                characteristic,
                error,
                ..
            } => self.on_write_confirmed(characteristic, error),
            Event::RssiRead { rssi, error, .. } => self.on_rssi_read(rssi, error),
            other => warn!("unroutable event for device {}: {other:?}", self.id),
        }
    }

    fn on_services_discovered(&self, services: Vec<ServiceInfo>, error: Option<Error>) {
        if error.is_none() {
            let mut guard = self.services.lock_blocking();
            for info in services {
                guard
                    .entry(info.uuid)
                    .or_insert_with(|| ServiceInner::new(info));
            }
            self.services_discovered.store(true, Ordering::Release);
        }
        let result = match error {
            None => Ok(()),
            Some(e) => Err(e),
        };
        if !self.discover_services.resolve(result) {
            warn!(
                "unsolicited services-discovered event for device {}",
                self.id
            );
        }
    }

    fn on_characteristics_discovered(
        &self,
        service_id: Uuid,
        characteristics: Vec<CharacteristicInfo>,
        error: Option<Error>,
    ) {
        let Some(service) = self.find_service(service_id) else {
            warn!(
                "characteristics-discovered event for unknown service {service_id} \
                 on device {}",
                self.id
            );
            return;
        };
        if error.is_none() {
            let mut guard = service.chars.lock_blocking();
            for info in characteristics {
                guard
                    .entry(info.uuid)
                    .or_insert_with(|| Arc::new(CharacteristicInner::new(info)));
            }
        }
        let result = match error {
            None => Ok(()),
            Some(e) => Err(e),
        };
        if !service.discover_chars.resolve(result) {
            warn!(
                "unsolicited characteristics-discovered event for service {service_id} \
                 on device {}",
                self.id
            );
        }
    }

    fn on_value_updated(&self, char_id: Uuid, value: Option<Vec<u8>>, error: Option<Error>) {
        let Some(char_inner) = self.find_characteristic_anywhere(char_id) else {
            warn!(
                "value-update event for unknown characteristic {char_id} on device {}",
                self.id
            );
            return;
        };
        let result: ReadResult = match (value, error) {
            (_, Some(e)) => Err(e),
            (Some(data), None) => Ok(CharacteristicValue::new(data)),
            (None, None) => Err(ErrorKind::EmptyData.into()),
        };
        // Single-shot waiter first, then every persistent listener; only
        // the single-shot slot is cleared.
        let single = char_inner.read.resolve(result.clone());
        let listeners = char_inner.updates.notify(result.clone());
        let subscribers = char_inner.notifications.notify(result);
        if !single && !listeners && !subscribers {
            warn!(
                "value-update event for characteristic {char_id} on device {} \
                 with no read completion or listener registered",
                self.id
            );
        }
    }

    fn on_write_confirmed(&self, char_id: Uuid, error: Option<Error>) {
        let Some(char_inner) = self.find_characteristic_anywhere(char_id) else {
            warn!(
                "write-confirmation event for unknown characteristic {char_id} on device {}",
                self.id
            );
            return;
        };
        let result: WriteResult = match error {
            None => Ok(()),
            Some(e) => Err(e),
        };
        let single = char_inner.write.resolve(result.clone());
        let listeners = char_inner.write_results.notify(result);
        if !single && !listeners {
            warn!(
                "write-confirmation event for characteristic {char_id} on device {} \
                 with no write completion or listener registered",
                self.id
            );
        }
    }

    fn on_rssi_read(&self, rssi: Option<i16>, error: Option<Error>) {
        let result: RssiResult = match (rssi, error) {
            (_, Some(e)) => Err(e),
            (Some(value), None) => Ok(value),
            (None, None) => Err(ErrorKind::EmptyData.into()),
        };
        // No single-shot variant for RSSI; with no listener registered the
        // reading is dropped by design.
        let _ = self.rssi.notify(result);
    }

    /// Fails every in-flight single-shot completion and ends every listener
    /// stream. Called exactly once, when the disconnected event retires the
    /// session; waiters observe their channel closing and report
    /// [`ErrorKind::NotConnected`].
    pub fn teardown(&self) {
        self.discover_services.close();
        self.rssi.close();
        let services = self.services.lock_blocking();
        for service in services.values() {
            service.discover_chars.close();
            let chars = service.chars.lock_blocking();
            for char_inner in chars.values() {
                char_inner.read.close();
                char_inner.updates.close();
                char_inner.notifications.close();
                char_inner.write.close();
                char_inner.write_results.close();
            }
        }
    }
}

impl ServiceInner {
    fn new(info: ServiceInfo) -> Arc<Self> {
        Arc::new(Self {
            primary: info.primary,
            chars: Mutex::new(HashMap::new()),
            discover_chars: CompletionSlot::new(),
        })
    }

    pub fn characteristic_uuids(&self) -> Vec<Uuid> {
        self.chars.lock_blocking().keys().copied().collect()
    }

    pub fn find_characteristic(&self, char_id: Uuid) -> Option<Arc<CharacteristicInner>> {
        self.chars.lock_blocking().get(&char_id).cloned()
    }
}

impl CharacteristicInner {
    fn new(info: CharacteristicInfo) -> Self {
        Self {
            properties: info.properties,
            read: CompletionSlot::new(),
            updates: ListenerSet::new(LISTENER_CAPACITY),
            notifications: ListenerSet::new(LISTENER_CAPACITY),
            write: CompletionSlot::new(),
            write_results: ListenerSet::new(LISTENER_CAPACITY),
        }
    }
}
