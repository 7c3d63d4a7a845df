//! The capability boundary between this crate and a platform radio stack.
//!
//! A backend implements [`Transport`] to accept outbound commands, and
//! forwards every unsolicited stack callback into
//! [`Adapter::handle_event`](crate::Adapter::handle_event) as an [`Event`].
//! Commands are fire-and-forget: results never come back from a command
//! call, only from a later event.

use uuid::Uuid;

use crate::error::Error;
use crate::types::{
    AdapterState, Advertisement, CharacteristicInfo, DeviceId, ServiceInfo, WriteMode,
};
use crate::Result;

/// Commands accepted by the platform radio stack.
///
/// A command returning `Ok(())` means the stack accepted it, not that the
/// operation succeeded; the outcome arrives later as an [`Event`]. An `Err`
/// is a synchronous rejection and rolls back whatever completion the core
/// just registered for it.
pub trait Transport: Send + Sync {
    /// Starts scanning, optionally filtered to the given service UUIDs.
    fn scan_start(&self, services: Option<&[Uuid]>) -> Result<()>;

    /// Stops scanning.
    fn scan_stop(&self);

    fn connect(&self, device: &DeviceId) -> Result<()>;

    fn disconnect(&self, device: &DeviceId) -> Result<()>;

    /// Requests service discovery, optionally filtered to the given UUIDs.
    fn discover_services(&self, device: &DeviceId, services: Option<&[Uuid]>) -> Result<()>;

    /// Requests characteristic discovery on one service, optionally
    /// filtered to the given characteristic UUIDs.
    fn discover_characteristics(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristics: Option<&[Uuid]>,
    ) -> Result<()>;

    fn read_characteristic(&self, device: &DeviceId, service: Uuid, characteristic: Uuid)
        -> Result<()>;

    fn write_characteristic(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<()>;

    /// Enables or disables transport-level notifications for a
    /// characteristic.
    fn set_notify(&self, device: &DeviceId, service: Uuid, characteristic: Uuid, enabled: bool)
        -> Result<()>;

    /// Requests a signal-strength reading for a connected device.
    fn read_rssi(&self, device: &DeviceId) -> Result<()>;
}

/// Unsolicited events emitted by the platform radio stack.
///
/// The stack delivers all events on a single context; the backend must call
/// `Adapter::handle_event` from that context (or otherwise serialize the
/// calls).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Event {
    AdapterStateChanged {
        state: AdapterState,
    },
    DeviceDiscovered {
        device: DeviceId,
        /// Name known to the platform stack, if any.
        name: Option<String>,
        advertisement: Advertisement,
        rssi: i16,
    },
    Connected {
        device: DeviceId,
    },
    ConnectFailed {
        device: DeviceId,
        error: Option<Error>,
    },
    Disconnected {
        device: DeviceId,
        error: Option<Error>,
    },
    ServicesDiscovered {
        device: DeviceId,
        services: Vec<ServiceInfo>,
        error: Option<Error>,
    },
    CharacteristicsDiscovered {
        device: DeviceId,
        service: Uuid,
        characteristics: Vec<CharacteristicInfo>,
        error: Option<Error>,
    },
    ValueUpdated {
        device: DeviceId,
        characteristic: Uuid,
        value: Option<Vec<u8>>,
        error: Option<Error>,
    },
    WriteConfirmed {
        device: DeviceId,
        characteristic: Uuid,
        error: Option<Error>,
    },
    RssiRead {
        device: DeviceId,
        rssi: Option<i16>,
        error: Option<Error>,
    },
}
