use std::collections::HashMap;

use uuid::Uuid;

use crate::codec;

/// Opaque identifier of a remote device, assigned by the platform radio
/// stack (a MAC address on some platforms, a locally generated UUID on
/// others). Stable only for the lifetime of the host process.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Power/authorization state of the platform adapter, pushed by the
/// transport. Only [`AdapterState::PoweredOn`] permits issuing a scan
/// command immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// Advertisement attributes carried by a single discovery event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Advertisement {
    /// Local name broadcast in the advertisement payload, if any.
    pub local_name: Option<String>,
    /// Service UUIDs listed in the advertisement.
    pub service_uuids: Vec<Uuid>,
    /// Manufacturer-specific data, if any.
    pub manufacturer_data: Option<Vec<u8>>,
    /// Remaining platform-specific attributes, keyed by the platform's
    /// attribute names.
    pub extra: HashMap<String, String>,
}

/// A device seen while scanning. Produced once per advertisement event and
/// not retained by this crate; repeated advertisements from the same device
/// yield repeated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    /// Name known to the platform stack, independent of the advertisement.
    pub name: Option<String>,
    pub advertisement: Advertisement,
    /// Signal strength of this advertisement, in dBm.
    pub rssi: i16,
}

impl DiscoveredDevice {
    /// Advertised local name if present, else the platform name, else `"N/A"`.
    pub fn display_name(&self) -> &str {
        self.advertisement
            .local_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("N/A")
    }
}

/// A characteristic value produced by one read or notification event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicValue {
    data: Vec<u8>,
}

impl CharacteristicValue {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Uppercase hex rendering of the raw bytes.
    pub fn hex_string(&self) -> String {
        codec::encode_hex(&self.data)
    }

    /// UTF-8 rendering of the raw bytes, if they decode.
    pub fn utf8_string(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

impl From<Vec<u8>> for CharacteristicValue {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// The representation a caller supplies to a write operation; resolved to a
/// single byte buffer before any transport command is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteInput {
    /// An even-length hex string such as `"0A41"`, decoded by [`codec`].
    Hex(String),
    /// Raw bytes, passed through unchanged.
    Bytes(Vec<u8>),
}

impl WriteInput {
    pub fn hex(s: impl Into<String>) -> Self {
        Self::Hex(s.into())
    }

    pub(crate) fn resolve(self) -> crate::Result<Vec<u8>> {
        match self {
            Self::Hex(s) => codec::decode_hex(&s),
            Self::Bytes(b) => Ok(b),
        }
    }
}

impl From<Vec<u8>> for WriteInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for WriteInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Whether a write expects a confirmation event from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The transport emits a write-confirmation event.
    WithResponse,
    /// Fire and forget; the transport never acknowledges the write.
    WithoutResponse,
}

/// Operations a characteristic declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicProperties(u8);

impl CharacteristicProperties {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn can_read(self) -> bool {
        self.0 & Self::READ != 0
    }

    pub const fn can_write(self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub const fn can_write_without_response(self) -> bool {
        self.0 & Self::WRITE_WITHOUT_RESPONSE != 0
    }

    pub const fn can_notify(self) -> bool {
        self.0 & (Self::NOTIFY | Self::INDICATE) != 0
    }
}

/// One discovered service, as reported by a services-discovered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub primary: bool,
}

/// One discovered characteristic, as reported by a
/// characteristics-discovered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}
