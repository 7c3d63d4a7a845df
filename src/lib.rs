//! Transport-agnostic BLE central (GATT client) core.
//!
//! A platform radio stack delivers its results asynchronously as
//! unsolicited events, not as replies to calls, and provides no request
//! identifier to correlate against. This crate is the completion router in
//! between: it gates scanning on the adapter power state, tracks in-flight
//! connect attempts, and runs one state machine per connected device that
//! correlates discovery results, read values, write confirmations,
//! notifications and signal-strength readings with the callers that asked
//! for them — exactly once for single-shot requests, for as long as they
//! stay registered for persistent listeners.
//!
//! The platform side implements the [`Transport`] trait for outbound
//! commands and forwards every stack callback into
//! [`Adapter::handle_event`]; the application side uses the async
//! operations and streams on [`Adapter`], [`Device`], [`Service`] and
//! [`Characteristic`].

pub use adapter::{Adapter, ScanStream};
pub use async_util::Listener;
pub use characteristic::{Characteristic, ValueUpdates, WriteConfirmations};
pub use device::{Device, RssiUpdates};
pub use error::{AttError, Error, ErrorKind};
pub use service::Service;
pub use transport::{Event, Transport};
pub use types::*;
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub mod codec;
pub mod error;

mod adapter;
mod async_util;
mod characteristic;
mod device;
mod service;
mod session;
mod transport;
mod types;
