//! Defines error types.

/// The error type for BLE central operations.
///
/// Cloneable so that a single transport failure can ride on an event and
/// fan out to a single-shot waiter and any number of listener streams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub(crate) fn new<S: ToString>(kind: ErrorKind, message: S) -> Self {
        Error {
            kind,
            message: message.to_string(),
        }
    }

    /// The failure reported by a connect-failed event that carried no
    /// transport error at all.
    pub(crate) fn unknown_connection_failure() -> Self {
        Error::new(ErrorKind::ConnectionFailed, "no transport error reported")
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", &self.kind)
        } else {
            write!(f, "{}: {}", &self.kind, &self.message)
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            message: String::new(),
        }
    }
}

impl From<AttError> for Error {
    fn from(att_error: AttError) -> Self {
        ErrorKind::Protocol(att_error).into()
    }
}

/// A list of general categories of BLE central error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// connection failed
    ConnectionFailed,
    /// the device isn't connected
    NotConnected,
    /// not found
    NotFound,
    /// not ready
    NotReady,
    /// invalid parameter
    InvalidParameter,
    /// the write input could not be converted to bytes
    Conversion,
    /// a value update carried neither data nor an error
    EmptyData,
    /// a later registration displaced this pending request
    Displaced,
    /// protocol error reported by the remote device
    Protocol(AttError),
    /// error
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConnectionFailed => f.write_str("connection failed"),
            ErrorKind::NotConnected => f.write_str("the device isn't connected"),
            ErrorKind::NotFound => f.write_str("not found"),
            ErrorKind::NotReady => f.write_str("not ready"),
            ErrorKind::InvalidParameter => f.write_str("invalid parameter"),
            ErrorKind::Conversion => {
                f.write_str("the write input could not be converted to bytes")
            }
            ErrorKind::EmptyData => {
                f.write_str("a value update carried neither data nor an error")
            }
            ErrorKind::Displaced => {
                f.write_str("a later registration displaced this pending request")
            }
            ErrorKind::Protocol(err) => write!(f, "protocol error: {err}"),
            ErrorKind::Other => f.write_str("error"),
        }
    }
}

/// Bluetooth Attribute Protocol error code.
/// See the Bluetooth Core Specification, Vol 3, Part F, §3.4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttError(u8);

impl AttError {
    /// The operation completed successfully.
    pub const SUCCESS: AttError = AttError(0x00);
    /// The attribute handle given was not valid on this server.
    pub const INVALID_HANDLE: AttError = AttError(0x01);
    /// The attribute cannot be read.
    pub const READ_NOT_PERMITTED: AttError = AttError(0x02);
    /// The attribute cannot be written.
    pub const WRITE_NOT_PERMITTED: AttError = AttError(0x03);
    /// The attribute requires authentication before it can be read or written.
    pub const INSUFFICIENT_AUTHENTICATION: AttError = AttError(0x05);
    /// Attribute server does not support the request received from the client.
    pub const REQUEST_NOT_SUPPORTED: AttError = AttError(0x06);
    /// The attribute requires authorization before it can be read or written.
    pub const INSUFFICIENT_AUTHORIZATION: AttError = AttError(0x08);
    /// No attribute found within the given attribute handle range.
    pub const ATTRIBUTE_NOT_FOUND: AttError = AttError(0x0a);
    /// The attribute value length is invalid for the operation.
    pub const INVALID_ATTRIBUTE_VALUE_LENGTH: AttError = AttError(0x0d);
    /// The attribute request has encountered an unlikely error.
    pub const UNLIKELY_ERROR: AttError = AttError(0x0e);
    /// The attribute requires encryption before it can be read or written.
    pub const INSUFFICIENT_ENCRYPTION: AttError = AttError(0x0f);
    /// Insufficient resources to complete the request.
    pub const INSUFFICIENT_RESOURCES: AttError = AttError(0x11);
    /// Client Characteristic Configuration Descriptor improperly configured.
    pub const CCCD_IMPROPERLY_CONFIGURED: AttError = AttError(0xfd);
    /// Procedure already in progress.
    pub const PROCEDURE_ALREADY_IN_PROGRESS: AttError = AttError(0xfe);
    /// Out of range.
    pub const OUT_OF_RANGE: AttError = AttError(0xff);

    /// Converts a [`u8`] value to an [`AttError`].
    pub const fn from_u8(val: u8) -> Self {
        AttError(val)
    }

    /// Converts an [`AttError`] to a [`u8`] value.
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Checks if the error code is in the application error range.
    pub fn is_application(&self) -> bool {
        (0x80..0xa0).contains(&self.0)
    }

    /// Checks if the error code is in the common profile and service range.
    pub fn is_common_profile_or_service(&self) -> bool {
        self.0 >= 0xe0
    }
}

impl std::fmt::Display for AttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            AttError::SUCCESS => f.write_str("the operation completed successfully"),
            AttError::INVALID_HANDLE => f.write_str("invalid attribute handle"),
            AttError::READ_NOT_PERMITTED => f.write_str("the attribute cannot be read"),
            AttError::WRITE_NOT_PERMITTED => f.write_str("the attribute cannot be written"),
            AttError::INSUFFICIENT_AUTHENTICATION => f.write_str("insufficient authentication"),
            AttError::REQUEST_NOT_SUPPORTED => f.write_str("request not supported"),
            AttError::INSUFFICIENT_AUTHORIZATION => f.write_str("insufficient authorization"),
            AttError::ATTRIBUTE_NOT_FOUND => f.write_str("attribute not found"),
            AttError::INVALID_ATTRIBUTE_VALUE_LENGTH => {
                f.write_str("invalid attribute value length")
            }
            AttError::UNLIKELY_ERROR => f.write_str("unlikely error"),
            AttError::INSUFFICIENT_ENCRYPTION => f.write_str("insufficient encryption"),
            AttError::INSUFFICIENT_RESOURCES => f.write_str("insufficient resources"),
            AttError::CCCD_IMPROPERLY_CONFIGURED => {
                f.write_str("client characteristic configuration descriptor improperly configured")
            }
            AttError::PROCEDURE_ALREADY_IN_PROGRESS => {
                f.write_str("procedure already in progress")
            }
            AttError::OUT_OF_RANGE => f.write_str("out of range"),
            _ => write!(f, "unknown error 0x{:02x}", self.0),
        }
    }
}

impl From<u8> for AttError {
    fn from(number: u8) -> Self {
        AttError(number)
    }
}

impl From<AttError> for u8 {
    fn from(val: AttError) -> Self {
        val.0
    }
}
