use std::fmt;

use super::Version;

/// RST_STREAM status codes.
///
/// The numeric wire codes differ between protocol versions and some
/// statuses cannot be expressed at all versions: `InternalError` has no
/// v2 wire code, `StreamInUse` and `StreamAlreadyClosed` exist only at
/// v3. `code` returns `None` for unrepresentable combinations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    CancelStream,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
}

impl StreamStatus {
    pub fn code(self, version: Version) -> Option<u32> {
        use self::StreamStatus::*;

        match (self, version) {
            (ProtocolError, _) => Some(1),
            (InvalidStream, _) => Some(2),
            (RefusedStream, _) => Some(3),
            (UnsupportedVersion, _) => Some(4),
            (CancelStream, _) => Some(5),
            (InternalError, Version::V2) => None,
            (InternalError, Version::V3) => Some(6),
            (FlowControlError, _) => Some(7),
            (StreamInUse, Version::V3) => Some(8),
            (StreamAlreadyClosed, Version::V3) => Some(9),
            (StreamInUse, Version::V2) | (StreamAlreadyClosed, Version::V2) => None,
        }
    }

    pub fn from_code(version: Version, code: u32) -> Option<StreamStatus> {
        use self::StreamStatus::*;

        match (version, code) {
            (_, 1) => Some(ProtocolError),
            (_, 2) => Some(InvalidStream),
            (_, 3) => Some(RefusedStream),
            (_, 4) => Some(UnsupportedVersion),
            (_, 5) => Some(CancelStream),
            (Version::V3, 6) => Some(InternalError),
            (_, 7) => Some(FlowControlError),
            (Version::V3, 8) => Some(StreamInUse),
            (Version::V3, 9) => Some(StreamAlreadyClosed),
            _ => None,
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::StreamStatus::*;

        fmt.write_str(match *self {
            ProtocolError => "PROTOCOL_ERROR",
            InvalidStream => "INVALID_STREAM",
            RefusedStream => "REFUSED_STREAM",
            UnsupportedVersion => "UNSUPPORTED_VERSION",
            CancelStream => "CANCEL_STREAM",
            InternalError => "INTERNAL_ERROR",
            FlowControlError => "FLOW_CONTROL_ERROR",
            StreamInUse => "STREAM_IN_USE",
            StreamAlreadyClosed => "STREAM_ALREADY_CLOSED",
        })
    }
}

/// GO_AWAY status codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Ok,
    ProtocolError,
    InternalError,
}

impl SessionStatus {
    pub fn code(self) -> u32 {
        match self {
            SessionStatus::Ok => 0,
            SessionStatus::ProtocolError => 1,
            SessionStatus::InternalError => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<SessionStatus> {
        match code {
            0 => Some(SessionStatus::Ok),
            1 => Some(SessionStatus::ProtocolError),
            2 => Some(SessionStatus::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match *self {
            SessionStatus::Ok => "OK",
            SessionStatus::ProtocolError => "PROTOCOL_ERROR",
            SessionStatus::InternalError => "INTERNAL_ERROR",
        })
    }
}
