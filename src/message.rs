use ntex_bytes::Bytes;

use crate::frame::{SessionStatus, SettingsMap, StreamId, StreamStatus};
use crate::headers::Headers;

/// Metadata for opening a stream.
#[derive(Debug, Clone, Default)]
pub struct SynInfo {
    pub headers: Headers,
    pub close: bool,
    pub unidirectional: bool,
    pub associated_stream_id: StreamId,
    pub priority: u8,
}

impl SynInfo {
    pub fn new(headers: Headers, close: bool) -> SynInfo {
        SynInfo {
            headers,
            close,
            unidirectional: false,
            associated_stream_id: StreamId::ZERO,
            priority: 0,
        }
    }
}

/// Metadata for replying to a stream.
#[derive(Debug, Clone, Default)]
pub struct ReplyInfo {
    pub headers: Headers,
    pub close: bool,
}

impl ReplyInfo {
    pub fn new(headers: Headers, close: bool) -> ReplyInfo {
        ReplyInfo { headers, close }
    }
}

/// Metadata for additional headers on a stream.
#[derive(Debug, Clone, Default)]
pub struct HeadersInfo {
    pub headers: Headers,
    pub close: bool,
    pub reset_compression: bool,
}

impl HeadersInfo {
    pub fn new(headers: Headers, close: bool) -> HeadersInfo {
        HeadersInfo {
            headers,
            close,
            reset_compression: false,
        }
    }
}

/// Metadata for resetting a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstInfo {
    pub stream_id: StreamId,
    pub status: StreamStatus,
}

impl RstInfo {
    pub fn new(stream_id: StreamId, status: StreamStatus) -> RstInfo {
        RstInfo { stream_id, status }
    }
}

/// Metadata for configuring the session.
#[derive(Debug, Clone, Default)]
pub struct SettingsInfo {
    pub settings: SettingsMap,
    pub clear_persisted: bool,
}

/// Metadata returned by a ping round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingInfo {
    pub ping_id: u32,
}

/// Metadata carried by a GO_AWAY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoAwayInfo {
    pub last_stream_id: StreamId,
    pub status: SessionStatus,
}

/// A chunk of stream payload together with its close marker.
///
/// Outbound, the session drains it at flush time in window sized slices,
/// tracking how much has been consumed; the FIN flag travels with the
/// final slice. Inbound, it carries one received DATA payload.
#[derive(Debug, Clone)]
pub struct DataInfo {
    data: Bytes,
    close: bool,
    cursor: usize,
}

impl DataInfo {
    pub fn new(data: impl Into<Bytes>, close: bool) -> DataInfo {
        DataInfo {
            data: data.into(),
            close,
            cursor: 0,
        }
    }

    /// Total payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    /// Bytes not yet drained.
    pub fn available(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn is_consumed(&self) -> bool {
        self.cursor == self.data.len()
    }

    /// The whole payload, regardless of the drain cursor.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn consume(&mut self, len: usize) -> Bytes {
        debug_assert!(len <= self.available());
        let chunk = self.data.slice(self.cursor..self.cursor + len);
        self.cursor += len;
        chunk
    }
}
