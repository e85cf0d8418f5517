use std::fmt;

use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;
use crate::headers::Headers;
use crate::zlib::{self, Compressor, Decompressor};

use super::{ControlFrame, ControlHead, Kind, StreamId, StreamStatus, Version};

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct HeadersFlags: u8 {
        const FIN = 0x01;
        const RESET_COMPRESSION = 0x02;
    }
}

/// HEADERS frame
///
/// Adds headers to an existing stream.
#[derive(Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub version: Version,
    pub stream_id: StreamId,
    pub flags: HeadersFlags,
    pub headers: Headers,
}

impl HeadersFrame {
    pub fn is_fin(&self) -> bool {
        self.flags.contains(HeadersFlags::FIN)
    }

    pub fn load(
        version: Version,
        flags: u8,
        body: &mut BytesMut,
        decompressor: &mut Decompressor,
    ) -> Result<HeadersFrame, StreamError> {
        if body.remaining() < 4 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "HEADERS body too short",
            ));
        }
        let stream_id = StreamId::new(body.get_u32());

        let flags = HeadersFlags::from_bits(flags).ok_or_else(|| {
            StreamError::new(
                StreamStatus::ProtocolError,
                format!("invalid HEADERS flags {:#04x}", flags),
            )
            .on_stream(stream_id, Some(version))
        })?;

        let headers = zlib::decode_block(version, &body[..], decompressor)
            .map_err(|e| e.on_stream(stream_id, Some(version)))?;

        Ok(HeadersFrame {
            version,
            stream_id,
            flags,
            headers,
        })
    }

    pub fn encode(
        &self,
        compressor: &mut Compressor,
        dst: &mut BytesMut,
    ) -> Result<(), StreamError> {
        log::trace!(
            "encoding HEADERS; id={:?} flags={:?}",
            self.stream_id,
            self.flags
        );
        let block = zlib::encode_block(self.version, &self.headers, compressor)?;

        let head = ControlHead::new(Kind::Headers, self.version, self.flags.bits());
        head.encode(4 + block.len(), dst);
        dst.put_u32(self.stream_id.into());
        dst.extend_from_slice(&block);
        Ok(())
    }
}

impl From<HeadersFrame> for ControlFrame {
    fn from(src: HeadersFrame) -> ControlFrame {
        ControlFrame::Headers(src)
    }
}

impl fmt::Debug for HeadersFrame {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Headers")
            .field("version", &self.version)
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .field("headers", &self.headers)
            .finish()
    }
}
