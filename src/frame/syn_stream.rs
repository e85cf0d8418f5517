use std::fmt;

use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;
use crate::headers::Headers;
use crate::zlib::{self, Compressor, Decompressor};

use super::{ControlFrame, ControlHead, Kind, StreamId, StreamStatus, Version};

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct SynStreamFlags: u8 {
        const FIN = 0x01;
        const UNIDIRECTIONAL = 0x02;
    }
}

/// SYN_STREAM frame
///
/// Opens a new stream. The fixed fields are followed by the compressed
/// header block; the priority field is 2 bits wide at v2 and 3 bits wide
/// at v3 (plus a credential slot octet).
#[derive(Clone, PartialEq, Eq)]
pub struct SynStream {
    pub version: Version,
    pub stream_id: StreamId,
    pub associated_stream_id: StreamId,
    pub priority: u8,
    pub slot: u8,
    pub flags: SynStreamFlags,
    pub headers: Headers,
}

impl SynStream {
    pub fn is_fin(&self) -> bool {
        self.flags.contains(SynStreamFlags::FIN)
    }

    pub fn is_unidirectional(&self) -> bool {
        self.flags.contains(SynStreamFlags::UNIDIRECTIONAL)
    }

    /// Builds a `SynStream` from a complete control frame body.
    pub fn load(
        version: Version,
        flags: u8,
        body: &mut BytesMut,
        decompressor: &mut Decompressor,
    ) -> Result<SynStream, StreamError> {
        if body.remaining() < 10 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "SYN_STREAM body too short",
            ));
        }
        let stream_id = StreamId::new(body.get_u32());
        let associated_stream_id = StreamId::new(body.get_u32());
        let (priority, slot) = match version {
            Version::V2 => {
                let pri = body.get_u8() >> 6;
                let _ = body.get_u8();
                (pri, 0)
            }
            Version::V3 => {
                let pri = body.get_u8() >> 5;
                (pri, body.get_u8())
            }
        };

        let flags = SynStreamFlags::from_bits(flags).ok_or_else(|| {
            StreamError::new(
                StreamStatus::ProtocolError,
                format!("invalid SYN_STREAM flags {:#04x}", flags),
            )
            .on_stream(stream_id, Some(version))
        })?;

        let headers = zlib::decode_block(version, &body[..], decompressor)
            .map_err(|e| e.on_stream(stream_id, Some(version)))?;

        Ok(SynStream {
            version,
            stream_id,
            associated_stream_id,
            priority,
            slot,
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
            "encoding SYN_STREAM; id={:?} flags={:?}",
            self.stream_id,
            self.flags
        );
        let block = zlib::encode_block(self.version, &self.headers, compressor)?;

        let head = ControlHead::new(Kind::SynStream, self.version, self.flags.bits());
        head.encode(10 + block.len(), dst);
        dst.put_u32(self.stream_id.into());
        dst.put_u32(self.associated_stream_id.into());
        match self.version {
            Version::V2 => {
                dst.put_u8((self.priority & 0x03) << 6);
                dst.put_u8(0);
            }
            Version::V3 => {
                dst.put_u8((self.priority & 0x07) << 5);
                dst.put_u8(self.slot);
            }
        }
        dst.extend_from_slice(&block);
        Ok(())
    }
}

impl From<SynStream> for ControlFrame {
    fn from(src: SynStream) -> ControlFrame {
        ControlFrame::SynStream(src)
    }
}

impl fmt::Debug for SynStream {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = fmt.debug_struct("SynStream");
        f.field("version", &self.version);
        f.field("stream_id", &self.stream_id);
        if !self.associated_stream_id.is_zero() {
            f.field("associated_stream_id", &self.associated_stream_id);
        }
        f.field("priority", &self.priority);
        if !self.flags.is_empty() {
            f.field("flags", &self.flags);
        }
        f.field("headers", &self.headers);
        f.finish()
    }
}
