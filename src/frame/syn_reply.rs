use std::fmt;

use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;
use crate::headers::Headers;
use crate::zlib::{self, Compressor, Decompressor};

use super::{ControlFrame, ControlHead, Kind, StreamId, StreamStatus, Version};

const FLAG_FIN: u8 = 0x01;

/// SYN_REPLY frame
///
/// The v2 body carries 16 reserved bits between the stream id and the
/// header block; v3 drops them.
#[derive(Clone, PartialEq, Eq)]
pub struct SynReply {
    pub version: Version,
    pub stream_id: StreamId,
    pub fin: bool,
    pub headers: Headers,
}

impl SynReply {
    pub fn load(
        version: Version,
        flags: u8,
        body: &mut BytesMut,
        decompressor: &mut Decompressor,
    ) -> Result<SynReply, StreamError> {
        let fixed = match version {
            Version::V2 => 6,
            Version::V3 => 4,
        };
        if body.remaining() < fixed {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "SYN_REPLY body too short",
            ));
        }
        let stream_id = StreamId::new(body.get_u32());
        if version == Version::V2 {
            let _ = body.get_u16();
        }

        if flags & !FLAG_FIN != 0 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                format!("invalid SYN_REPLY flags {:#04x}", flags),
            )
            .on_stream(stream_id, Some(version)));
        }

        let headers = zlib::decode_block(version, &body[..], decompressor)
            .map_err(|e| e.on_stream(stream_id, Some(version)))?;

        Ok(SynReply {
            version,
            stream_id,
            fin: flags & FLAG_FIN != 0,
            headers,
        })
    }

    pub fn encode(
        &self,
        compressor: &mut Compressor,
        dst: &mut BytesMut,
    ) -> Result<(), StreamError> {
        log::trace!(
            "encoding SYN_REPLY; id={:?} fin={}",
            self.stream_id,
            self.fin
        );
        let block = zlib::encode_block(self.version, &self.headers, compressor)?;
        let flags = if self.fin { FLAG_FIN } else { 0 };

        let head = ControlHead::new(Kind::SynReply, self.version, flags);
        match self.version {
            Version::V2 => {
                head.encode(6 + block.len(), dst);
                dst.put_u32(self.stream_id.into());
                dst.put_u16(0);
            }
            Version::V3 => {
                head.encode(4 + block.len(), dst);
                dst.put_u32(self.stream_id.into());
            }
        }
        dst.extend_from_slice(&block);
        Ok(())
    }
}

impl From<SynReply> for ControlFrame {
    fn from(src: SynReply) -> ControlFrame {
        ControlFrame::SynReply(src)
    }
}

impl fmt::Debug for SynReply {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("SynReply")
            .field("version", &self.version)
            .field("stream_id", &self.stream_id)
            .field("fin", &self.fin)
            .field("headers", &self.headers)
            .finish()
    }
}
