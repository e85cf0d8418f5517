use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::{OperationError, StreamError};

use super::{ControlFrame, ControlHead, Kind, StreamId, StreamStatus, Version};

/// RST_STREAM frame
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reset {
    pub version: Version,
    pub stream_id: StreamId,
    pub status: StreamStatus,
}

impl Reset {
    pub fn new(version: Version, stream_id: StreamId, status: StreamStatus) -> Reset {
        Reset {
            version,
            stream_id,
            status,
        }
    }

    pub fn load(version: Version, body: &mut BytesMut) -> Result<Reset, StreamError> {
        if body.remaining() != 8 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "RST_STREAM body must be 8 octets",
            ));
        }
        let stream_id = StreamId::new(body.get_u32());
        let code = body.get_u32();
        let status = StreamStatus::from_code(version, code).ok_or_else(|| {
            StreamError::new(
                StreamStatus::ProtocolError,
                format!("unknown RST_STREAM status code {}", code),
            )
            .on_stream(stream_id, Some(version))
        })?;

        Ok(Reset {
            version,
            stream_id,
            status,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) -> Result<(), OperationError> {
        log::trace!(
            "encoding RST_STREAM; id={:?} status={}",
            self.stream_id,
            self.status
        );
        let code = self
            .status
            .code(self.version)
            .ok_or(OperationError::UnsupportedStatus(self.status, self.version))?;

        let head = ControlHead::new(Kind::Reset, self.version, 0);
        head.encode(8, dst);
        dst.put_u32(self.stream_id.into());
        dst.put_u32(code);
        Ok(())
    }
}

impl From<Reset> for ControlFrame {
    fn from(src: Reset) -> ControlFrame {
        ControlFrame::Reset(src)
    }
}
