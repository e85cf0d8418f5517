use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::consts::STREAM_ID_MASK;
use crate::error::StreamError;

use super::{ControlFrame, ControlHead, Kind, StreamId, StreamStatus, Version};

/// WINDOW_UPDATE frame
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WindowUpdate {
    pub version: Version,
    pub stream_id: StreamId,
    pub delta: i32,
}

impl WindowUpdate {
    pub fn new(version: Version, stream_id: StreamId, delta: i32) -> WindowUpdate {
        WindowUpdate {
            version,
            stream_id,
            delta,
        }
    }

    pub fn load(version: Version, body: &mut BytesMut) -> Result<WindowUpdate, StreamError> {
        if body.remaining() != 8 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "WINDOW_UPDATE body must be 8 octets",
            ));
        }
        let stream_id = StreamId::new(body.get_u32());
        // Top bit is reserved on the delta word as well
        let delta = (body.get_u32() & STREAM_ID_MASK) as i32;

        Ok(WindowUpdate {
            version,
            stream_id,
            delta,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!(
            "encoding WINDOW_UPDATE; id={:?} delta={}",
            self.stream_id,
            self.delta
        );
        let head = ControlHead::new(Kind::WindowUpdate, self.version, 0);
        head.encode(8, dst);
        dst.put_u32(self.stream_id.into());
        dst.put_u32(self.delta as u32 & STREAM_ID_MASK);
    }
}

impl From<WindowUpdate> for ControlFrame {
    fn from(src: WindowUpdate) -> ControlFrame {
        ControlFrame::WindowUpdate(src)
    }
}
