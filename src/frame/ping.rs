use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;

use super::{ControlFrame, ControlHead, Kind, StreamStatus, Version};

/// PING frame
///
/// The ping id parity identifies the originating endpoint; pings started
/// by the peer are echoed back verbatim.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ping {
    pub version: Version,
    pub ping_id: u32,
}

impl Ping {
    pub fn new(version: Version, ping_id: u32) -> Ping {
        Ping { version, ping_id }
    }

    pub fn load(version: Version, body: &mut BytesMut) -> Result<Ping, StreamError> {
        if body.remaining() != 4 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "PING body must be 4 octets",
            ));
        }
        Ok(Ping {
            version,
            ping_id: body.get_u32(),
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!("encoding PING; id={}", self.ping_id);
        let head = ControlHead::new(Kind::Ping, self.version, 0);
        head.encode(4, dst);
        dst.put_u32(self.ping_id);
    }
}

impl From<Ping> for ControlFrame {
    fn from(src: Ping) -> ControlFrame {
        ControlFrame::Ping(src)
    }
}
